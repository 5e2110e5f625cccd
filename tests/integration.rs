//! Integration tests for Keyboard Stats
//!
//! These tests exercise the full pipeline: raw events through the monitor
//! into the counter, periodic and final saves, and reloading the store.

use keyboard_stats::keyboard::{KeyCode, KeyEvent, KeyEventType};
use keyboard_stats::{store, CounterTable, KeyCounter, Persister, SaveScheduler, ShutdownSignal};
use std::fs;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tempfile::tempdir;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn table(entries: &[(u16, u64)]) -> CounterTable {
    entries.iter().map(|&(k, v)| (KeyCode(k), v)).collect()
}

fn press(code: u16) -> KeyEvent {
    KeyEvent::new(KeyCode(code), KeyEventType::Press)
}

fn wait_for(deadline: Duration, mut check: impl FnMut() -> bool) -> bool {
    let end = Instant::now() + deadline;
    while Instant::now() < end {
        if check() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    check()
}

// ---------------------------------------------------------------------------
// Store + counter
// ---------------------------------------------------------------------------

#[test]
fn startup_merge_adds_to_existing_counts() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("stats.csv");
    fs::write(&path, "30,5\n").unwrap();

    let counter = Arc::new(KeyCounter::from_table(store::load(&path).unwrap()));
    counter.record_key_down(&press(30));
    counter.record_key_down(&press(30));

    let persister = Persister::new(path.clone(), counter);
    persister.flush().unwrap();

    assert_eq!(fs::read_to_string(&path).unwrap(), "30,7\n");
}

#[test]
fn counts_survive_several_sessions() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("data").join("stats.csv");

    for _ in 0..3 {
        let counter = Arc::new(KeyCounter::from_table(store::load(&path).unwrap()));
        counter.record_key_down(&press(57));
        counter.record_key_down(&KeyEvent::composite(
            [KeyCode(42), KeyCode(56)],
            KeyEventType::Press,
        ));
        Persister::new(path.clone(), counter).flush().unwrap();
    }

    assert_eq!(store::load(&path).unwrap(), table(&[(42, 3), (56, 3), (57, 3)]));
}

// ---------------------------------------------------------------------------
// Scheduler + shutdown
// ---------------------------------------------------------------------------

#[test]
fn shutdown_mid_interval_saves_exactly_once() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("stats.csv");
    let counter = Arc::new(KeyCounter::new());
    let persister = Arc::new(Persister::new(path.clone(), Arc::clone(&counter)));
    let shutdown = ShutdownSignal::new();

    let scheduler = SaveScheduler::spawn(
        Arc::clone(&persister),
        Duration::from_secs(3600),
        shutdown.clone(),
    )
    .unwrap();

    let writer = {
        let counter = Arc::clone(&counter);
        thread::spawn(move || {
            for i in 0..500u16 {
                counter.record_key_down(&press(16 + i % 3));
            }
        })
    };
    writer.join().unwrap();

    shutdown.trigger();
    scheduler.stop();
    persister.flush().unwrap();

    assert_eq!(persister.save_count(), 1);
    let saved = store::load(&path).unwrap();
    assert_eq!(saved.values().sum::<u64>(), 500);
    assert_eq!(saved, counter.snapshot());
}

#[test]
fn periodic_saves_track_ongoing_presses() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("stats.csv");
    let counter = Arc::new(KeyCounter::new());
    let persister = Arc::new(Persister::new(path.clone(), Arc::clone(&counter)));

    let scheduler = SaveScheduler::spawn(
        Arc::clone(&persister),
        Duration::from_millis(10),
        ShutdownSignal::new(),
    )
    .unwrap();

    for _ in 0..10 {
        counter.record_key_down(&press(30));
    }
    assert!(wait_for(Duration::from_secs(5), || {
        store::load(&path)
            .map(|t| t.get(&KeyCode(30)) == Some(&10))
            .unwrap_or(false)
    }));

    scheduler.stop();
    persister.flush().unwrap();
    assert_eq!(store::load(&path).unwrap(), table(&[(30, 10)]));
}

// ---------------------------------------------------------------------------
// Monitor end to end
// ---------------------------------------------------------------------------

#[cfg(target_os = "linux")]
mod monitor_pipeline {
    use super::*;
    use keyboard_stats::keyboard::{EventSource, RawEvent};
    use keyboard_stats::{Monitor, MonitorExit};
    use std::io::{self, Read, Write};
    use std::os::fd::{AsFd, BorrowedFd};
    use std::os::unix::net::UnixStream;

    /// One byte per event: the key code. Even bytes are presses, odd bytes
    /// releases of `byte - 1`.
    struct ByteSource {
        stream: UnixStream,
    }

    impl AsFd for ByteSource {
        fn as_fd(&self) -> BorrowedFd<'_> {
            self.stream.as_fd()
        }
    }

    impl EventSource for ByteSource {
        fn name(&self) -> &str {
            "byte keyboard"
        }

        fn read_pending(&mut self, out: &mut Vec<RawEvent>) -> io::Result<()> {
            let mut buf = [0u8; 64];
            loop {
                match self.stream.read(&mut buf) {
                    Ok(0) => return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "gone")),
                    Ok(n) => out.extend(buf[..n].iter().map(|&b| {
                        if b % 2 == 0 {
                            RawEvent::key(b as u16, 1)
                        } else {
                            RawEvent::key(b as u16 - 1, 0)
                        }
                    })),
                    Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(()),
                    Err(e) => return Err(e),
                }
            }
        }
    }

    fn byte_source() -> (Box<dyn EventSource>, UnixStream) {
        let (ours, theirs) = UnixStream::pair().unwrap();
        ours.set_nonblocking(true).unwrap();
        (Box::new(ByteSource { stream: ours }), theirs)
    }

    #[test]
    fn interrupt_saves_everything_recorded() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stats.csv");
        fs::write(&path, "30,5\n").unwrap();

        let counter = Arc::new(KeyCounter::from_table(store::load(&path).unwrap()));
        let persister = Arc::new(Persister::new(path.clone(), Arc::clone(&counter)));
        let shutdown = ShutdownSignal::new();
        let scheduler = SaveScheduler::spawn(
            Arc::clone(&persister),
            Duration::from_secs(3600),
            shutdown.clone(),
        )
        .unwrap();

        let (source, mut feed) = byte_source();
        let monitor_thread = {
            let counter = Arc::clone(&counter);
            let shutdown = shutdown.clone();
            thread::spawn(move || {
                Monitor::new(vec![source], counter)
                    .with_poll_timeout(Duration::from_millis(20))
                    .run(&shutdown)
                    .unwrap()
            })
        };

        // Two taps of 30 and one of 44
        feed.write_all(&[30, 31, 30, 31, 44, 45]).unwrap();
        assert!(wait_for(Duration::from_secs(5), || counter.total() == 8));

        shutdown.trigger();
        let outcome = monitor_thread.join().unwrap();
        scheduler.stop();
        persister.flush().unwrap();

        assert_eq!(outcome.exit, MonitorExit::Shutdown);
        assert_eq!(outcome.key_presses, 3);
        assert_eq!(persister.save_count(), 1);
        assert_eq!(fs::read_to_string(&path).unwrap(), "30,7\n44,1\n");
    }

    #[test]
    fn unplugged_keyboard_ends_run_with_counts_intact() {
        let counter = Arc::new(KeyCounter::new());
        let (source, mut feed) = byte_source();

        feed.write_all(&[16, 17, 18, 19]).unwrap();
        drop(feed);

        let mut monitor = Monitor::new(vec![source], Arc::clone(&counter))
            .with_poll_timeout(Duration::from_millis(20));
        let outcome = monitor.run(&ShutdownSignal::new()).unwrap();

        assert_eq!(outcome.exit, MonitorExit::DevicesExhausted);
        assert_eq!(counter.snapshot(), table(&[(16, 1), (18, 1)]));
    }
}
