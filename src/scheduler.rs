//! Background saving of the counter table
//!
//! [`Persister`] pairs the counter with its output file and serializes
//! writes. [`SaveScheduler`] runs a thread that flushes on a fixed interval
//! until the shared [`ShutdownSignal`] fires.

use crate::counter::KeyCounter;
use crate::shutdown::ShutdownSignal;
use crate::store::{self, StoreError};
use log::{debug, error, info};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Default interval between periodic saves
pub const DEFAULT_SAVE_INTERVAL: Duration = Duration::from_secs(60);

/// Writes counter snapshots to a fixed path
#[derive(Debug)]
pub struct Persister {
    path: PathBuf,
    counter: Arc<KeyCounter>,
    write_lock: Mutex<()>,
    saves: AtomicU64,
}

impl Persister {
    pub fn new(path: impl Into<PathBuf>, counter: Arc<KeyCounter>) -> Self {
        Self {
            path: path.into(),
            counter,
            write_lock: Mutex::new(()),
            saves: AtomicU64::new(0),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Snapshot the counter and rewrite the file.
    ///
    /// Concurrent calls are serialized; each one writes a snapshot taken
    /// after the previous write finished.
    pub fn flush(&self) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let snapshot = self.counter.snapshot();
        store::save(&self.path, &snapshot)?;
        let n = self.saves.fetch_add(1, Ordering::SeqCst) + 1;
        debug!("Save #{} wrote {} keys to {}", n, snapshot.len(), self.path.display());
        Ok(())
    }

    /// Number of successful saves so far
    pub fn save_count(&self) -> u64 {
        self.saves.load(Ordering::SeqCst)
    }
}

/// Handle to the periodic save thread
#[derive(Debug)]
pub struct SaveScheduler {
    handle: Option<JoinHandle<()>>,
    shutdown: ShutdownSignal,
}

impl SaveScheduler {
    /// Start saving every `interval` until `shutdown` is triggered.
    ///
    /// The thread does not save on its way out; the final save belongs to
    /// whoever triggers shutdown.
    pub fn spawn(
        persister: Arc<Persister>,
        interval: Duration,
        shutdown: ShutdownSignal,
    ) -> io::Result<Self> {
        let signal = shutdown.clone();
        let handle = thread::Builder::new()
            .name("periodic-save".to_string())
            .spawn(move || run(&persister, interval, &signal))?;

        Ok(Self {
            handle: Some(handle),
            shutdown,
        })
    }

    /// Trigger shutdown and wait for the thread to exit
    pub fn stop(mut self) {
        self.shutdown.trigger();
        self.join();
    }

    fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("Periodic save thread panicked");
            }
        }
    }
}

impl Drop for SaveScheduler {
    fn drop(&mut self) {
        self.shutdown.trigger();
        self.join();
    }
}

fn run(persister: &Persister, interval: Duration, shutdown: &ShutdownSignal) {
    debug!("Periodic save every {:?} to {}", interval, persister.path().display());
    while !shutdown.wait_timeout(interval) {
        match persister.flush() {
            Ok(()) => {
                let now = chrono::Local::now();
                info!("Data saved at {}", now.format("%a %b %e %H:%M:%S %Y"))
            }
            // Picked up again at the next interval
            Err(e) => error!("Failed to save {}: {}", persister.path().display(), e),
        }
    }
    debug!("Periodic save stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyboard::KeyCode;
    use std::fs;
    use std::time::Instant;
    use tempfile::tempdir;

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

    #[test]
    fn flush_writes_current_snapshot() {
        let dir = tempdir().unwrap();
        let counter = Arc::new(KeyCounter::new());
        counter.record(KeyCode(30));
        let persister = Persister::new(dir.path().join("stats.csv"), Arc::clone(&counter));

        persister.flush().unwrap();

        assert_eq!(fs::read_to_string(persister.path()).unwrap(), "30,1\n");
        assert_eq!(persister.save_count(), 1);
    }

    #[test]
    fn scheduler_saves_periodically() {
        let dir = tempdir().unwrap();
        let counter = Arc::new(KeyCounter::new());
        counter.record(KeyCode(57));
        let persister = Arc::new(Persister::new(dir.path().join("stats.csv"), counter));

        let scheduler = SaveScheduler::spawn(
            Arc::clone(&persister),
            Duration::from_millis(10),
            ShutdownSignal::new(),
        )
        .unwrap();

        assert!(wait_for(Duration::from_secs(5), || persister.save_count() >= 2));
        scheduler.stop();

        assert_eq!(store::load(persister.path()).unwrap().get(&KeyCode(57)), Some(&1));
    }

    #[test]
    fn scheduler_survives_failed_saves() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "file, not a directory").unwrap();

        let persister = Arc::new(Persister::new(
            blocker.join("stats.csv"),
            Arc::new(KeyCounter::new()),
        ));
        let shutdown = ShutdownSignal::new();
        let scheduler = SaveScheduler::spawn(
            Arc::clone(&persister),
            Duration::from_millis(5),
            shutdown.clone(),
        )
        .unwrap();

        thread::sleep(Duration::from_millis(50));
        assert!(!shutdown.is_triggered());
        assert_eq!(persister.save_count(), 0);

        // Clearing the obstruction lets the next tick succeed
        fs::remove_file(&blocker).unwrap();
        assert!(wait_for(Duration::from_secs(5), || persister.save_count() >= 1));
        scheduler.stop();
    }

    #[test]
    fn stop_before_first_interval_does_not_save() {
        let dir = tempdir().unwrap();
        let persister = Arc::new(Persister::new(
            dir.path().join("stats.csv"),
            Arc::new(KeyCounter::new()),
        ));

        let start = Instant::now();
        let scheduler = SaveScheduler::spawn(
            Arc::clone(&persister),
            Duration::from_secs(3600),
            ShutdownSignal::new(),
        )
        .unwrap();
        scheduler.stop();

        assert!(start.elapsed() < Duration::from_secs(60));
        assert_eq!(persister.save_count(), 0);
        assert!(!persister.path().exists());
    }
}
