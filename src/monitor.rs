//! Multiplexed event loop over every selected keyboard
//!
//! One thread blocks in `poll(2)` on all device descriptors at once. Ready
//! devices are drained completely before the next wait, and only key-down
//! transitions reach the counter. A device that fails to read is dropped
//! from the wait set; the loop ends when the set is empty or shutdown is
//! requested.

use crate::counter::KeyCounter;
use crate::keyboard::{key_name, EventSource, KeyEvent, MonitorError, RawEvent};
use crate::shutdown::ShutdownSignal;
use log::{debug, info, warn};
use nix::errno::Errno;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use std::os::fd::AsFd;
use std::sync::Arc;
use std::time::Duration;

/// How long one wait may last before the shutdown flag is checked again
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_millis(250);

/// Why the event loop returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorExit {
    /// Shutdown was requested
    Shutdown,
    /// Every device failed and was dropped
    DevicesExhausted,
}

/// Result of a completed run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorOutcome {
    pub exit: MonitorExit,
    /// Key-down events recorded during the run
    pub key_presses: u64,
}

/// Owns the event sources and feeds the counter
pub struct Monitor {
    sources: Vec<Box<dyn EventSource>>,
    counter: Arc<KeyCounter>,
    poll_timeout: Duration,
}

impl Monitor {
    pub fn new(sources: Vec<Box<dyn EventSource>>, counter: Arc<KeyCounter>) -> Self {
        Self {
            sources,
            counter,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
        }
    }

    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }

    /// Names of the sources still being monitored
    pub fn device_names(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.name()).collect()
    }

    pub fn device_count(&self) -> usize {
        self.sources.len()
    }

    /// Run until shutdown is requested or no device is left
    pub fn run(&mut self, shutdown: &ShutdownSignal) -> Result<MonitorOutcome, MonitorError> {
        let mut key_presses = 0u64;
        let mut events: Vec<RawEvent> = Vec::with_capacity(64);

        loop {
            if shutdown.is_triggered() {
                return Ok(MonitorOutcome {
                    exit: MonitorExit::Shutdown,
                    key_presses,
                });
            }
            if self.sources.is_empty() {
                return Ok(MonitorOutcome {
                    exit: MonitorExit::DevicesExhausted,
                    key_presses,
                });
            }

            let ready = match self.wait_ready() {
                Ok(ready) => ready,
                Err(Errno::EINTR) => continue,
                Err(e) => return Err(e.into()),
            };

            // Highest index first so removals keep the remaining indices valid
            for index in ready.into_iter().rev() {
                events.clear();
                let result = self.sources[index].read_pending(&mut events);
                key_presses += self.apply(&events);

                if let Err(e) = result {
                    let source = self.sources.remove(index);
                    warn!("Dropping {}: {}", source.name(), e);
                    info!("{} device(s) still monitored", self.sources.len());
                }
            }
        }
    }

    fn wait_ready(&self) -> Result<Vec<usize>, Errno> {
        let mut fds: Vec<PollFd<'_>> = self
            .sources
            .iter()
            .map(|s| PollFd::new(s.as_fd(), PollFlags::POLLIN))
            .collect();

        if poll(&mut fds, poll_timeout(self.poll_timeout))? == 0 {
            return Ok(Vec::new());
        }

        // Error conditions count as ready so the read surfaces them
        let wake =
            PollFlags::POLLIN | PollFlags::POLLERR | PollFlags::POLLHUP | PollFlags::POLLNVAL;
        Ok(fds
            .iter()
            .enumerate()
            .filter(|(_, fd)| fd.revents().is_some_and(|r| r.intersects(wake)))
            .map(|(i, _)| i)
            .collect())
    }

    fn apply(&self, events: &[RawEvent]) -> u64 {
        let mut presses = 0;
        for raw in events {
            let Some(event) = KeyEvent::decode(raw) else {
                continue;
            };
            if !event.is_press() {
                continue;
            }
            debug!("{} down", key_name(event.codes[0]));
            self.counter.record_key_down(&event);
            presses += 1;
        }
        presses
    }
}

// PollTimeout takes at most i32::MAX milliseconds; longer waits are
// indistinguishable from blocking forever for this loop.
fn poll_timeout(timeout: Duration) -> PollTimeout {
    PollTimeout::try_from(timeout).unwrap_or(PollTimeout::MAX)
}
