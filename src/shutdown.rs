//! Cooperative shutdown flag shared by the monitor, the saver and the
//! signal handler

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
struct Inner {
    triggered: Mutex<bool>,
    wake: Condvar,
}

/// One-shot shutdown signal. Cloning shares the same flag.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
    inner: Arc<Inner>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    fn flag(&self) -> MutexGuard<'_, bool> {
        self.inner.triggered.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Request shutdown and wake every waiter. Later calls are no-ops.
    pub fn trigger(&self) {
        let mut triggered = self.flag();
        if !*triggered {
            *triggered = true;
            self.inner.wake.notify_all();
        }
    }

    pub fn is_triggered(&self) -> bool {
        *self.flag()
    }

    /// Sleep for `timeout` or until shutdown is requested.
    ///
    /// Returns true if shutdown was requested.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut triggered = self.flag();
        while !*triggered {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            triggered = self
                .inner
                .wake
                .wait_timeout(triggered, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        true
    }
}
