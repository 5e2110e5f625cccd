//! Keyboard Stats - per-key press counter for Linux keyboards
//!
//! Finds every attached keyboard, counts key-down events per key code and
//! keeps the totals in a CSV file that is rewritten on an interval and at
//! shutdown.

pub mod config;
pub mod counter;
pub mod keyboard;
pub mod report;
pub mod scheduler;
pub mod shutdown;
pub mod store;

#[cfg(target_os = "linux")]
pub mod monitor;

pub use config::Config;
pub use counter::{CounterTable, KeyCounter};
pub use scheduler::{Persister, SaveScheduler};
pub use shutdown::ShutdownSignal;

#[cfg(target_os = "linux")]
pub use monitor::{Monitor, MonitorExit, MonitorOutcome};
