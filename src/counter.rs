//! In-memory per-key press counts shared between the monitor and the saver

use crate::keyboard::{KeyCode, KeyEvent};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Mapping from key to cumulative press count
pub type CounterTable = HashMap<KeyCode, u64>;

/// Press counter guarded by a single table-wide lock.
///
/// The monitor is the only writer; the save scheduler only takes snapshots.
/// Every operation holds the lock for one map access or one clone, so neither
/// side can stall the other for long.
#[derive(Debug, Default)]
pub struct KeyCounter {
    table: Mutex<CounterTable>,
}

impl KeyCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from counts loaded off disk
    pub fn from_table(table: CounterTable) -> Self {
        Self {
            table: Mutex::new(table),
        }
    }

    // Counts have no cross-key invariant, so a panic mid-update leaves the
    // table usable.
    fn lock(&self) -> MutexGuard<'_, CounterTable> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Count one key-down event.
    ///
    /// Every code in the event is incremented by one. A composite event such
    /// as `[KEY_LEFTSHIFT, KEY_LEFTALT]` therefore adds two presses in total,
    /// one per key involved, not one per physical action.
    pub fn record_key_down(&self, event: &KeyEvent) {
        let mut table = self.lock();
        for code in &event.codes {
            *table.entry(*code).or_insert(0) += 1;
        }
    }

    /// Count a single key-down
    pub fn record(&self, code: KeyCode) {
        *self.lock().entry(code).or_insert(0) += 1;
    }

    /// Point-in-time copy of the whole table
    pub fn snapshot(&self) -> CounterTable {
        self.lock().clone()
    }

    pub fn count(&self, code: KeyCode) -> u64 {
        self.lock().get(&code).copied().unwrap_or(0)
    }

    /// Sum of all counts
    pub fn total(&self) -> u64 {
        self.lock().values().sum()
    }

    /// Number of distinct keys seen
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
