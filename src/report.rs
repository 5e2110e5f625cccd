//! Session summary and JSON export

use crate::counter::CounterTable;
use crate::keyboard::{key_name, KeyCode};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// How many keys the summary ranks
pub const TOP_KEYS: usize = 10;

/// Complete session report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionReport {
    /// Report metadata
    pub metadata: ReportMetadata,
    /// Summary statistics
    pub summary: SessionSummary,
    /// Most pressed keys over all time, highest first
    pub top_keys: Vec<KeyEntry>,
}

/// Report metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// Session start, RFC 3339
    pub started_at: String,
    /// Report generation timestamp, RFC 3339
    pub generated_at: String,
    /// Application version
    pub version: String,
    /// Session duration in seconds
    pub duration_secs: f64,
    /// Names of the monitored devices
    pub devices: Vec<String>,
}

/// Session summary statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    /// Key presses recorded during this session
    pub session_presses: u64,
    /// Key presses in the store, including previous sessions
    pub total_presses: u64,
    /// Distinct keys in the store
    pub distinct_keys: usize,
}

/// One ranked key
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KeyEntry {
    pub code: u16,
    pub name: String,
    pub count: u64,
}

impl SessionReport {
    /// Build a report from the table loaded at startup and the final table
    pub fn new(
        started_at: DateTime<Local>,
        devices: Vec<String>,
        baseline: &CounterTable,
        current: &CounterTable,
    ) -> Self {
        let now = Local::now();
        let total_presses: u64 = current.values().sum();
        let baseline_presses: u64 = baseline.values().sum();

        Self {
            metadata: ReportMetadata {
                started_at: started_at.to_rfc3339(),
                generated_at: now.to_rfc3339(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                duration_secs: (now - started_at).num_milliseconds().max(0) as f64 / 1000.0,
                devices,
            },
            summary: SessionSummary {
                session_presses: total_presses.saturating_sub(baseline_presses),
                total_presses,
                distinct_keys: current.len(),
            },
            top_keys: top_keys(current, TOP_KEYS),
        }
    }

    /// Export report to JSON file
    pub fn export_json(&self, path: &Path) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }

    /// Export report to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Plain text lines for the terminal
    pub fn summary_lines(&self) -> Vec<String> {
        let mut lines = vec![
            format!("Key presses this session: {}", self.summary.session_presses),
            format!(
                "Key presses total: {} across {} keys",
                self.summary.total_presses, self.summary.distinct_keys
            ),
        ];
        if !self.top_keys.is_empty() {
            lines.push("Top keys:".to_string());
            for (rank, entry) in self.top_keys.iter().enumerate() {
                lines.push(format!("{:>3}. {:<16} {}", rank + 1, entry.name, entry.count));
            }
        }
        lines
    }
}

/// The `n` highest counts, ties broken by key code
pub fn top_keys(table: &CounterTable, n: usize) -> Vec<KeyEntry> {
    let mut sorted: Vec<(&KeyCode, &u64)> = table.iter().collect();
    sorted.sort_by(|a, b| b.1.cmp(a.1).then(a.0.cmp(b.0)));
    sorted
        .into_iter()
        .take(n)
        .map(|(code, count)| KeyEntry {
            code: code.as_u16(),
            name: key_name(*code),
            count: *count,
        })
        .collect()
}
