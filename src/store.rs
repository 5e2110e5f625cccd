//! CSV persistence for the counter table
//!
//! The file has no header and one `<key code>,<count>` record per line.
//! Files written by older tools that store kernel key names (`KEY_A,900`)
//! are read too; they are rewritten with numeric codes on the next save.
//! Every save rewrites the whole file from the in-memory table through a
//! temporary file in the same directory that is renamed over the target, so
//! a crash mid-write leaves the previous save intact.

use crate::counter::CounterTable;
use crate::keyboard::{key_from_name, KeyCode};
use log::debug;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;

/// Error type for loading and saving counts
#[derive(Debug, Error)]
pub enum StoreError {
    /// IO error reading or writing the file
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    /// Malformed CSV
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    /// A record without exactly two fields
    #[error("expected 2 fields on line {line}, found {found}")]
    FieldCount { line: u64, found: usize },
    /// A record whose key is neither a numeric code nor a known key name
    #[error("unknown key {key:?} on line {line}")]
    InvalidKey { line: u64, key: String },
    /// A record whose count is not a non-negative integer
    #[error("invalid count {value:?} for key {key} on line {line}")]
    InvalidCount { line: u64, key: String, value: String },
    /// Renaming the temporary file over the target failed
    #[error("could not replace {}: {}", .path.display(), .source)]
    Persist {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Load counts from `path`.
///
/// A missing file yields an empty table. Keys may be numeric codes or
/// kernel key names. Any record that cannot be read fails the whole load, so
/// a file with unreadable rows is never overwritten by a save that would drop
/// them. Counts for a key that appears more than once are added together.
pub fn load(path: &Path) -> Result<CounterTable, StoreError> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!("No existing data at {}", path.display());
            return Ok(CounterTable::new());
        }
        Err(e) => return Err(e.into()),
    };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(file);

    let mut table = CounterTable::new();
    for result in reader.records() {
        let record = result?;
        let line = record.position().map_or(0, |p| p.line());

        if record.len() != 2 {
            return Err(StoreError::FieldCount {
                line,
                found: record.len(),
            });
        }

        let key = parse_key(&record[0]).ok_or_else(|| StoreError::InvalidKey {
            line,
            key: record[0].to_string(),
        })?;

        let count: u64 = record[1]
            .trim()
            .parse()
            .map_err(|_| StoreError::InvalidCount {
                line,
                key: record[0].to_string(),
                value: record[1].to_string(),
            })?;

        *table.entry(key).or_insert(0) += count;
    }

    Ok(table)
}

fn parse_key(field: &str) -> Option<KeyCode> {
    field.parse().ok().or_else(|| key_from_name(field))
}

/// Replace the contents of `path` with `table`, creating parent directories
/// as needed. Records are written in key order.
pub fn save(path: &Path, table: &CounterTable) -> Result<(), StoreError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(tmp.as_file_mut());

        let mut rows: Vec<_> = table.iter().collect();
        rows.sort_unstable_by_key(|(key, _)| **key);
        for (key, count) in rows {
            writer.write_record([key.to_string(), count.to_string()])?;
        }
        writer.flush()?;
    }
    tmp.as_file().sync_all()?;
    match_permissions(tmp.path(), path)?;

    tmp.persist(path).map_err(|e| StoreError::Persist {
        path: path.to_path_buf(),
        source: e.error,
    })?;
    Ok(())
}

// Temporary files are created 0600; keep the mode of the file being replaced,
// or use a plain 0644 for a new one.
#[cfg(unix)]
fn match_permissions(tmp: &Path, target: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let permissions = match fs::metadata(target) {
        Ok(meta) => meta.permissions(),
        Err(_) => fs::Permissions::from_mode(0o644),
    };
    fs::set_permissions(tmp, permissions)
}

#[cfg(not(unix))]
fn match_permissions(_tmp: &Path, _target: &Path) -> io::Result<()> {
    Ok(())
}
