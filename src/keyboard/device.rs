//! evdev-backed keyboard devices for Linux
//!
//! Enumerates `/dev/input/event*`, opens each node and keeps the ones the
//! [`Classifier`] accepts. Opened devices are switched to non-blocking mode so
//! the monitor can drain them after `poll(2)` reports them readable.

use super::{Classifier, KeyCode, RawEvent};
use log::{debug, info, warn};
use nix::libc;
use std::collections::HashSet;
use std::fs;
use std::io;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd};
use std::path::{Path, PathBuf};
use thiserror::Error;

const INPUT_DIR: &str = "/dev/input";

/// Error type for device discovery and monitoring
#[derive(Debug, Error)]
pub enum MonitorError {
    /// No device passed classification
    #[error("No keyboards found")]
    NoDevices,
    /// Permission denied opening a device node
    #[error(
        "Permission denied accessing {}. Retry with sudo or add your user to the 'input' group.",
        .0.display()
    )]
    PermissionDenied(PathBuf),
    /// Device enumeration failed
    #[error("Device enumeration failed: {0}")]
    EnumerationFailed(String),
    /// Waiting for device readiness failed
    #[error("poll failed: {0}")]
    Poll(#[from] nix::errno::Errno),
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// A readable, pollable source of raw input events
pub trait EventSource: AsFd + Send {
    /// Stable device name for logs
    fn name(&self) -> &str;

    /// Append every event pending right now to `out`.
    ///
    /// Must not block. An error means the source is unusable; events appended
    /// before the error are still valid.
    fn read_pending(&mut self, out: &mut Vec<RawEvent>) -> io::Result<()>;
}

/// An opened evdev input device
pub struct EvdevDevice {
    path: PathBuf,
    name: String,
    device: evdev::Device,
}

impl EvdevDevice {
    /// Open a device node
    pub fn open(path: &Path) -> io::Result<Self> {
        let device = evdev::Device::open(path)?;
        let name = device.name().unwrap_or("unknown").to_string();
        Ok(Self {
            path: path.to_path_buf(),
            name,
            device,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Key codes the device reports it can produce, `None` if it has no key
    /// capability map at all
    pub fn capabilities(&self) -> Option<HashSet<KeyCode>> {
        self.device
            .supported_keys()
            .map(|keys| keys.iter().map(|key| KeyCode(key.code())).collect())
    }

    fn set_nonblocking(&self) -> io::Result<()> {
        let fd = self.device.as_raw_fd();
        // SAFETY: fd is owned by self.device and open for its lifetime
        let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
        if flags < 0 {
            return Err(io::Error::last_os_error());
        }
        let rc = unsafe { libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}

impl AsFd for EvdevDevice {
    fn as_fd(&self) -> BorrowedFd<'_> {
        // SAFETY: the descriptor stays open as long as self.device lives,
        // and the borrow is tied to &self
        unsafe { BorrowedFd::borrow_raw(self.device.as_raw_fd()) }
    }
}

impl EventSource for EvdevDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn read_pending(&mut self, out: &mut Vec<RawEvent>) -> io::Result<()> {
        loop {
            let before = out.len();
            match self.device.fetch_events() {
                Ok(events) => out.extend(
                    events.map(|ev| RawEvent::new(ev.event_type().0, ev.code(), ev.value())),
                ),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(()),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
            if out.len() == before {
                return Ok(());
            }
        }
    }
}

/// All `/dev/input/event*` nodes, sorted by path
pub fn input_device_paths() -> Result<Vec<PathBuf>, MonitorError> {
    let entries = fs::read_dir(INPUT_DIR)
        .map_err(|e| MonitorError::EnumerationFailed(format!("{}: {}", INPUT_DIR, e)))?;

    let mut paths: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("event"))
        })
        .collect();
    paths.sort();
    Ok(paths)
}

/// Open every input device and keep the qualifying keyboards.
///
/// A device that cannot be opened for lack of privilege aborts discovery,
/// since no other device will be readable either. Other open failures (a
/// device unplugged during the scan) only skip that node.
pub fn find_keyboards(classifier: &Classifier) -> Result<Vec<EvdevDevice>, MonitorError> {
    let mut keyboards = Vec::new();

    for path in input_device_paths()? {
        let device = match EvdevDevice::open(&path) {
            Ok(device) => device,
            Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
                return Err(MonitorError::PermissionDenied(path));
            }
            Err(e) => {
                warn!("Skipping {}: {}", path.display(), e);
                continue;
            }
        };

        let capabilities = device.capabilities();
        if !classifier.qualifies(device.name(), capabilities.as_ref()) {
            debug!("Ignoring {} ({})", path.display(), device.name());
            continue;
        }

        device.set_nonblocking()?;
        info!("Selected {} ({})", path.display(), device.name());
        keyboards.push(device);
    }

    if keyboards.is_empty() {
        return Err(MonitorError::NoDevices);
    }
    Ok(keyboards)
}

/// One line of `--list-devices` output
#[derive(Debug, Clone)]
pub struct DeviceListing {
    pub path: PathBuf,
    /// `None` if the node could not be opened
    pub name: Option<String>,
    pub key_count: usize,
    pub qualifies: bool,
    pub error: Option<String>,
}

/// Describe every input device without failing on unreadable ones
pub fn list_devices(classifier: &Classifier) -> Result<Vec<DeviceListing>, MonitorError> {
    let listings = input_device_paths()?
        .into_iter()
        .map(|path| match EvdevDevice::open(&path) {
            Ok(device) => {
                let capabilities = device.capabilities();
                DeviceListing {
                    name: Some(device.name().to_string()),
                    key_count: capabilities.as_ref().map_or(0, |c| c.len()),
                    qualifies: classifier.qualifies(device.name(), capabilities.as_ref()),
                    error: None,
                    path,
                }
            }
            Err(e) => DeviceListing {
                name: None,
                key_count: 0,
                qualifies: false,
                error: Some(e.to_string()),
                path,
            },
        })
        .collect();
    Ok(listings)
}
