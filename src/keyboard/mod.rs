//! Keyboard event decoding, classification and device access

mod classifier;
mod event;
pub mod keymap;

#[cfg(target_os = "linux")]
mod device;

pub use classifier::{is_qualifying_keyboard, Classifier, DEFAULT_NAME_PATTERNS};
pub use event::{KeyEvent, KeyEventType, RawEvent, EV_KEY};
pub use keymap::{key_from_name, key_name, KeyCode, REFERENCE_KEYS};

#[cfg(target_os = "linux")]
pub use device::{
    find_keyboards, input_device_paths, list_devices, DeviceListing, EvdevDevice,
    EventSource, MonitorError,
};
