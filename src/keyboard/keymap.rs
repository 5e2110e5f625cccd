//! Key code definitions and the reference key set used for classification

use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

/// Represents a physical key by its raw Linux input code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyCode(pub u16);

impl KeyCode {
    pub fn new(code: u16) -> Self {
        Self(code)
    }

    pub fn as_u16(&self) -> u16 {
        self.0
    }
}

impl From<u16> for KeyCode {
    fn from(code: u16) -> Self {
        Self(code)
    }
}

impl fmt::Display for KeyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for KeyCode {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<u16>().map(KeyCode)
    }
}

// Linux input-event-codes.h values for the keys a full keyboard must expose.
pub const KEY_1: KeyCode = KeyCode(2);
pub const KEY_2: KeyCode = KeyCode(3);
pub const KEY_3: KeyCode = KeyCode(4);
pub const KEY_BACKSPACE: KeyCode = KeyCode(14);
pub const KEY_Q: KeyCode = KeyCode(16);
pub const KEY_W: KeyCode = KeyCode(17);
pub const KEY_E: KeyCode = KeyCode(18);
pub const KEY_R: KeyCode = KeyCode(19);
pub const KEY_ENTER: KeyCode = KeyCode(28);
pub const KEY_LEFTCTRL: KeyCode = KeyCode(29);
pub const KEY_A: KeyCode = KeyCode(30);
pub const KEY_S: KeyCode = KeyCode(31);
pub const KEY_D: KeyCode = KeyCode(32);
pub const KEY_F: KeyCode = KeyCode(33);
pub const KEY_LEFTSHIFT: KeyCode = KeyCode(42);
pub const KEY_Z: KeyCode = KeyCode(44);
pub const KEY_X: KeyCode = KeyCode(45);
pub const KEY_C: KeyCode = KeyCode(46);
pub const KEY_V: KeyCode = KeyCode(47);
pub const KEY_RIGHTSHIFT: KeyCode = KeyCode(54);
pub const KEY_SPACE: KeyCode = KeyCode(57);
pub const KEY_RIGHTCTRL: KeyCode = KeyCode(97);

/// Keys every qualifying keyboard must be able to produce: part of the
/// alphabetic rows, a few digits, space, enter, backspace and both
/// shift/control keys.
pub const REFERENCE_KEYS: [KeyCode; 22] = [
    KEY_Q,
    KEY_W,
    KEY_E,
    KEY_R,
    KEY_A,
    KEY_S,
    KEY_D,
    KEY_F,
    KEY_Z,
    KEY_X,
    KEY_C,
    KEY_V,
    KEY_1,
    KEY_2,
    KEY_3,
    KEY_SPACE,
    KEY_ENTER,
    KEY_BACKSPACE,
    KEY_LEFTSHIFT,
    KEY_RIGHTSHIFT,
    KEY_LEFTCTRL,
    KEY_RIGHTCTRL,
];

/// Human readable name for a key code (`KEY_A`, `KEY_LEFTSHIFT`, ...).
///
/// Codes without a kernel name fall back to `KEY_<code>`.
#[cfg(target_os = "linux")]
pub fn key_name(key: KeyCode) -> String {
    let name = format!("{:?}", evdev::Key::new(key.0));
    if name.starts_with("KEY_") || name.starts_with("BTN_") {
        name
    } else {
        format!("KEY_{}", key.0)
    }
}

#[cfg(not(target_os = "linux"))]
pub fn key_name(key: KeyCode) -> String {
    format!("KEY_{}", key.0)
}

/// Highest key code the kernel defines (`KEY_MAX`)
pub const KEY_MAX: u16 = 0x2ff;

/// Key code for a name produced by [`key_name`], e.g. `KEY_SPACE` -> 57
pub fn key_from_name(name: &str) -> Option<KeyCode> {
    let name = name.trim();
    if !name.starts_with("KEY_") && !name.starts_with("BTN_") {
        return None;
    }
    (0..=KEY_MAX).map(KeyCode).find(|&key| key_name(key) == name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn keycode_parses_decimal_strings() {
        assert_eq!("30".parse::<KeyCode>(), Ok(KeyCode(30)));
        assert_eq!(" 42 ".parse::<KeyCode>(), Ok(KeyCode(42)));
        assert!("KEY_A".parse::<KeyCode>().is_err());
        assert!("-1".parse::<KeyCode>().is_err());
    }

    #[test]
    fn keycode_displays_as_raw_code() {
        assert_eq!(KeyCode(57).to_string(), "57");
    }

    #[test]
    fn reference_keys_are_unique() {
        let unique: HashSet<_> = REFERENCE_KEYS.iter().collect();
        assert_eq!(unique.len(), REFERENCE_KEYS.len());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn key_name_uses_kernel_names() {
        assert_eq!(key_name(KEY_A), "KEY_A");
        assert_eq!(key_name(KEY_LEFTSHIFT), "KEY_LEFTSHIFT");
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn key_from_name_reverses_key_name() {
        assert_eq!(key_from_name("KEY_A"), Some(KEY_A));
        assert_eq!(key_from_name(" KEY_SPACE "), Some(KEY_SPACE));
        assert_eq!(key_from_name("KEY_NOT_REAL"), None);
        assert_eq!(key_from_name("30"), None);
    }
}
