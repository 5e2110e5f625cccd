//! Keyboard event types and decoding of raw kernel input events

use super::KeyCode;

/// `EV_KEY` event type from linux/input-event-codes.h
pub const EV_KEY: u16 = 0x01;

/// A raw input event as delivered by the kernel, minus its timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawEvent {
    pub event_type: u16,
    pub code: u16,
    pub value: i32,
}

impl RawEvent {
    pub fn new(event_type: u16, code: u16, value: i32) -> Self {
        Self {
            event_type,
            code,
            value,
        }
    }

    /// Shorthand for an `EV_KEY` event
    pub fn key(code: u16, value: i32) -> Self {
        Self::new(EV_KEY, code, value)
    }
}

/// State carried by the value field of an `EV_KEY` event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEventType {
    /// Key was released (value 0)
    Release,
    /// Key moved from released to pressed (value 1)
    Press,
    /// Autorepeat while held (value 2)
    Repeat,
}

impl KeyEventType {
    pub fn from_value(value: i32) -> Option<Self> {
        match value {
            0 => Some(Self::Release),
            1 => Some(Self::Press),
            2 => Some(Self::Repeat),
            _ => None,
        }
    }
}

/// A decoded key event.
///
/// Usually carries one code. Sources that report several codes for a single
/// physical action (modifier + key reports) produce a composite event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyEvent {
    pub codes: Vec<KeyCode>,
    pub event_type: KeyEventType,
}

impl KeyEvent {
    pub fn new(code: KeyCode, event_type: KeyEventType) -> Self {
        Self {
            codes: vec![code],
            event_type,
        }
    }

    pub fn composite(codes: impl IntoIterator<Item = KeyCode>, event_type: KeyEventType) -> Self {
        Self {
            codes: codes.into_iter().collect(),
            event_type,
        }
    }

    /// Decode a raw event. Returns `None` for anything that is not a key
    /// state change.
    pub fn decode(raw: &RawEvent) -> Option<Self> {
        if raw.event_type != EV_KEY {
            return None;
        }
        let event_type = KeyEventType::from_value(raw.value)?;
        Some(Self::new(KeyCode(raw.code), event_type))
    }

    pub fn is_press(&self) -> bool {
        self.event_type == KeyEventType::Press
    }
}
