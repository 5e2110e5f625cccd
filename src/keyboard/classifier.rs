//! Keyboard detection from device name and key capabilities
//!
//! Name matching alone lets through sub-devices such as "keyboard backlight"
//! controllers that only expose a couple of keys, so a device must also
//! report every key in the reference set.

use super::keymap::REFERENCE_KEYS;
use super::KeyCode;
use std::collections::HashSet;

/// Default substrings that mark a device name as keyboard-like
pub const DEFAULT_NAME_PATTERNS: [&str; 3] = ["keyboard", "keybrd", "keypad"];

/// Decides whether an input device counts as a full keyboard
#[derive(Debug, Clone)]
pub struct Classifier {
    name_patterns: Vec<String>,
    required_keys: HashSet<KeyCode>,
}

impl Classifier {
    pub fn new(
        name_patterns: impl IntoIterator<Item = impl AsRef<str>>,
        required_keys: impl IntoIterator<Item = KeyCode>,
    ) -> Self {
        Self {
            name_patterns: name_patterns
                .into_iter()
                .map(|p| p.as_ref().trim().to_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
            required_keys: required_keys.into_iter().collect(),
        }
    }

    pub fn name_patterns(&self) -> &[String] {
        &self.name_patterns
    }

    pub fn required_keys(&self) -> &HashSet<KeyCode> {
        &self.required_keys
    }

    /// True if the name contains one of the patterns, ignoring case
    pub fn name_matches(&self, name: &str) -> bool {
        let name = name.to_lowercase();
        self.name_patterns.iter().any(|p| name.contains(p.as_str()))
    }

    /// True if the capability set covers every required key
    pub fn has_required_keys(&self, capabilities: &HashSet<KeyCode>) -> bool {
        self.required_keys.is_subset(capabilities)
    }

    /// A device without a key capability map is passed as `None` and never
    /// qualifies.
    pub fn qualifies(&self, name: &str, capabilities: Option<&HashSet<KeyCode>>) -> bool {
        if !self.name_matches(name) {
            return false;
        }
        let empty = HashSet::new();
        self.has_required_keys(capabilities.unwrap_or(&empty))
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(DEFAULT_NAME_PATTERNS, REFERENCE_KEYS)
    }
}

/// Classify with the default patterns and reference keys
pub fn is_qualifying_keyboard(name: &str, capabilities: Option<&HashSet<KeyCode>>) -> bool {
    Classifier::default().qualifies(name, capabilities)
}
