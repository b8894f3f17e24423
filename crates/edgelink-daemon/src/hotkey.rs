//! Sharing hotkey.
//!
//! A hotkey is written as lowercase tokens joined by `+`, modifiers first:
//! `control+alt+s`, `control+shift+f12`. The last token is a character or a
//! named key. An empty string disables the hotkey.

use std::collections::BTreeSet;
use std::str::FromStr;

use edgelink_types::{KeyToken, Modifier, NamedKey};

use crate::error::DaemonError;

/// A parsed key combination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hotkey {
    modifiers: BTreeSet<Modifier>,
    key: KeyToken,
}

impl Hotkey {
    /// Whether `modifiers` held together with `key` make up this hotkey.
    pub fn is_pressed(&self, modifiers: &BTreeSet<Modifier>, key: &KeyToken) -> bool {
        self.modifiers == *modifiers && self.key.matches(key)
    }
}

impl FromStr for Hotkey {
    type Err = DaemonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| DaemonError::Hotkey {
            hotkey: s.to_string(),
            reason: reason.to_string(),
        };

        let lower = s.trim().to_ascii_lowercase();
        let tokens: Vec<&str> = lower.split('+').map(str::trim).collect();
        let Some((last, mods)) = tokens.split_last() else {
            return Err(invalid("empty hotkey"));
        };
        if tokens.iter().any(|t| t.is_empty()) {
            return Err(invalid("empty token"));
        }

        let mut modifiers = BTreeSet::new();
        for name in mods {
            let modifier = Modifier::from_name(name)
                .ok_or_else(|| invalid(&format!("{name:?} is not a modifier")))?;
            modifiers.insert(modifier);
        }

        if Modifier::from_name(last).is_some() {
            return Err(invalid("hotkey must end with a non-modifier key"));
        }
        let mut chars = last.chars();
        let key = match (chars.next(), chars.next()) {
            (Some(c), None) => KeyToken::Char(c),
            _ => NamedKey::from_name(last)
                .map(KeyToken::Named)
                .ok_or_else(|| invalid(&format!("unknown key {last:?}")))?,
        };

        Ok(Self { modifiers, key })
    }
}

/// Watches the local key stream for the sharing hotkey.
#[derive(Debug)]
pub struct HotkeyGate {
    hotkey: Option<Hotkey>,
    held_modifiers: BTreeSet<Modifier>,
    last_key: Option<KeyToken>,
    /// Set after firing until the key is released, so auto-repeat does not
    /// toggle again.
    latched: bool,
}

impl HotkeyGate {
    /// Build a gate for a configured hotkey string.
    pub fn new(hotkey: &str) -> Result<Self, DaemonError> {
        let hotkey = if hotkey.trim().is_empty() {
            None
        } else {
            Some(hotkey.parse()?)
        };
        Ok(Self {
            hotkey,
            held_modifiers: BTreeSet::new(),
            last_key: None,
            latched: false,
        })
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.hotkey.is_some()
    }

    /// Feed one local key event. Returns `true` when the hotkey fires.
    pub fn on_key(&mut self, key: &KeyToken, pressed: bool) -> bool {
        if let Some(modifier) = key.modifier() {
            if pressed {
                self.held_modifiers.insert(modifier);
            } else {
                self.held_modifiers.remove(&modifier);
            }
        } else if pressed {
            self.last_key = Some(key.clone());
        } else if self.last_key.as_ref().is_some_and(|k| k.matches(key)) {
            self.last_key = None;
            self.latched = false;
        }

        if !pressed || self.latched {
            return false;
        }
        let (Some(hotkey), Some(last)) = (&self.hotkey, &self.last_key) else {
            return false;
        };
        if hotkey.is_pressed(&self.held_modifiers, last) {
            self.latched = true;
            return true;
        }
        false
    }
}
