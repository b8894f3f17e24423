//! Platform-neutral key tokens.
//!
//! A key travels on the wire as a string: either the literal character it
//! produces (`"a"`, `"?"`) or a named special key written `Key.<name>`
//! (`"Key.shift"`, `"Key.enter"`, `"Key.f5"`). Backends translate tokens
//! to and from their native key codes.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ParseError;

/// Prefix that marks a named special key on the wire.
pub const NAMED_PREFIX: &str = "Key.";

/// A key as carried between machines.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum KeyToken {
    /// A key that produces a single character.
    Char(char),
    /// A recognised special key.
    Named(NamedKey),
    /// Any other token, kept verbatim so it can be forwarded unchanged.
    Unknown(String),
}

impl KeyToken {
    /// The modifier this key acts as, if any.
    #[must_use]
    pub fn modifier(&self) -> Option<Modifier> {
        match self {
            Self::Named(named) => named.modifier(),
            _ => None,
        }
    }

    /// Compare two tokens, ignoring letter case for character keys.
    #[must_use]
    pub fn matches(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Char(a), Self::Char(b)) => a.to_lowercase().eq(b.to_lowercase()),
            (a, b) => a == b,
        }
    }
}

impl std::fmt::Display for KeyToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Char(c) => write!(f, "{c}"),
            Self::Named(named) => write!(f, "{NAMED_PREFIX}{named}"),
            Self::Unknown(raw) => f.write_str(raw),
        }
    }
}

impl FromStr for KeyToken {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(ParseError::KeyToken(s.to_string()));
        }
        if let Some(name) = s.strip_prefix(NAMED_PREFIX) {
            if let Some(named) = NamedKey::from_name(name) {
                return Ok(Self::Named(named));
            }
            return Ok(Self::Unknown(s.to_string()));
        }
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Ok(Self::Char(c)),
            _ => Ok(Self::Unknown(s.to_string())),
        }
    }
}

impl TryFrom<String> for KeyToken {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<KeyToken> for String {
    fn from(token: KeyToken) -> Self {
        token.to_string()
    }
}

/// Keyboard modifiers recognised by the sharing hotkey.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Modifier {
    Control,
    Alt,
    Shift,
    Super,
}

impl Modifier {
    /// Parse a modifier name as written in a hotkey string.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "control" | "ctrl" => Some(Self::Control),
            "alt" | "option" => Some(Self::Alt),
            "shift" => Some(Self::Shift),
            "super" | "cmd" | "win" | "meta" => Some(Self::Super),
            _ => None,
        }
    }
}

/// Named special keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NamedKey {
    Alt,
    AltL,
    AltR,
    AltGr,
    Backspace,
    CapsLock,
    Cmd,
    CmdL,
    CmdR,
    Ctrl,
    CtrlL,
    CtrlR,
    Delete,
    Down,
    End,
    Enter,
    Esc,
    /// Function key `F1`..`F24`.
    F(u8),
    Home,
    Insert,
    Left,
    Menu,
    NumLock,
    PageDown,
    PageUp,
    Pause,
    PrintScreen,
    Right,
    ScrollLock,
    Shift,
    ShiftL,
    ShiftR,
    Space,
    Tab,
    Up,
    MediaPlayPause,
    MediaVolumeMute,
    MediaVolumeDown,
    MediaVolumeUp,
}

const NAMES: &[(NamedKey, &str)] = &[
    (NamedKey::Alt, "alt"),
    (NamedKey::AltL, "alt_l"),
    (NamedKey::AltR, "alt_r"),
    (NamedKey::AltGr, "alt_gr"),
    (NamedKey::Backspace, "backspace"),
    (NamedKey::CapsLock, "caps_lock"),
    (NamedKey::Cmd, "cmd"),
    (NamedKey::CmdL, "cmd_l"),
    (NamedKey::CmdR, "cmd_r"),
    (NamedKey::Ctrl, "ctrl"),
    (NamedKey::CtrlL, "ctrl_l"),
    (NamedKey::CtrlR, "ctrl_r"),
    (NamedKey::Delete, "delete"),
    (NamedKey::Down, "down"),
    (NamedKey::End, "end"),
    (NamedKey::Enter, "enter"),
    (NamedKey::Esc, "esc"),
    (NamedKey::Home, "home"),
    (NamedKey::Insert, "insert"),
    (NamedKey::Left, "left"),
    (NamedKey::Menu, "menu"),
    (NamedKey::NumLock, "num_lock"),
    (NamedKey::PageDown, "page_down"),
    (NamedKey::PageUp, "page_up"),
    (NamedKey::Pause, "pause"),
    (NamedKey::PrintScreen, "print_screen"),
    (NamedKey::Right, "right"),
    (NamedKey::ScrollLock, "scroll_lock"),
    (NamedKey::Shift, "shift"),
    (NamedKey::ShiftL, "shift_l"),
    (NamedKey::ShiftR, "shift_r"),
    (NamedKey::Space, "space"),
    (NamedKey::Tab, "tab"),
    (NamedKey::Up, "up"),
    (NamedKey::MediaPlayPause, "media_play_pause"),
    (NamedKey::MediaVolumeMute, "media_volume_mute"),
    (NamedKey::MediaVolumeDown, "media_volume_down"),
    (NamedKey::MediaVolumeUp, "media_volume_up"),
];

// Alternative spellings accepted when parsing, e.g. from hotkey strings.
const ALIASES: &[(&str, NamedKey)] = &[
    ("return", NamedKey::Enter),
    ("escape", NamedKey::Esc),
    ("del", NamedKey::Delete),
    ("pgup", NamedKey::PageUp),
    ("pgdn", NamedKey::PageDown),
    ("prior", NamedKey::PageUp),
    ("next", NamedKey::PageDown),
    ("print", NamedKey::PrintScreen),
    ("capslock", NamedKey::CapsLock),
    ("numlock", NamedKey::NumLock),
];

impl NamedKey {
    /// Look up a key by its canonical name or an accepted alias
    /// (case-insensitive).
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        let lower = name.to_ascii_lowercase();
        if let Some((key, _)) = NAMES.iter().find(|(_, n)| *n == lower) {
            return Some(*key);
        }
        if let Some((_, key)) = ALIASES.iter().find(|(a, _)| *a == lower) {
            return Some(*key);
        }
        lower
            .strip_prefix('f')
            .and_then(|n| n.parse::<u8>().ok())
            .filter(|n| (1..=24).contains(n))
            .map(Self::F)
    }

    /// The modifier this key acts as, if any.
    #[must_use]
    pub fn modifier(self) -> Option<Modifier> {
        match self {
            Self::Ctrl | Self::CtrlL | Self::CtrlR => Some(Modifier::Control),
            Self::Alt | Self::AltL | Self::AltR | Self::AltGr => Some(Modifier::Alt),
            Self::Shift | Self::ShiftL | Self::ShiftR => Some(Modifier::Shift),
            Self::Cmd | Self::CmdL | Self::CmdR => Some(Modifier::Super),
            _ => None,
        }
    }
}

impl std::fmt::Display for NamedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Self::F(n) = self {
            return write!(f, "f{n}");
        }
        let name = NAMES
            .iter()
            .find(|(key, _)| key == self)
            .map_or("unknown", |(_, name)| *name);
        f.write_str(name)
    }
}
