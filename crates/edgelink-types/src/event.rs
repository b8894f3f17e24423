//! Input event types.
//!
//! [`LocalInput`] is what the capture backend reports in local pixels;
//! [`InputEvent`] is the platform-agnostic form that travels between machines.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ParseError;
use crate::key::KeyToken;
use crate::screen::NormalizedPointer;

/// A platform-agnostic input event as sent to the peer.
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    /// Absolute pointer position.
    Move(NormalizedPointer),

    /// Mouse button press or release.
    Click { button: MouseButton, pressed: bool },

    /// Scroll wheel steps (positive = right/up).
    Scroll { dx: i32, dy: i32 },

    /// Key press.
    KeyPress(KeyToken),

    /// Key release.
    KeyRelease(KeyToken),
}

impl InputEvent {
    /// Whether this event carries keyboard input.
    #[must_use]
    pub fn is_keyboard(&self) -> bool {
        matches!(self, Self::KeyPress(_) | Self::KeyRelease(_))
    }
}

/// A device-native input sample observed on this machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalInput {
    /// The pointer moved to a pixel position.
    PointerMoved { x: i32, y: i32 },

    /// A mouse button changed state.
    Button { button: MouseButton, pressed: bool },

    /// Scroll wheel steps.
    Scroll { dx: i32, dy: i32 },

    /// A key changed state.
    Key { key: KeyToken, pressed: bool },
}

/// Mouse button identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum MouseButton {
    Left,
    Right,
    Middle,
    Back,
    Forward,
    /// Extra buttons beyond the standard five.
    Other(u16),
}

impl std::fmt::Display for MouseButton {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Left => f.write_str("left"),
            Self::Right => f.write_str("right"),
            Self::Middle => f.write_str("middle"),
            Self::Back => f.write_str("x1"),
            Self::Forward => f.write_str("x2"),
            Self::Other(n) => write!(f, "button{n}"),
        }
    }
}

impl FromStr for MouseButton {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "left" => Ok(Self::Left),
            "right" => Ok(Self::Right),
            "middle" => Ok(Self::Middle),
            "x1" | "back" => Ok(Self::Back),
            "x2" | "forward" => Ok(Self::Forward),
            other => other
                .strip_prefix("button")
                .and_then(|n| n.parse().ok())
                .map(Self::Other)
                .ok_or_else(|| ParseError::MouseButton(s.to_string())),
        }
    }
}

impl TryFrom<String> for MouseButton {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MouseButton> for String {
    fn from(button: MouseButton) -> Self {
        button.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::NamedKey;

    #[test]
    fn mouse_button_names() {
        for button in [
            MouseButton::Left,
            MouseButton::Right,
            MouseButton::Middle,
            MouseButton::Back,
            MouseButton::Forward,
            MouseButton::Other(9),
        ] {
            assert_eq!(button.to_string().parse::<MouseButton>().unwrap(), button);
        }
        assert_eq!("Back".parse::<MouseButton>().unwrap(), MouseButton::Back);
        assert!("wheel".parse::<MouseButton>().is_err());
        assert!("buttonX".parse::<MouseButton>().is_err());
    }

    #[test]
    fn keyboard_classification() {
        assert!(InputEvent::KeyPress(KeyToken::Char('a')).is_keyboard());
        assert!(InputEvent::KeyRelease(KeyToken::Named(NamedKey::Esc)).is_keyboard());
        assert!(!InputEvent::Scroll { dx: 0, dy: -1 }.is_keyboard());
    }
}
