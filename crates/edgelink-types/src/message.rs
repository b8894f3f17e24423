//! Protocol message types.
//!
//! Messages are exchanged over two TCP channels between edgelink peers.
//! Pointer traffic goes on the primary channel; keys and control messages go
//! on the secondary one.

use crate::clipboard::ClipboardPayload;
use crate::event::InputEvent;

/// Which of the two session channels a message travels on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Pointer motion, clicks and scroll.
    Primary,
    /// Keys and control messages.
    Secondary,
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Primary => f.write_str("primary"),
            Self::Secondary => f.write_str("secondary"),
        }
    }
}

/// Top-level message envelope.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Input(InputEvent),
    Control(ControlMessage),
}

impl Message {
    /// The channel this message must be sent on.
    #[must_use]
    pub fn channel(&self) -> Channel {
        match self {
            Self::Input(event) if !event.is_keyboard() => Channel::Primary,
            _ => Channel::Secondary,
        }
    }
}

impl From<InputEvent> for Message {
    fn from(event: InputEvent) -> Self {
        Self::Input(event)
    }
}

impl From<ControlMessage> for Message {
    fn from(msg: ControlMessage) -> Self {
        Self::Control(msg)
    }
}

/// Control-plane messages (bidirectional, secondary channel).
#[derive(Debug, Clone, PartialEq)]
pub enum ControlMessage {
    /// The sender's own active-device state after a transition.
    ActiveDeviceChanged(bool),

    /// Clipboard content changed on the sender.
    ClipboardUpdate(ClipboardPayload),

    /// Liveness signal; carries nothing.
    Heartbeat,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::MouseButton;
    use crate::key::KeyToken;
    use crate::screen::NormalizedPointer;

    #[test]
    fn pointer_traffic_is_primary() {
        let moves = Message::from(InputEvent::Move(NormalizedPointer::new(0.5, 0.5)));
        let click = Message::from(InputEvent::Click {
            button: MouseButton::Left,
            pressed: true,
        });
        let scroll = Message::from(InputEvent::Scroll { dx: 0, dy: 1 });
        for msg in [moves, click, scroll] {
            assert_eq!(msg.channel(), Channel::Primary);
        }
    }

    #[test]
    fn keys_and_control_are_secondary() {
        let key = Message::from(InputEvent::KeyPress(KeyToken::Char('a')));
        assert_eq!(key.channel(), Channel::Secondary);
        let control = Message::from(ControlMessage::ActiveDeviceChanged(true));
        assert_eq!(control.channel(), Channel::Secondary);
        let clip = Message::from(ControlMessage::ClipboardUpdate(ClipboardPayload::text("x")));
        assert_eq!(clip.channel(), Channel::Secondary);
        assert_eq!(Message::from(ControlMessage::Heartbeat).channel(), Channel::Secondary);
    }
}
