//! Wire format: newline-delimited JSON records.
//!
//! Each message on the wire is one UTF-8 JSON object terminated by `\n`,
//! discriminated by its `type` field:
//!
//! ```text
//! {"type":"move","x":0.5,"y":0.25}
//! {"type":"key_press","key":"Key.shift"}
//! {"type":"active_device","value":true}
//! ```

use edgelink_types::{
    ClipboardPayload, ControlMessage, InputEvent, KeyToken, Message, MouseButton,
    NormalizedPointer,
};
use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

/// Literal the accepting side sends on every new channel.
pub const HANDSHAKE: &[u8] = b"CONNECTED\n";

/// Maximum line length (16 MiB). Longer lines are discarded.
pub const MAX_LINE_LEN: usize = 16 * 1024 * 1024;

/// One JSON record as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireRecord {
    Move { x: f64, y: f64 },
    Click { button: MouseButton, pressed: bool },
    Scroll { dx: i32, dy: i32 },
    KeyPress { key: KeyToken },
    KeyRelease { key: KeyToken },
    ActiveDevice { value: bool },
    Clipboard { content: String },
    Heartbeat,
}

impl From<&Message> for WireRecord {
    fn from(msg: &Message) -> Self {
        match msg {
            Message::Input(InputEvent::Move(p)) => Self::Move { x: p.x, y: p.y },
            Message::Input(InputEvent::Click { button, pressed }) => Self::Click {
                button: *button,
                pressed: *pressed,
            },
            Message::Input(InputEvent::Scroll { dx, dy }) => Self::Scroll { dx: *dx, dy: *dy },
            Message::Input(InputEvent::KeyPress(key)) => Self::KeyPress { key: key.clone() },
            Message::Input(InputEvent::KeyRelease(key)) => Self::KeyRelease { key: key.clone() },
            Message::Control(ControlMessage::ActiveDeviceChanged(value)) => {
                Self::ActiveDevice { value: *value }
            }
            Message::Control(ControlMessage::ClipboardUpdate(payload)) => Self::Clipboard {
                content: payload.to_content(),
            },
            Message::Control(ControlMessage::Heartbeat) => Self::Heartbeat,
        }
    }
}

impl WireRecord {
    fn into_message(self) -> Result<Message, ProtocolError> {
        let msg = match self {
            Self::Move { x, y } => {
                Message::Input(InputEvent::Move(NormalizedPointer::new(x, y)))
            }
            Self::Click { button, pressed } => {
                Message::Input(InputEvent::Click { button, pressed })
            }
            Self::Scroll { dx, dy } => Message::Input(InputEvent::Scroll { dx, dy }),
            Self::KeyPress { key } => Message::Input(InputEvent::KeyPress(key)),
            Self::KeyRelease { key } => Message::Input(InputEvent::KeyRelease(key)),
            Self::ActiveDevice { value } => {
                Message::Control(ControlMessage::ActiveDeviceChanged(value))
            }
            Self::Clipboard { content } => {
                let payload = ClipboardPayload::from_content(&content)
                    .map_err(|e| ProtocolError::Decode(e.to_string()))?;
                Message::Control(ControlMessage::ClipboardUpdate(payload))
            }
            Self::Heartbeat => Message::Control(ControlMessage::Heartbeat),
        };
        Ok(msg)
    }
}

/// Encode a message as one JSON line, including the trailing newline.
pub fn encode_message(msg: &Message) -> Result<Vec<u8>, ProtocolError> {
    let mut line = serde_json::to_vec(&WireRecord::from(msg))
        .map_err(|e| ProtocolError::Encode(e.to_string()))?;
    if line.len() > MAX_LINE_LEN {
        return Err(ProtocolError::Encode(format!(
            "message size {} exceeds maximum {MAX_LINE_LEN}",
            line.len()
        )));
    }
    line.push(b'\n');
    Ok(line)
}

/// Decode a single line (without its newline).
pub fn decode_message(line: &[u8]) -> Result<Message, ProtocolError> {
    let record: WireRecord =
        serde_json::from_slice(line).map_err(|e| ProtocolError::Decode(e.to_string()))?;
    record.into_message()
}

/// Reassembles newline-terminated lines from arbitrary read chunks.
#[derive(Debug)]
pub struct LineBuffer {
    buf: Vec<u8>,
    /// Bytes of `buf` already known to contain no newline.
    scanned: usize,
    /// Set while skipping the remainder of an over-long line.
    discarding: bool,
    limit: usize,
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::with_limit(MAX_LINE_LEN)
    }
}

impl LineBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a buffer that rejects lines longer than `limit` bytes.
    #[must_use]
    pub fn with_limit(limit: usize) -> Self {
        Self {
            buf: Vec::new(),
            scanned: 0,
            discarding: false,
            limit,
        }
    }

    /// Append freshly read bytes.
    pub fn push(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Bytes buffered that do not yet form a complete line.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// Take the next complete, non-blank line.
    ///
    /// Returns `None` when more input is needed. An over-long line yields a
    /// single [`ProtocolError::Decode`] once its terminating newline arrives.
    pub fn next_line(&mut self) -> Option<Result<Vec<u8>, ProtocolError>> {
        loop {
            let Some(offset) = self.buf[self.scanned..].iter().position(|b| *b == b'\n') else {
                self.scanned = self.buf.len();
                if self.buf.len() > self.limit {
                    self.buf.clear();
                    self.scanned = 0;
                    self.discarding = true;
                }
                return None;
            };
            let end = self.scanned + offset;
            let mut line: Vec<u8> = self.buf.drain(..=end).collect();
            self.scanned = 0;
            line.pop();

            if std::mem::take(&mut self.discarding) || line.len() > self.limit {
                return Some(Err(ProtocolError::Decode(format!(
                    "line exceeds maximum length of {} bytes",
                    self.limit
                ))));
            }
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            return Some(Ok(line));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edgelink_types::NamedKey;

    fn line_of(msg: &Message) -> String {
        String::from_utf8(encode_message(msg).unwrap()).unwrap()
    }

    #[test]
    fn records_use_type_tag() {
        let mv = Message::Input(InputEvent::Move(NormalizedPointer::new(0.5, 0.25)));
        let json: serde_json::Value = serde_json::from_str(line_of(&mv).trim_end()).unwrap();
        assert_eq!(json["type"], "move");
        assert_eq!(json["x"], 0.5);
        assert_eq!(json["y"], 0.25);

        let key = Message::Input(InputEvent::KeyRelease(KeyToken::Named(NamedKey::Shift)));
        assert_eq!(line_of(&key), "{\"type\":\"key_release\",\"key\":\"Key.shift\"}\n");

        let active = Message::Control(ControlMessage::ActiveDeviceChanged(false));
        assert_eq!(line_of(&active), "{\"type\":\"active_device\",\"value\":false}\n");

        let clip = Message::Control(ControlMessage::ClipboardUpdate(ClipboardPayload::text("hi")));
        assert_eq!(line_of(&clip), "{\"type\":\"clipboard\",\"content\":\"text:hi\"}\n");

        assert_eq!(
            line_of(&Message::Control(ControlMessage::Heartbeat)),
            "{\"type\":\"heartbeat\"}\n"
        );
    }

    #[test]
    fn decode_foreign_records() {
        let msg = decode_message(br#"{"type":"click","button":"right","pressed":true}"#).unwrap();
        assert_eq!(
            msg,
            Message::Input(InputEvent::Click {
                button: MouseButton::Right,
                pressed: true
            })
        );

        let msg = decode_message(br#"{"type":"scroll","dx":0,"dy":-3}"#).unwrap();
        assert_eq!(msg, Message::Input(InputEvent::Scroll { dx: 0, dy: -3 }));

        // Unknown fields are ignored.
        let msg = decode_message(br#"{"type":"heartbeat","ts":123}"#).unwrap();
        assert_eq!(msg, Message::Control(ControlMessage::Heartbeat));
    }

    #[test]
    fn move_coordinates_are_clamped() {
        let msg = decode_message(br#"{"type":"move","x":1.7,"y":-0.2}"#).unwrap();
        assert_eq!(
            msg,
            Message::Input(InputEvent::Move(NormalizedPointer::new(1.0, 0.0)))
        );
    }

    #[test]
    fn malformed_records_are_decode_errors() {
        for bad in [
            &b"not json"[..],
            br#"{"type":"teleport"}"#,
            br#"{"type":"move","x":"left"}"#,
            br#"{"type":"key_press","key":""}"#,
            br#"{"type":"clipboard","content":"image:@@@"}"#,
        ] {
            assert!(
                matches!(decode_message(bad), Err(ProtocolError::Decode(_))),
                "{}",
                String::from_utf8_lossy(bad)
            );
        }
    }

    #[test]
    fn torn_reads_are_reassembled() {
        let mut buf = LineBuffer::new();
        buf.push(b"{\"type\":\"mo");
        assert!(buf.next_line().is_none());
        buf.push(b"ve\",\"x\":0.1,\"y\":0.2}");
        assert!(buf.next_line().is_none());
        buf.push(b"\n");
        let line = buf.next_line().unwrap().unwrap();
        assert!(decode_message(&line).is_ok());
        assert_eq!(buf.pending(), 0);
    }

    #[test]
    fn merged_reads_are_split() {
        let mut buf = LineBuffer::new();
        buf.push(b"{\"type\":\"heartbeat\"}\n\n{\"type\":\"active_device\",\"value\":true}\r\n{\"ty");
        assert_eq!(buf.next_line().unwrap().unwrap(), b"{\"type\":\"heartbeat\"}");
        assert_eq!(
            buf.next_line().unwrap().unwrap(),
            b"{\"type\":\"active_device\",\"value\":true}"
        );
        assert!(buf.next_line().is_none());
        assert_eq!(buf.pending(), 4);
    }

    #[test]
    fn over_long_line_is_discarded_once() {
        let mut buf = LineBuffer::with_limit(8);
        buf.push(b"0123456789");
        assert!(buf.next_line().is_none());
        buf.push(b"abc\nok\n");
        assert!(matches!(buf.next_line(), Some(Err(ProtocolError::Decode(_)))));
        assert_eq!(buf.next_line().unwrap().unwrap(), b"ok");
        assert!(buf.next_line().is_none());
    }
}
