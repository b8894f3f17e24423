//! Clipboard content types and their wire framing.
//!
//! On the wire a payload is a single string: `text:` followed by the text
//! itself, or `image:` followed by the base64 of a PNG.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::ParseError;

const TEXT_PREFIX: &str = "text:";
const IMAGE_PREFIX: &str = "image:";

/// Kind of clipboard content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClipboardKind {
    /// UTF-8 text.
    Text,
    /// Self-describing image bytes (PNG once normalised).
    Image,
}

/// Clipboard content with kind metadata.
#[derive(Clone, PartialEq, Eq)]
pub struct ClipboardPayload {
    pub kind: ClipboardKind,
    pub bytes: Vec<u8>,
}

impl ClipboardPayload {
    /// Create text clipboard content.
    #[must_use]
    pub fn text(s: &str) -> Self {
        Self {
            kind: ClipboardKind::Text,
            bytes: s.as_bytes().to_vec(),
        }
    }

    /// Create image clipboard content.
    #[must_use]
    pub fn image(bytes: Vec<u8>) -> Self {
        Self {
            kind: ClipboardKind::Image,
            bytes,
        }
    }

    /// Try to interpret the data as UTF-8 text.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        if self.kind == ClipboardKind::Text {
            std::str::from_utf8(&self.bytes).ok()
        } else {
            None
        }
    }

    /// Size of the content in bytes.
    #[must_use]
    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Encode as the wire `content` string.
    #[must_use]
    pub fn to_content(&self) -> String {
        match self.kind {
            ClipboardKind::Text => {
                format!("{TEXT_PREFIX}{}", String::from_utf8_lossy(&self.bytes))
            }
            ClipboardKind::Image => format!("{IMAGE_PREFIX}{}", STANDARD.encode(&self.bytes)),
        }
    }

    /// Decode a wire `content` string.
    ///
    /// Content without a recognised prefix is taken as plain text, which is
    /// what older peers send.
    pub fn from_content(content: &str) -> Result<Self, ParseError> {
        if let Some(text) = content.strip_prefix(TEXT_PREFIX) {
            return Ok(Self::text(text));
        }
        if let Some(encoded) = content.strip_prefix(IMAGE_PREFIX) {
            let bytes = STANDARD
                .decode(encoded.trim())
                .map_err(|e| ParseError::ClipboardContent(format!("bad base64 image: {e}")))?;
            return Ok(Self::image(bytes));
        }
        Ok(Self::text(content))
    }
}

impl std::fmt::Debug for ClipboardPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Clipboard contents can be large or sensitive; log the shape only.
        f.debug_struct("ClipboardPayload")
            .field("kind", &self.kind)
            .field("size", &self.bytes.len())
            .finish()
    }
}
