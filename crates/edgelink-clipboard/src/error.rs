//! Clipboard subsystem errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClipboardError {
    #[error("clipboard access denied")]
    AccessDenied,

    #[error("clipboard content too large: {size} bytes (max {max} bytes)")]
    TooLarge { size: usize, max: usize },

    #[error("image data too small: {0} bytes")]
    TooSmall(usize),

    #[error("failed to decode image: {0}")]
    ImageDecode(String),

    #[error("failed to encode image: {0}")]
    ImageEncode(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
