//! Parse errors for the textual forms of shared types.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unknown role: {0:?} (expected \"server\" or \"client\")")]
    Role(String),

    #[error("unknown edge: {0:?} (expected Top, Left, Right or Bottom)")]
    Edge(String),

    #[error("invalid key token: {0:?}")]
    KeyToken(String),

    #[error("unknown mouse button: {0:?}")]
    MouseButton(String),

    #[error("invalid clipboard content: {0}")]
    ClipboardContent(String),
}
