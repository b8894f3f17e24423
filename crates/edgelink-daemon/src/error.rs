//! Daemon errors.

use edgelink_types::Channel;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid hotkey {hotkey:?}: {reason}")]
    Hotkey { hotkey: String, reason: String },

    #[error("{channel} outbox {reason}")]
    Outbox {
        channel: Channel,
        reason: &'static str,
    },

    #[error("protocol error: {0}")]
    Protocol(#[from] edgelink_protocol::ProtocolError),

    #[error("input error: {0}")]
    Input(#[from] edgelink_input::InputError),

    #[error("clipboard error: {0}")]
    Clipboard(#[from] edgelink_clipboard::ClipboardError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
