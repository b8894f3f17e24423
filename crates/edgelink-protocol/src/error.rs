//! Protocol and transport errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("could not connect to {addr} after {attempts} attempt(s): {reason}")]
    Connect {
        addr: String,
        attempts: u32,
        reason: String,
    },

    #[error("handshake failed: {0}")]
    Handshake(String),

    #[error("link failure: {0}")]
    Link(String),

    #[error("connection closed by peer")]
    Closed,

    #[error("malformed message: {0}")]
    Decode(String),

    #[error("serialisation error: {0}")]
    Encode(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
