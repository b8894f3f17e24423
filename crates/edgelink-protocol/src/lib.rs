//! TCP transport layer and wire protocol for edgelink.
//!
//! This crate handles TCP connection management (listen, connect with
//! bounded retry, and the `CONNECTED` handshake), message serialisation
//! as newline-delimited JSON, and line reassembly across torn or merged
//! reads.

pub mod connection;
pub mod error;
pub mod transport;
pub mod wire;

pub use connection::{MessageReceiver, MessageSender, PeerConnection};
pub use error::ProtocolError;
pub use transport::{connect, ConnectOptions, Listener};
