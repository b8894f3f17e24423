//! Shared types for edgelink.
//!
//! This crate contains all types shared across the edgelink workspace:
//! session roles, screen geometry and edges, input events and key tokens,
//! clipboard payloads, and protocol messages.

pub mod clipboard;
pub mod error;
pub mod event;
pub mod key;
pub mod message;
pub mod role;
pub mod screen;

pub use clipboard::{ClipboardKind, ClipboardPayload};
pub use error::ParseError;
pub use event::{InputEvent, LocalInput, MouseButton};
pub use key::{KeyToken, Modifier, NamedKey};
pub use message::{Channel, ControlMessage, Message};
pub use role::Role;
pub use screen::{Edge, NormalizedPointer, ScreenGeometry};
