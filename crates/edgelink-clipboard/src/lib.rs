//! Clipboard synchronisation for edgelink.
//!
//! Defines the [`ClipboardBackend`] trait for platform clipboard access,
//! the platform-neutral image normalisation in [`normalize`], and
//! [`ClipboardSync`], which decides what to send and applies what arrives
//! without echoing it back.

use async_trait::async_trait;
use edgelink_types::ClipboardPayload;

pub mod error;
pub mod normalize;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod sync;

pub use error::ClipboardError;
pub use sync::ClipboardSync;

/// Platform clipboard access.
///
/// Image payloads handed to `write` are PNG; the backend owns conversion to
/// the platform's native form. `read` may return images in any format the
/// platform holds.
#[async_trait]
pub trait ClipboardBackend: Send + Sync + 'static {
    /// Get the current clipboard content, or `None` if it is empty or holds
    /// nothing transferable.
    async fn read(&self) -> Result<Option<ClipboardPayload>, ClipboardError>;

    /// Replace the clipboard content.
    async fn write(&self, payload: &ClipboardPayload) -> Result<(), ClipboardError>;
}
