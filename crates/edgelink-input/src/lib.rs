//! Platform-abstracted input capture, injection and overlay for edgelink.
//!
//! This crate defines the traits that platform backends implement:
//! [`InputCapture`] observes the local keyboard and mouse, [`InputBackend`]
//! reads and moves the pointer and injects remote input, and
//! [`OverlayBackend`] shows the invisible full-screen window that swallows
//! local pointer input while this machine is driving its peer. The
//! [`codec`] module converts between local samples and wire events.

use async_trait::async_trait;
use edgelink_types::{KeyToken, LocalInput, MouseButton, ScreenGeometry};
use tokio::sync::mpsc;

pub mod codec;
pub mod error;
#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use error::InputError;

/// Observes physical input on this machine.
///
/// Implementations forward every local pointer, button, scroll and key
/// sample through the channel, regardless of which machine is in control.
#[async_trait]
pub trait InputCapture: Send + 'static {
    /// Start capturing input, sending samples to `tx`.
    async fn start(&mut self, tx: mpsc::Sender<LocalInput>) -> Result<(), InputError>;

    /// Stop capturing and release all resources.
    async fn shutdown(&mut self) -> Result<(), InputError>;
}

/// Reads and drives the local pointer and keyboard.
#[async_trait]
pub trait InputBackend: Send + Sync + 'static {
    /// Pixel dimensions of the primary display.
    async fn screen(&self) -> Result<ScreenGeometry, InputError>;

    /// Current pointer position in pixels.
    async fn pointer_position(&self) -> Result<(i32, i32), InputError>;

    /// Move the pointer to an absolute pixel position.
    async fn set_pointer_position(&self, x: i32, y: i32) -> Result<(), InputError>;

    async fn press_key(&self, key: &KeyToken) -> Result<(), InputError>;

    async fn release_key(&self, key: &KeyToken) -> Result<(), InputError>;

    async fn press_button(&self, button: MouseButton) -> Result<(), InputError>;

    async fn release_button(&self, button: MouseButton) -> Result<(), InputError>;

    /// Scroll by whole wheel steps.
    async fn scroll(&self, dx: i32, dy: i32) -> Result<(), InputError>;
}

/// Full-screen transparent window shown while this machine drives its peer.
#[async_trait]
pub trait OverlayBackend: Send + Sync + 'static {
    async fn show(&self, width: u32, height: u32) -> Result<(), InputError>;

    async fn hide(&self) -> Result<(), InputError>;
}
