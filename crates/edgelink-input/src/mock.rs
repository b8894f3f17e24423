//! In-memory input backends for tests and headless runs.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use edgelink_types::{KeyToken, LocalInput, MouseButton, ScreenGeometry};
use tokio::sync::mpsc;

use crate::error::InputError;
use crate::{InputBackend, InputCapture, OverlayBackend};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// MockCapture
// ---------------------------------------------------------------------------

/// Mock input capture backend.
///
/// Returns a `mpsc::Sender<LocalInput>` that tests use to inject samples.
/// When `start()` is called, it spawns a task that forwards injected samples
/// to the daemon's capture channel.
pub struct MockCapture {
    feed_rx: Option<mpsc::Receiver<LocalInput>>,
    shutdown: Arc<AtomicBool>,
}

impl MockCapture {
    /// Create a new mock capture and a sender for injecting samples.
    #[must_use]
    pub fn new() -> (Self, mpsc::Sender<LocalInput>) {
        let (feed_tx, feed_rx) = mpsc::channel(1024);
        let capture = Self {
            feed_rx: Some(feed_rx),
            shutdown: Arc::new(AtomicBool::new(false)),
        };
        (capture, feed_tx)
    }
}

#[async_trait]
impl InputCapture for MockCapture {
    async fn start(&mut self, tx: mpsc::Sender<LocalInput>) -> Result<(), InputError> {
        let mut feed_rx = self
            .feed_rx
            .take()
            .ok_or_else(|| InputError::Other(anyhow::anyhow!("MockCapture already started")))?;
        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            while let Some(sample) = feed_rx.recv().await {
                if shutdown.load(Ordering::SeqCst) {
                    break;
                }
                if tx.send(sample).await.is_err() {
                    break;
                }
            }
        });
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<(), InputError> {
        self.shutdown.store(true, Ordering::SeqCst);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MockInput
// ---------------------------------------------------------------------------

/// Recorded injection for test observation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Injected {
    PointerSet { x: i32, y: i32 },
    KeyPressed(KeyToken),
    KeyReleased(KeyToken),
    ButtonPressed(MouseButton),
    ButtonReleased(MouseButton),
    Scroll { dx: i32, dy: i32 },
}

#[derive(Debug)]
struct MockInputState {
    screen: ScreenGeometry,
    pointer: (i32, i32),
    injected: Vec<Injected>,
    failing: bool,
}

/// Mock pointer/keyboard backend with a simulated screen.
pub struct MockInput {
    state: Arc<Mutex<MockInputState>>,
}

impl MockInput {
    /// Create a backend for a screen of the given size, pointer centred.
    #[must_use]
    pub fn new(screen: ScreenGeometry) -> Self {
        let centre = (
            i32::try_from(screen.width / 2).unwrap_or(0),
            i32::try_from(screen.height / 2).unwrap_or(0),
        );
        Self {
            state: Arc::new(Mutex::new(MockInputState {
                screen,
                pointer: centre,
                injected: Vec::new(),
                failing: false,
            })),
        }
    }

    /// Get a clonable handle for driving and observing the backend.
    #[must_use]
    pub fn handle(&self) -> MockInputHandle {
        MockInputHandle {
            state: Arc::clone(&self.state),
        }
    }

    fn record(&self, action: Injected) -> Result<(), InputError> {
        let mut state = lock(&self.state);
        if state.failing {
            return Err(InputError::Inject(format!("{action:?} rejected")));
        }
        if let Injected::PointerSet { x, y } = action {
            state.pointer = (x, y);
        }
        state.injected.push(action);
        Ok(())
    }
}

/// Clonable handle for `MockInput`.
///
/// Tests use this to move the "physical" pointer and inspect injections.
#[derive(Clone)]
pub struct MockInputHandle {
    state: Arc<Mutex<MockInputState>>,
}

impl MockInputHandle {
    /// Move the pointer as if the user did it; not recorded as an injection.
    pub fn move_pointer(&self, x: i32, y: i32) {
        lock(&self.state).pointer = (x, y);
    }

    #[must_use]
    pub fn pointer(&self) -> (i32, i32) {
        lock(&self.state).pointer
    }

    /// Get a snapshot of all injections so far.
    #[must_use]
    pub fn injected(&self) -> Vec<Injected> {
        lock(&self.state).injected.clone()
    }

    pub fn clear(&self) {
        lock(&self.state).injected.clear();
    }

    /// Make every backend call fail until switched back.
    pub fn set_failing(&self, failing: bool) {
        lock(&self.state).failing = failing;
    }
}

#[async_trait]
impl InputBackend for MockInput {
    async fn screen(&self) -> Result<ScreenGeometry, InputError> {
        Ok(lock(&self.state).screen)
    }

    async fn pointer_position(&self) -> Result<(i32, i32), InputError> {
        let state = lock(&self.state);
        if state.failing {
            return Err(InputError::Pointer("mock failure".to_string()));
        }
        Ok(state.pointer)
    }

    async fn set_pointer_position(&self, x: i32, y: i32) -> Result<(), InputError> {
        self.record(Injected::PointerSet { x, y })
    }

    async fn press_key(&self, key: &KeyToken) -> Result<(), InputError> {
        self.record(Injected::KeyPressed(key.clone()))
    }

    async fn release_key(&self, key: &KeyToken) -> Result<(), InputError> {
        self.record(Injected::KeyReleased(key.clone()))
    }

    async fn press_button(&self, button: MouseButton) -> Result<(), InputError> {
        self.record(Injected::ButtonPressed(button))
    }

    async fn release_button(&self, button: MouseButton) -> Result<(), InputError> {
        self.record(Injected::ButtonReleased(button))
    }

    async fn scroll(&self, dx: i32, dy: i32) -> Result<(), InputError> {
        self.record(Injected::Scroll { dx, dy })
    }
}

// ---------------------------------------------------------------------------
// MockOverlay
// ---------------------------------------------------------------------------

/// Mock overlay that only tracks visibility.
#[derive(Default)]
pub struct MockOverlay {
    visible: Arc<AtomicBool>,
    shown: Arc<AtomicU32>,
}

impl MockOverlay {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a clonable handle for observing the overlay.
    #[must_use]
    pub fn handle(&self) -> MockOverlayHandle {
        MockOverlayHandle {
            visible: Arc::clone(&self.visible),
            shown: Arc::clone(&self.shown),
        }
    }
}

/// Clonable observer handle for `MockOverlay`.
#[derive(Clone)]
pub struct MockOverlayHandle {
    visible: Arc<AtomicBool>,
    shown: Arc<AtomicU32>,
}

impl MockOverlayHandle {
    #[must_use]
    pub fn is_visible(&self) -> bool {
        self.visible.load(Ordering::SeqCst)
    }

    /// How many times the overlay has been shown.
    #[must_use]
    pub fn show_count(&self) -> u32 {
        self.shown.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OverlayBackend for MockOverlay {
    async fn show(&self, _width: u32, _height: u32) -> Result<(), InputError> {
        self.visible.store(true, Ordering::SeqCst);
        self.shown.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn hide(&self) -> Result<(), InputError> {
        self.visible.store(false, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn capture_forwards_fed_samples() {
        let (mut capture, feed) = MockCapture::new();
        let (tx, mut rx) = mpsc::channel(8);
        capture.start(tx.clone()).await.unwrap();
        assert!(capture.start(tx).await.is_err());

        feed.send(LocalInput::Scroll { dx: 1, dy: 0 }).await.unwrap();
        assert_eq!(rx.recv().await, Some(LocalInput::Scroll { dx: 1, dy: 0 }));
    }

    #[tokio::test]
    async fn user_moves_are_not_injections() {
        let input = MockInput::new(ScreenGeometry::new(100, 80));
        let handle = input.handle();
        assert_eq!(input.pointer_position().await.unwrap(), (50, 40));
        handle.move_pointer(99, 10);
        assert_eq!(input.pointer_position().await.unwrap(), (99, 10));
        assert!(handle.injected().is_empty());
    }

    #[tokio::test]
    async fn overlay_visibility() {
        let overlay = MockOverlay::new();
        let handle = overlay.handle();
        overlay.show(10, 10).await.unwrap();
        assert!(handle.is_visible());
        overlay.hide().await.unwrap();
        assert!(!handle.is_visible());
        assert_eq!(handle.show_count(), 1);
    }
}
