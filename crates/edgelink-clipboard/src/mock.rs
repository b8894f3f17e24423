//! In-memory clipboard for tests and headless runs.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use edgelink_types::ClipboardPayload;

use crate::error::ClipboardError;
use crate::ClipboardBackend;

type ReadTransform = Arc<dyn Fn(&ClipboardPayload) -> ClipboardPayload + Send + Sync>;

#[derive(Default)]
struct Inner {
    content: Mutex<Option<ClipboardPayload>>,
    transform: Mutex<Option<ReadTransform>>,
    writes: AtomicU32,
    failing: AtomicBool,
}

/// Mock clipboard. Clones share the same content, so a test can keep one
/// clone to play the user while the daemon owns another.
#[derive(Clone, Default)]
pub struct MockClipboard {
    inner: Arc<Inner>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockClipboard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the content as if the user copied something.
    pub fn set(&self, payload: ClipboardPayload) {
        *lock(&self.inner.content) = Some(payload);
    }

    /// The stored content, without any read transform.
    #[must_use]
    pub fn get(&self) -> Option<ClipboardPayload> {
        lock(&self.inner.content).clone()
    }

    /// Number of successful `write` calls.
    #[must_use]
    pub fn write_count(&self) -> u32 {
        self.inner.writes.load(Ordering::SeqCst)
    }

    /// Make reads and writes fail until switched back.
    pub fn set_failing(&self, failing: bool) {
        self.inner.failing.store(failing, Ordering::SeqCst);
    }

    /// Rewrite content on read, the way a platform clipboard converts what
    /// it was given.
    pub fn set_read_transform(
        &self,
        transform: impl Fn(&ClipboardPayload) -> ClipboardPayload + Send + Sync + 'static,
    ) {
        *lock(&self.inner.transform) = Some(Arc::new(transform));
    }
}

#[async_trait]
impl ClipboardBackend for MockClipboard {
    async fn read(&self) -> Result<Option<ClipboardPayload>, ClipboardError> {
        if self.inner.failing.load(Ordering::SeqCst) {
            return Err(ClipboardError::AccessDenied);
        }
        let content = lock(&self.inner.content).clone();
        let transform = lock(&self.inner.transform).clone();
        Ok(match (content, transform) {
            (Some(content), Some(transform)) => Some(transform(&content)),
            (content, _) => content,
        })
    }

    async fn write(&self, payload: &ClipboardPayload) -> Result<(), ClipboardError> {
        if self.inner.failing.load(Ordering::SeqCst) {
            return Err(ClipboardError::AccessDenied);
        }
        *lock(&self.inner.content) = Some(payload.clone());
        self.inner.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
