//! Change detection and echo suppression.
//!
//! [`ClipboardSync`] remembers the last clipboard value this side sent or
//! received, as the local clipboard reports it. A local read that matches it
//! is not a change, so a value applied from the peer is never sent back.
//! Both sides changing the clipboard at the same moment can still race.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use edgelink_types::{ClipboardKind, ClipboardPayload};
use tracing::{debug, info, warn};

use crate::error::ClipboardError;
use crate::normalize;
use crate::ClipboardBackend;

/// Default cap on clipboard payloads (10 MiB).
pub const DEFAULT_MAX_SIZE: usize = 10 * 1024 * 1024;

pub struct ClipboardSync {
    backend: Arc<dyn ClipboardBackend>,
    last: Mutex<Option<ClipboardPayload>>,
    max_size: usize,
}

impl ClipboardSync {
    #[must_use]
    pub fn new(backend: Arc<dyn ClipboardBackend>, max_size: usize) -> Self {
        Self {
            backend,
            last: Mutex::new(None),
            max_size,
        }
    }

    fn last_lock(&self) -> MutexGuard<'_, Option<ClipboardPayload>> {
        self.last.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Forget the last value, so the current clipboard goes to the next
    /// peer even if it has not changed.
    pub fn reset(&self) {
        *self.last_lock() = None;
    }

    /// Check the local clipboard for a value the peer has not seen.
    ///
    /// Returns the payload to send, already normalised, or `None` if the
    /// clipboard is empty, unchanged, unreadable, or too large.
    pub async fn local_change(&self) -> Option<ClipboardPayload> {
        let current = match self.backend.read().await {
            Ok(Some(current)) => current,
            Ok(None) => return None,
            Err(e) => {
                debug!(error = %e, "clipboard read failed");
                return None;
            }
        };
        if current.is_empty() {
            return None;
        }
        if current.size() > self.max_size {
            warn!(
                size = current.size(),
                max = self.max_size,
                "clipboard content too large; not sending"
            );
            return None;
        }
        {
            let mut last = self.last_lock();
            if last.as_ref() == Some(&current) {
                return None;
            }
            *last = Some(current.clone());
        }
        debug!(kind = ?current.kind, size = current.size(), "local clipboard changed");
        Some(normalize::prepare_outbound(current))
    }

    /// Apply a payload received from the peer.
    ///
    /// Returns `Ok(false)` if the local clipboard already held it.
    pub async fn apply_remote(&self, payload: ClipboardPayload) -> Result<bool, ClipboardError> {
        if payload.size() > self.max_size {
            return Err(ClipboardError::TooLarge {
                size: payload.size(),
                max: self.max_size,
            });
        }
        if let Ok(Some(current)) = self.backend.read().await {
            if current == payload {
                *self.last_lock() = Some(current);
                return Ok(false);
            }
        }

        let applied = match payload.kind {
            ClipboardKind::Text => payload,
            ClipboardKind::Image => {
                if payload.size() < normalize::MIN_IMAGE_LEN {
                    return Err(ClipboardError::TooSmall(payload.size()));
                }
                match normalize::to_png(&payload.bytes) {
                    Ok(png) => ClipboardPayload::image(png),
                    Err(e) => {
                        warn!(error = %e, "received image could not be decoded; storing raw bytes");
                        payload
                    }
                }
            }
        };

        self.backend.write(&applied).await?;
        info!(kind = ?applied.kind, size = applied.size(), "applied remote clipboard");

        // Track what the clipboard reports now, which may differ from what
        // was written once the platform converts it.
        let reported = match self.backend.read().await {
            Ok(Some(reported)) => reported,
            _ => applied,
        };
        *self.last_lock() = Some(reported);
        Ok(true)
    }
}
