//! Process-wide flags shared by every session task.

use std::sync::atomic::{AtomicBool, Ordering};

/// Flags read and written by the edge monitor, the session readers, the
/// hotkey gate and the surrounding application.
#[derive(Debug)]
pub struct SharedState {
    running: AtomicBool,
    active: AtomicBool,
    sharing_enabled: AtomicBool,
    cooldown: AtomicBool,
}

impl SharedState {
    #[must_use]
    pub fn new(sharing_enabled: bool) -> Self {
        Self {
            running: AtomicBool::new(true),
            active: AtomicBool::new(false),
            sharing_enabled: AtomicBool::new(sharing_enabled),
            cooldown: AtomicBool::new(false),
        }
    }

    /// False once the daemon has been asked to stop.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::SeqCst);
    }

    /// Whether this machine currently owns the pointer and keyboard.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    pub fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::SeqCst);
    }

    pub fn is_sharing_enabled(&self) -> bool {
        self.sharing_enabled.load(Ordering::SeqCst)
    }

    /// Flip sharing and return the new value.
    pub fn toggle_sharing(&self) -> bool {
        !self.sharing_enabled.fetch_xor(true, Ordering::SeqCst)
    }

    /// Set after every edge transition until the pointer is back inside.
    pub fn cooldown(&self) -> bool {
        self.cooldown.load(Ordering::SeqCst)
    }

    pub fn set_cooldown(&self, cooldown: bool) {
        self.cooldown.store(cooldown, Ordering::SeqCst);
    }

    /// Clear per-session flags at session start and teardown.
    pub fn reset_session(&self) {
        self.set_active(false);
        self.set_cooldown(false);
    }
}

/// Lifecycle phase of a session, published to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// No session has been started yet.
    Idle,
    /// Listening for or connecting to the peer.
    Connecting,
    /// Both channels are up.
    Live,
    /// The last session has been torn down.
    Ended,
}

impl std::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Live => write!(f, "Live"),
            Self::Ended => write!(f, "Ended"),
        }
    }
}
