//! Edge handoff state machine (server role).
//!
//! The monitor polls the local pointer. Touching the configured edge hands
//! control to the peer: the pointer jumps just inside the opposite edge, the
//! overlay goes up, and the peer is told. Touching that opposite edge takes
//! control back. After each transition a cooldown holds until the pointer is
//! strictly inside the margins, so a pointer parked on an edge cannot flap.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use edgelink_clipboard::ClipboardSync;
use edgelink_input::{InputBackend, OverlayBackend};
use edgelink_types::{
    ControlMessage, Edge, InputEvent, Message, NormalizedPointer, ScreenGeometry,
};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::DaemonError;
use crate::session::Outbox;
use crate::state::SharedState;

/// Result of a single poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Control moved to the peer.
    Activated,
    /// Control came back to this machine.
    Deactivated,
}

pub struct EdgeMonitor {
    state: Arc<SharedState>,
    input: Arc<dyn InputBackend>,
    overlay: Arc<dyn OverlayBackend>,
    clipboard: Option<Arc<ClipboardSync>>,
    outbox: Outbox,
    edge: Edge,
    margin: i32,
    /// Serialises polls with forced transitions.
    transition: Mutex<()>,
}

impl EdgeMonitor {
    pub fn new(
        state: Arc<SharedState>,
        input: Arc<dyn InputBackend>,
        overlay: Arc<dyn OverlayBackend>,
        clipboard: Option<Arc<ClipboardSync>>,
        outbox: Outbox,
        edge: Edge,
        margin: i32,
    ) -> Self {
        Self {
            state,
            input,
            overlay,
            clipboard,
            outbox,
            edge,
            margin,
            transition: Mutex::new(()),
        }
    }

    /// Poll the pointer once and make at most one transition.
    pub async fn tick(&self) -> Option<Transition> {
        let _guard = self.transition.lock().await;

        let screen = match self.input.screen().await {
            Ok(screen) => screen,
            Err(e) => {
                warn!(error = %e, "could not read screen size");
                return None;
            }
        };
        let (x, y) = match self.input.pointer_position().await {
            Ok(pos) => pos,
            Err(e) => {
                warn!(error = %e, "could not read pointer position");
                return None;
            }
        };

        if self.state.cooldown() {
            if screen.is_interior(x, y, self.margin) {
                debug!(x, y, "edge cooldown cleared");
                self.state.set_cooldown(false);
            }
            return None;
        }

        if !self.state.is_active() {
            if self.state.is_sharing_enabled() && screen.is_at_edge(x, y, self.edge, self.margin) {
                if let Err(e) = self.activate(&screen, x, y).await {
                    warn!(error = %e, "handoff to peer interrupted");
                }
                return self.state.is_active().then_some(Transition::Activated);
            }
        } else if screen.is_at_edge(x, y, self.edge.opposite(), self.margin) {
            if let Err(e) = self.deactivate(&screen, x, y).await {
                warn!(error = %e, "return from peer interrupted");
            }
            return (!self.state.is_active()).then_some(Transition::Deactivated);
        }
        None
    }

    async fn activate(&self, screen: &ScreenGeometry, x: i32, y: i32) -> Result<(), DaemonError> {
        // Control only moves once the peer has been told.
        self.outbox
            .send(Message::Control(ControlMessage::ActiveDeviceChanged(true)))
            .await?;
        self.state.set_active(true);
        self.state.set_cooldown(true);

        let (tx, ty) = screen.inside(self.edge.opposite(), self.margin, x, y);
        info!(edge = %self.edge, from = ?(x, y), to = ?(tx, ty), "pointer crossed to peer");
        if let Err(e) = self.input.set_pointer_position(tx, ty).await {
            warn!(error = %e, "failed to move pointer");
        }
        if let Err(e) = self.overlay.show(screen.width, screen.height).await {
            warn!(error = %e, "failed to show overlay");
        }

        self.outbox
            .send(Message::Input(InputEvent::Move(
                NormalizedPointer::from_pixels(tx, ty, screen),
            )))
            .await?;

        if let Some(clipboard) = &self.clipboard {
            if let Some(payload) = clipboard.local_change().await {
                self.outbox
                    .send(Message::Control(ControlMessage::ClipboardUpdate(payload)))
                    .await?;
            }
        }
        Ok(())
    }

    async fn deactivate(&self, screen: &ScreenGeometry, x: i32, y: i32) -> Result<(), DaemonError> {
        self.outbox
            .send(Message::Control(ControlMessage::ActiveDeviceChanged(false)))
            .await?;
        self.state.set_active(false);
        self.state.set_cooldown(true);

        let (tx, ty) = screen.inside(self.edge, self.margin, x, y);
        info!(edge = %self.edge.opposite(), from = ?(x, y), to = ?(tx, ty), "pointer returned");
        if let Err(e) = self.input.set_pointer_position(tx, ty).await {
            warn!(error = %e, "failed to move pointer");
        }
        self.hide_overlay().await;
        Ok(())
    }

    async fn hide_overlay(&self) {
        if let Err(e) = self.overlay.hide().await {
            warn!(error = %e, "failed to hide overlay");
        }
    }

    /// Take control back immediately, without moving the pointer.
    ///
    /// Returns `false` if this machine was not active or the peer could not
    /// be told.
    pub async fn force_inactive(&self) -> bool {
        let _guard = self.transition.lock().await;
        if !self.state.is_active() {
            return false;
        }
        if let Err(e) = self
            .outbox
            .send(Message::Control(ControlMessage::ActiveDeviceChanged(false)))
            .await
        {
            // Teardown of the lost link hands control back.
            warn!(error = %e, "could not tell peer control is back");
            return false;
        }
        self.state.set_active(false);
        info!("control forced back to this machine");
        self.hide_overlay().await;
        true
    }

    /// The peer says it is active; yield without answering.
    pub async fn peer_claimed_control(&self) {
        let _guard = self.transition.lock().await;
        if !self.state.is_active() {
            return;
        }
        self.state.set_active(false);
        info!("peer claimed control; standing down");
        self.hide_overlay().await;
    }

    /// Poll until the daemon stops or the session ends.
    pub async fn run(self: Arc<Self>, interval: Duration, alive: Arc<AtomicBool>) {
        debug!(edge = %self.edge, margin = self.margin, ?interval, "edge monitor started");
        while self.state.is_running() && alive.load(Ordering::SeqCst) {
            self.tick().await;
            tokio::time::sleep(interval).await;
        }
        debug!("edge monitor stopped");
    }
}
