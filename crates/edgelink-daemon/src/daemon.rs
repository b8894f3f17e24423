//! Core daemon orchestration.
//!
//! A [`Daemon`] runs one peer session per call to [`Daemon::run`]: it opens
//! both channels, spawns the per-channel readers and writers plus the edge,
//! clipboard and heartbeat loops, and drives everything else from a single
//! event loop until the link drops or it is told to stop.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use edgelink_clipboard::{ClipboardBackend, ClipboardSync};
use edgelink_input::{codec, InputBackend, InputCapture, OverlayBackend};
use edgelink_types::{
    Channel, ControlMessage, KeyToken, LocalInput, Message, MouseButton, Role, ScreenGeometry,
};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::config::Config;
use crate::edge::EdgeMonitor;
use crate::error::DaemonError;
use crate::hotkey::HotkeyGate;
use crate::session::{spawn_reader, spawn_writer, Outbox, PeerLinks, OUTBOX_STALL_TIMEOUT};
use crate::state::{SessionPhase, SharedState};

/// How long session tasks get to finish before they are aborted.
const TEARDOWN_GRACE: Duration = Duration::from_secs(2);

/// Events processed by the daemon's main loop.
#[derive(Debug)]
pub enum DaemonEvent {
    /// A local input sample from the capture backend.
    CapturedInput(LocalInput),
    /// A message from the peer, tagged with the session it arrived on.
    PeerMessage { session: u64, msg: Message },
    /// A channel of the given session failed or was closed by the peer.
    LinkLost {
        session: u64,
        channel: Channel,
        reason: String,
    },
    /// Shutdown signal.
    Shutdown,
}

/// Why a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    /// The daemon was asked to stop.
    Stopped,
    /// A channel failed or the peer went away.
    LinkLost(String),
}

/// Snapshot published on every phase change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonStatus {
    pub role: Role,
    pub phase: SessionPhase,
    /// Remote address of the current or last peer.
    pub peer: Option<SocketAddr>,
    /// Number of sessions started so far.
    pub sessions: u64,
}

/// Platform capabilities the daemon drives.
pub struct Backends {
    pub capture: Box<dyn InputCapture>,
    pub input: Arc<dyn InputBackend>,
    pub clipboard: Arc<dyn ClipboardBackend>,
    pub overlay: Arc<dyn OverlayBackend>,
}

#[cfg(feature = "mock")]
impl Backends {
    /// In-memory backends for a machine with no real input devices.
    #[must_use]
    pub fn headless(screen: ScreenGeometry) -> Self {
        let (capture, _feed) = edgelink_input::mock::MockCapture::new();
        Self {
            capture: Box::new(capture),
            input: Arc::new(edgelink_input::mock::MockInput::new(screen)),
            clipboard: Arc::new(edgelink_clipboard::mock::MockClipboard::new()),
            overlay: Arc::new(edgelink_input::mock::MockOverlay::new()),
        }
    }
}

/// Cloneable control surface for a daemon owned elsewhere.
#[derive(Clone)]
pub struct DaemonHandle {
    state: Arc<SharedState>,
    status: watch::Receiver<DaemonStatus>,
    events: mpsc::Sender<DaemonEvent>,
}

impl DaemonHandle {
    /// Whether this machine currently owns the pointer and keyboard.
    pub fn is_active(&self) -> bool {
        self.state.is_active()
    }

    pub fn is_sharing_enabled(&self) -> bool {
        self.state.is_sharing_enabled()
    }

    pub fn status(&self) -> DaemonStatus {
        self.status.borrow().clone()
    }

    /// Subscribe to status changes.
    pub fn subscribe(&self) -> watch::Receiver<DaemonStatus> {
        self.status.clone()
    }

    /// Ask the daemon to end the current session and not start another.
    pub async fn stop(&self) {
        self.state.set_running(false);
        let _ = self.events.send(DaemonEvent::Shutdown).await;
    }
}

/// Local buttons and keys whose press was forwarded to the peer.
///
/// Their releases are forwarded even after control comes back, so nothing
/// stays held down on the peer.
#[derive(Debug, Default)]
struct ForwardedInputs {
    keys: HashSet<KeyToken>,
    buttons: HashSet<MouseButton>,
}

impl ForwardedInputs {
    /// Record `input` and decide whether it goes to the peer.
    fn should_forward(&mut self, input: &LocalInput, active: bool) -> bool {
        match input {
            LocalInput::Key { key, pressed } => {
                if *pressed {
                    if active {
                        self.keys.insert(key.clone());
                    }
                    active
                } else {
                    self.keys.remove(key) || active
                }
            }
            LocalInput::Button { button, pressed } => {
                if *pressed {
                    if active {
                        self.buttons.insert(*button);
                    }
                    active
                } else {
                    self.buttons.remove(button) || active
                }
            }
            LocalInput::PointerMoved { .. } | LocalInput::Scroll { .. } => active,
        }
    }

    fn clear(&mut self) {
        self.keys.clear();
        self.buttons.clear();
    }
}

/// The edgelink daemon.
pub struct Daemon {
    config: Config,
    state: Arc<SharedState>,
    capture: Box<dyn InputCapture>,
    capture_started: bool,
    input: Arc<dyn InputBackend>,
    overlay: Arc<dyn OverlayBackend>,
    clipboard: Option<Arc<ClipboardSync>>,
    gate: HotkeyGate,
    forwarded: ForwardedInputs,
    event_tx: mpsc::Sender<DaemonEvent>,
    event_rx: mpsc::Receiver<DaemonEvent>,
    status_tx: watch::Sender<DaemonStatus>,
    session: u64,
}

impl Daemon {
    /// Create a daemon. Fails if the configuration is invalid.
    pub fn new(config: Config, backends: Backends) -> Result<Self, DaemonError> {
        config.validate()?;
        let gate = HotkeyGate::new(&config.sharing.hotkey)?;
        let state = Arc::new(SharedState::new(config.sharing.enabled_at_start));
        let clipboard = config.clipboard.enabled.then(|| {
            Arc::new(ClipboardSync::new(
                backends.clipboard,
                config.clipboard.max_size,
            ))
        });
        let (event_tx, event_rx) = mpsc::channel(1024);
        let (status_tx, _) = watch::channel(DaemonStatus {
            role: config.session.role,
            phase: SessionPhase::Idle,
            peer: None,
            sessions: 0,
        });

        Ok(Self {
            config,
            state,
            capture: backends.capture,
            capture_started: false,
            input: backends.input,
            overlay: backends.overlay,
            clipboard,
            gate,
            forwarded: ForwardedInputs::default(),
            event_tx,
            event_rx,
            status_tx,
            session: 0,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn handle(&self) -> DaemonHandle {
        DaemonHandle {
            state: Arc::clone(&self.state),
            status: self.status_tx.subscribe(),
            events: self.event_tx.clone(),
        }
    }

    fn role(&self) -> Role {
        self.config.session.role
    }

    fn publish(&self, phase: SessionPhase, peer: Option<SocketAddr>) {
        self.status_tx.send_modify(|status| {
            status.phase = phase;
            if peer.is_some() {
                status.peer = peer;
            }
            if phase == SessionPhase::Connecting {
                status.sessions += 1;
            }
        });
    }

    async fn start_capture(&mut self) -> Result<(), DaemonError> {
        if self.capture_started {
            return Ok(());
        }
        let (input_tx, mut input_rx) = mpsc::channel::<LocalInput>(1024);
        self.capture.start(input_tx).await?;
        self.capture_started = true;

        // Forward captured input to daemon events
        let event_tx = self.event_tx.clone();
        tokio::spawn(async move {
            while let Some(sample) = input_rx.recv().await {
                if event_tx
                    .send(DaemonEvent::CapturedInput(sample))
                    .await
                    .is_err()
                {
                    break;
                }
            }
        });
        Ok(())
    }

    /// Run one session to completion.
    ///
    /// Returns how the session ended, or an error if it could not be
    /// established. ActiveDevice is false again whenever this returns.
    pub async fn run(&mut self) -> Result<SessionEnd, DaemonError> {
        if !self.state.is_running() {
            return Ok(SessionEnd::Stopped);
        }
        self.start_capture().await?;

        self.session += 1;
        let session = self.session;
        self.state.reset_session();
        self.forwarded.clear();
        self.publish(SessionPhase::Connecting, None);
        info!(role = %self.role(), session, "starting session");

        let role = self.role();
        let established = tokio::select! {
            result = PeerLinks::establish(role, &self.config.session) => Some(result),
            () = idle_until_shutdown(&mut self.event_rx, &mut self.gate, &self.state) => None,
        };
        let links = match established {
            Some(Ok(links)) => links,
            None => {
                info!("stopped before a peer connected");
                self.publish(SessionPhase::Ended, None);
                return Ok(SessionEnd::Stopped);
            }
            Some(Err(e)) => {
                warn!(error = %e, "session could not be established");
                self.publish(SessionPhase::Ended, None);
                return Err(e);
            }
        };

        // A new peer has seen nothing yet, so the current clipboard counts
        // as a change again.
        if let Some(sync) = &self.clipboard {
            sync.reset();
        }
        let peer = links.primary.remote_address();
        self.publish(SessionPhase::Live, Some(peer));
        info!(%peer, session, "session live");

        let end = self.run_live(session, links).await;

        self.state.reset_session();
        self.forwarded.clear();
        if let Err(e) = self.overlay.hide().await {
            warn!(error = %e, "failed to hide overlay");
        }
        self.publish(SessionPhase::Ended, None);
        info!(session, ?end, "session ended");
        Ok(end)
    }

    async fn run_live(&mut self, session: u64, links: PeerLinks) -> SessionEnd {
        let alive = Arc::new(AtomicBool::new(true));
        let (outbox, outbox_rx) = Outbox::new(session, self.event_tx.clone(), OUTBOX_STALL_TIMEOUT);
        let read_timeout = self.config.session.read_timeout();

        let (primary_tx, primary_rx) = links.primary.into_split();
        let (secondary_tx, secondary_rx) = links.secondary.into_split();
        let writers = vec![
            spawn_writer(
                session,
                Channel::Primary,
                primary_tx,
                outbox_rx.primary,
                self.event_tx.clone(),
            ),
            spawn_writer(
                session,
                Channel::Secondary,
                secondary_tx,
                outbox_rx.secondary,
                self.event_tx.clone(),
            ),
        ];
        let mut tasks = vec![
            spawn_reader(
                session,
                Channel::Primary,
                primary_rx,
                self.event_tx.clone(),
                Arc::clone(&alive),
                read_timeout,
            ),
            spawn_reader(
                session,
                Channel::Secondary,
                secondary_rx,
                self.event_tx.clone(),
                Arc::clone(&alive),
                read_timeout,
            ),
        ];

        let screen = match self.input.screen().await {
            Ok(screen) => screen,
            Err(e) => {
                warn!(error = %e, "could not read screen size; using configured size");
                self.config.screen.geometry()
            }
        };

        let edge = if self.role() == Role::Server {
            // The client starts in control until the pointer crosses over.
            // A failed send reaches the event loop as a lost link.
            let _ = outbox
                .send(Message::Control(ControlMessage::ActiveDeviceChanged(false)))
                .await;
            let monitor = Arc::new(EdgeMonitor::new(
                Arc::clone(&self.state),
                Arc::clone(&self.input),
                Arc::clone(&self.overlay),
                self.clipboard.clone(),
                outbox.clone(),
                self.config.edge.edge,
                self.config.edge.margin,
            ));
            tasks.push(tokio::spawn(
                Arc::clone(&monitor).run(self.config.edge.poll_interval(), Arc::clone(&alive)),
            ));
            Some(monitor)
        } else {
            None
        };

        if let Some(sync) = &self.clipboard {
            tasks.push(spawn_clipboard_poller(
                Arc::clone(sync),
                outbox.clone(),
                self.config.clipboard.poll_interval(),
                Arc::clone(&self.state),
                Arc::clone(&alive),
            ));
        }
        if let Some(interval) = self.config.session.heartbeat_interval() {
            tasks.push(spawn_heartbeat(
                outbox.clone(),
                interval,
                Arc::clone(&self.state),
                Arc::clone(&alive),
            ));
        }

        let end = self
            .event_loop(session, &outbox, edge.as_deref(), &screen)
            .await;

        alive.store(false, Ordering::SeqCst);
        join_all(tasks).await;
        // Writers flush and close once the last outbox clone is gone.
        drop(edge);
        drop(outbox);
        join_all(writers).await;
        end
    }

    async fn event_loop(
        &mut self,
        session: u64,
        outbox: &Outbox,
        edge: Option<&EdgeMonitor>,
        screen: &ScreenGeometry,
    ) -> SessionEnd {
        loop {
            if !self.state.is_running() {
                return SessionEnd::Stopped;
            }
            match self.event_rx.recv().await {
                Some(DaemonEvent::Shutdown) | None => {
                    info!("shutting down");
                    return SessionEnd::Stopped;
                }
                Some(DaemonEvent::LinkLost {
                    session: s,
                    channel,
                    reason,
                }) if s == session => {
                    return SessionEnd::LinkLost(format!("{channel} channel: {reason}"));
                }
                Some(DaemonEvent::PeerMessage { session: s, msg }) if s == session => {
                    if let Err(e) = self.handle_peer_message(msg, outbox, edge).await {
                        return SessionEnd::LinkLost(e.to_string());
                    }
                }
                Some(DaemonEvent::CapturedInput(input)) => {
                    if let Err(e) = self.handle_local_input(&input, outbox, edge, screen).await {
                        return SessionEnd::LinkLost(e.to_string());
                    }
                }
                Some(event) => {
                    trace!(?event, "dropping event from an earlier session");
                }
            }
        }
    }

    async fn handle_local_input(
        &mut self,
        input: &LocalInput,
        outbox: &Outbox,
        edge: Option<&EdgeMonitor>,
        screen: &ScreenGeometry,
    ) -> Result<(), DaemonError> {
        if let LocalInput::Key { key, pressed } = input {
            if self.gate.on_key(key, *pressed) {
                toggle_sharing(&self.state, edge).await;
            }
        }

        // Only the server forwards, and only while it is in control.
        if self.role() != Role::Server {
            return Ok(());
        }
        if self.forwarded.should_forward(input, self.state.is_active()) {
            outbox
                .send(Message::Input(codec::encode(input, screen)))
                .await?;
        }
        Ok(())
    }

    async fn handle_peer_message(
        &mut self,
        msg: Message,
        outbox: &Outbox,
        edge: Option<&EdgeMonitor>,
    ) -> Result<(), DaemonError> {
        match msg {
            Message::Input(event) => {
                if let Err(e) = codec::apply(self.input.as_ref(), &event).await {
                    warn!(error = %e, ?event, "failed to apply remote input");
                }
            }
            Message::Control(ControlMessage::ActiveDeviceChanged(peer_active)) => {
                return self.handle_active_device(peer_active, outbox, edge).await;
            }
            Message::Control(ControlMessage::ClipboardUpdate(payload)) => {
                let Some(sync) = &self.clipboard else {
                    debug!("clipboard sync disabled; ignoring update");
                    return Ok(());
                };
                match sync.apply_remote(payload).await {
                    Ok(true) => {}
                    Ok(false) => debug!("remote clipboard already applied"),
                    Err(e) => warn!(error = %e, "failed to apply remote clipboard"),
                }
            }
            Message::Control(ControlMessage::Heartbeat) => {
                trace!("heartbeat");
            }
        }
        Ok(())
    }

    async fn handle_active_device(
        &mut self,
        peer_active: bool,
        outbox: &Outbox,
        edge: Option<&EdgeMonitor>,
    ) -> Result<(), DaemonError> {
        match self.role() {
            Role::Client => {
                let active = !peer_active;
                let was_active = self.state.is_active();
                self.state.set_active(active);
                if active != was_active {
                    info!(active, "control changed");
                }
                if active && !was_active {
                    if let Some(sync) = &self.clipboard {
                        if let Some(payload) = sync.local_change().await {
                            outbox
                                .send(Message::Control(ControlMessage::ClipboardUpdate(payload)))
                                .await?;
                        }
                    }
                }
            }
            Role::Server if peer_active => {
                if let Some(edge) = edge {
                    edge.peer_claimed_control().await;
                }
            }
            Role::Server => debug!("peer reports it is not in control"),
        }
        Ok(())
    }

    /// Release the capture backend. Call once no more sessions will run.
    pub async fn shutdown(&mut self) -> Result<(), DaemonError> {
        self.state.set_running(false);
        if self.capture_started {
            self.capture.shutdown().await?;
            self.capture_started = false;
        }
        info!("daemon shut down complete");
        Ok(())
    }
}

/// Flip sharing; turning it off while in control hands control back.
async fn toggle_sharing(state: &SharedState, edge: Option<&EdgeMonitor>) {
    let enabled = state.toggle_sharing();
    info!(enabled, "input sharing toggled");
    if !enabled {
        if let Some(edge) = edge {
            edge.force_inactive().await;
        }
    }
}

/// Wait for a shutdown request while no session is live, still honouring
/// the sharing hotkey.
async fn idle_until_shutdown(
    events: &mut mpsc::Receiver<DaemonEvent>,
    gate: &mut HotkeyGate,
    state: &SharedState,
) {
    while let Some(event) = events.recv().await {
        match event {
            DaemonEvent::Shutdown => return,
            DaemonEvent::CapturedInput(LocalInput::Key { key, pressed }) => {
                if gate.on_key(&key, pressed) {
                    toggle_sharing(state, None).await;
                }
            }
            _ => {}
        }
    }
}

fn spawn_clipboard_poller(
    sync: Arc<ClipboardSync>,
    outbox: Outbox,
    interval: Duration,
    state: Arc<SharedState>,
    alive: Arc<AtomicBool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while state.is_running() && alive.load(Ordering::SeqCst) {
            if let Some(payload) = sync.local_change().await {
                info!(kind = ?payload.kind, size = payload.size(), "sending clipboard");
                if outbox
                    .send(Message::Control(ControlMessage::ClipboardUpdate(payload)))
                    .await
                    .is_err()
                {
                    break;
                }
            }
            tokio::time::sleep(interval).await;
        }
        debug!("clipboard poller stopped");
    })
}

fn spawn_heartbeat(
    outbox: Outbox,
    interval: Duration,
    state: Arc<SharedState>,
    alive: Arc<AtomicBool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(interval).await;
            if !state.is_running() || !alive.load(Ordering::SeqCst) {
                break;
            }
            if outbox
                .send(Message::Control(ControlMessage::Heartbeat))
                .await
                .is_err()
            {
                break;
            }
        }
    })
}

async fn join_all(tasks: Vec<JoinHandle<()>>) {
    for mut task in tasks {
        if tokio::time::timeout(TEARDOWN_GRACE, &mut task).await.is_err() {
            warn!("session task did not stop in time; aborting");
            task.abort();
        }
    }
}

/// A daemon running one session on its own task.
pub struct RunningDaemon {
    handle: DaemonHandle,
    task: JoinHandle<Result<SessionEnd, DaemonError>>,
}

impl RunningDaemon {
    pub fn handle(&self) -> &DaemonHandle {
        &self.handle
    }

    /// Stop the daemon and wait for its session to end.
    pub async fn stop(self) -> Result<SessionEnd, DaemonError> {
        self.handle.stop().await;
        self.wait().await
    }

    /// Wait for the session to end on its own.
    pub async fn wait(self) -> Result<SessionEnd, DaemonError> {
        self.task
            .await
            .map_err(|e| DaemonError::Other(anyhow::anyhow!("daemon task failed: {e}")))?
    }
}

/// Validate `config`, then run one session on a background task.
pub fn start(config: Config, backends: Backends) -> Result<RunningDaemon, DaemonError> {
    let mut daemon = Daemon::new(config, backends)?;
    let handle = daemon.handle();
    let task = tokio::spawn(async move {
        let end = daemon.run().await;
        if let Err(e) = daemon.shutdown().await {
            warn!(error = %e, "capture shutdown failed");
        }
        end
    });
    Ok(RunningDaemon { handle, task })
}
