//! Dual-channel peer link: establishment, per-channel reader and writer
//! tasks, and the outbox the rest of the daemon sends through.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use edgelink_protocol::{
    connect, Listener, MessageReceiver, MessageSender, PeerConnection, ProtocolError,
};
use edgelink_types::{Channel, Message, Role};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::config::SessionConfig;
use crate::daemon::DaemonEvent;
use crate::error::DaemonError;

/// Per-channel outbox capacity.
pub const OUTBOX_CAPACITY: usize = 1024;

/// How long a send waits for room before the link counts as stalled.
pub const OUTBOX_STALL_TIMEOUT: Duration = Duration::from_secs(5);

/// Sending side of the link, shared by every task that talks to the peer.
///
/// Messages are routed to the channel they belong on. A full outbox makes
/// the sender wait; nothing is dropped. An outbox that stays full for the
/// stall timeout, or whose writer is gone, ends the session through
/// [`DaemonEvent::LinkLost`].
#[derive(Clone)]
pub struct Outbox {
    session: u64,
    primary: mpsc::Sender<Message>,
    secondary: mpsc::Sender<Message>,
    events: mpsc::Sender<DaemonEvent>,
    stall_timeout: Duration,
}

/// Receiving ends of an [`Outbox`], one per channel.
pub struct OutboxReceivers {
    pub primary: mpsc::Receiver<Message>,
    pub secondary: mpsc::Receiver<Message>,
}

impl Outbox {
    #[must_use]
    pub fn new(
        session: u64,
        events: mpsc::Sender<DaemonEvent>,
        stall_timeout: Duration,
    ) -> (Self, OutboxReceivers) {
        let (primary, primary_rx) = mpsc::channel(OUTBOX_CAPACITY);
        let (secondary, secondary_rx) = mpsc::channel(OUTBOX_CAPACITY);
        (
            Self {
                session,
                primary,
                secondary,
                events,
                stall_timeout,
            },
            OutboxReceivers {
                primary: primary_rx,
                secondary: secondary_rx,
            },
        )
    }

    /// Queue a message, waiting while its channel's outbox is full.
    ///
    /// On failure the session has already been told the link is lost.
    pub async fn send(&self, msg: Message) -> Result<(), DaemonError> {
        let channel = msg.channel();
        let tx = match channel {
            Channel::Primary => &self.primary,
            Channel::Secondary => &self.secondary,
        };
        let reason = match tokio::time::timeout(self.stall_timeout, tx.send(msg)).await {
            Ok(Ok(())) => return Ok(()),
            Ok(Err(_)) => "closed",
            Err(_) => "stalled",
        };
        warn!(%channel, reason, "message could not be queued");
        self.report_lost(channel, reason);
        Err(DaemonError::Outbox { channel, reason })
    }

    fn report_lost(&self, channel: Channel, reason: &'static str) {
        let lost = DaemonEvent::LinkLost {
            session: self.session,
            channel,
            reason: format!("outbox {reason}"),
        };
        // The event loop may be the caller, so never wait on its queue here.
        if let Err(mpsc::error::TrySendError::Full(lost)) = self.events.try_send(lost) {
            let events = self.events.clone();
            tokio::spawn(async move {
                let _ = events.send(lost).await;
            });
        }
    }
}

/// Both channels of an established session.
pub struct PeerLinks {
    pub primary: PeerConnection,
    pub secondary: PeerConnection,
}

impl PeerLinks {
    /// Open both channels for `role`.
    ///
    /// The server accepts one peer on each channel concurrently. The client
    /// connects primary first, then secondary.
    pub async fn establish(role: Role, config: &SessionConfig) -> Result<Self, DaemonError> {
        match role {
            Role::Server => {
                let (primary_addr, secondary_addr) = config.listen_addrs()?;
                let primary = Listener::bind(primary_addr, Channel::Primary).await?;
                let secondary = Listener::bind(secondary_addr, Channel::Secondary).await?;
                info!(primary = %primary_addr, secondary = %secondary_addr, "waiting for peer");
                let (primary, secondary) = tokio::try_join!(primary.accept(), secondary.accept())?;
                info!(peer = %primary.remote_address(), "peer connected");
                Ok(Self { primary, secondary })
            }
            Role::Client => {
                let (primary_addr, secondary_addr) = config.peer_addrs()?;
                let options = config.connect_options();
                let primary = connect(&primary_addr, Channel::Primary, options).await?;
                let secondary = connect(&secondary_addr, Channel::Secondary, options).await?;
                info!(peer = %primary.remote_address(), "connected to server");
                Ok(Self { primary, secondary })
            }
        }
    }
}

/// Drain one channel's outbox onto the socket.
///
/// Ends when every [`Outbox`] clone is dropped, shutting down the write half
/// so the peer sees EOF, or on the first write error.
pub fn spawn_writer(
    session: u64,
    channel: Channel,
    mut sender: MessageSender,
    mut rx: mpsc::Receiver<Message>,
    events: mpsc::Sender<DaemonEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let Some(msg) = rx.recv().await else {
                break;
            };
            trace!(%channel, ?msg, "sending");
            if let Err(e) = sender.send(&msg).await {
                warn!(%channel, error = %e, "send failed");
                // Unblock anyone waiting for room before reporting.
                drop(rx);
                let _ = events
                    .send(DaemonEvent::LinkLost {
                        session,
                        channel,
                        reason: e.to_string(),
                    })
                    .await;
                return;
            }
        }
        if let Err(e) = sender.shutdown().await {
            debug!(%channel, error = %e, "write half already closed");
        }
        debug!(%channel, "writer stopped");
    })
}

/// Forward one channel's inbound messages to the daemon loop.
///
/// Each read is bounded by `read_timeout` so the task notices `alive`
/// going false; a timeout alone never ends the link.
pub fn spawn_reader(
    session: u64,
    channel: Channel,
    mut receiver: MessageReceiver,
    events: mpsc::Sender<DaemonEvent>,
    alive: Arc<AtomicBool>,
    read_timeout: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while alive.load(Ordering::SeqCst) {
            let reason = match tokio::time::timeout(read_timeout, receiver.recv()).await {
                Err(_) => continue,
                Ok(Ok(Some(msg))) => {
                    trace!(%channel, ?msg, "received");
                    if events
                        .send(DaemonEvent::PeerMessage { session, msg })
                        .await
                        .is_err()
                    {
                        break;
                    }
                    continue;
                }
                Ok(Ok(None)) => ProtocolError::Closed.to_string(),
                Ok(Err(e)) => e.to_string(),
            };
            if alive.load(Ordering::SeqCst) {
                warn!(%channel, %reason, "link lost");
                let _ = events
                    .send(DaemonEvent::LinkLost {
                        session,
                        channel,
                        reason,
                    })
                    .await;
            }
            break;
        }
        debug!(%channel, "reader stopped");
    })
}
