//! TCP transport: bind, accept, and connect with the `CONNECTED` handshake.

use std::net::SocketAddr;
use std::time::Duration;

use edgelink_types::Channel;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

use crate::connection::PeerConnection;
use crate::error::ProtocolError;
use crate::wire::HANDSHAKE;

/// Listening side of one session channel.
#[derive(Debug)]
pub struct Listener {
    inner: TcpListener,
    channel: Channel,
}

impl Listener {
    /// Bind a listener for `channel`.
    pub async fn bind(addr: SocketAddr, channel: Channel) -> Result<Self, ProtocolError> {
        let inner = TcpListener::bind(addr).await?;
        info!(addr = %inner.local_addr()?, %channel, "listening");
        Ok(Self { inner, channel })
    }

    /// Get the local address this listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, ProtocolError> {
        Ok(self.inner.local_addr()?)
    }

    /// Accept one peer and send it the handshake literal.
    pub async fn accept(&self) -> Result<PeerConnection, ProtocolError> {
        let (mut stream, remote) = self.inner.accept().await?;
        stream
            .write_all(HANDSHAKE)
            .await
            .map_err(|e| ProtocolError::Handshake(format!("sending handshake to {remote}: {e}")))?;
        debug!(remote = %remote, channel = %self.channel, "accepted connection");
        PeerConnection::new(stream, self.channel)
    }
}

/// Retry and timeout policy for outgoing connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectOptions {
    /// Bound on each TCP connect attempt and on the handshake read.
    pub timeout: Duration,
    /// Number of connect attempts before giving up.
    pub retries: u32,
    /// Pause between failed attempts.
    pub interval: Duration,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            retries: 10,
            interval: Duration::from_secs(1),
        }
    }
}

/// Connect `channel` to `addr` (`host:port`), retrying refused or timed-out
/// attempts, then wait for the handshake.
///
/// A handshake that is wrong, cut short, or late is not retried.
pub async fn connect(
    addr: &str,
    channel: Channel,
    opts: ConnectOptions,
) -> Result<PeerConnection, ProtocolError> {
    let attempts = opts.retries.max(1);
    let mut attempt = 0;
    let mut stream = loop {
        attempt += 1;
        let reason = match tokio::time::timeout(opts.timeout, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => break stream,
            Ok(Err(e)) => e.to_string(),
            Err(_) => format!("timed out after {:?}", opts.timeout),
        };
        if attempt >= attempts {
            return Err(ProtocolError::Connect {
                addr: addr.to_string(),
                attempts,
                reason,
            });
        }
        warn!(addr, %channel, attempt, attempts, reason = %reason, "connect failed; retrying");
        tokio::time::sleep(opts.interval).await;
    };

    let mut greeting = [0u8; HANDSHAKE.len()];
    match tokio::time::timeout(opts.timeout, stream.read_exact(&mut greeting)).await {
        Ok(Ok(_)) if &greeting[..] == HANDSHAKE => {}
        Ok(Ok(_)) => {
            return Err(ProtocolError::Handshake(format!(
                "unexpected greeting {:?}",
                String::from_utf8_lossy(&greeting)
            )));
        }
        Ok(Err(e)) => return Err(ProtocolError::Handshake(e.to_string())),
        Err(_) => {
            return Err(ProtocolError::Handshake(format!(
                "no greeting within {:?}",
                opts.timeout
            )));
        }
    }

    info!(addr, %channel, "connected to peer");
    PeerConnection::new(stream, channel)
}
