//! TCP connection and line framing.

use std::net::SocketAddr;

use edgelink_types::{Channel, Message};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tracing::{debug, trace, warn};

use crate::error::ProtocolError;
use crate::wire::{self, LineBuffer};

const READ_CHUNK: usize = 64 * 1024;

/// One established, handshaken channel to a remote edgelink peer.
#[derive(Debug)]
pub struct PeerConnection {
    stream: TcpStream,
    remote: SocketAddr,
    channel: Channel,
}

impl PeerConnection {
    pub(crate) fn new(stream: TcpStream, channel: Channel) -> Result<Self, ProtocolError> {
        stream.set_nodelay(true)?;
        let remote = stream.peer_addr()?;
        Ok(Self {
            stream,
            remote,
            channel,
        })
    }

    /// Get the remote address of this connection.
    #[must_use]
    pub fn remote_address(&self) -> SocketAddr {
        self.remote
    }

    /// Which session channel this connection carries.
    #[must_use]
    pub fn channel(&self) -> Channel {
        self.channel
    }

    /// Split into independently owned send and receive halves.
    #[must_use]
    pub fn into_split(self) -> (MessageSender, MessageReceiver) {
        let (read, write) = self.stream.into_split();
        (
            MessageSender {
                half: write,
                channel: self.channel,
            },
            MessageReceiver {
                half: read,
                channel: self.channel,
                lines: LineBuffer::new(),
                chunk: vec![0; READ_CHUNK],
            },
        )
    }
}

/// Sends newline-delimited JSON messages over the write half of a channel.
#[derive(Debug)]
pub struct MessageSender {
    half: OwnedWriteHalf,
    channel: Channel,
}

impl MessageSender {
    /// Send a message as one JSON line.
    pub async fn send(&mut self, msg: &Message) -> Result<(), ProtocolError> {
        let line = wire::encode_message(msg)?;
        self.half
            .write_all(&line)
            .await
            .map_err(|e| ProtocolError::Link(e.to_string()))?;
        trace!(channel = %self.channel, len = line.len(), "sent message");
        Ok(())
    }

    /// Shut down the write direction; the peer's reader sees end of stream.
    pub async fn shutdown(&mut self) -> Result<(), ProtocolError> {
        self.half
            .shutdown()
            .await
            .map_err(|e| ProtocolError::Link(e.to_string()))
    }
}

/// Receives newline-delimited JSON messages from the read half of a channel.
#[derive(Debug)]
pub struct MessageReceiver {
    half: OwnedReadHalf,
    channel: Channel,
    lines: LineBuffer,
    chunk: Vec<u8>,
}

impl MessageReceiver {
    /// Receive and decode the next well-formed message.
    ///
    /// Malformed lines are logged and skipped. Returns `None` if the peer
    /// closed the stream. Cancel-safe: partial lines stay buffered, so the
    /// call can be wrapped in a timeout and retried.
    pub async fn recv(&mut self) -> Result<Option<Message>, ProtocolError> {
        loop {
            while let Some(line) = self.lines.next_line() {
                match line.and_then(|l| wire::decode_message(&l)) {
                    Ok(msg) => {
                        trace!(channel = %self.channel, ?msg, "received message");
                        return Ok(Some(msg));
                    }
                    Err(e) => warn!(channel = %self.channel, error = %e, "dropping malformed line"),
                }
            }

            let n = self
                .half
                .read(&mut self.chunk)
                .await
                .map_err(|e| ProtocolError::Link(e.to_string()))?;
            if n == 0 {
                if self.lines.pending() > 0 {
                    debug!(
                        channel = %self.channel,
                        bytes = self.lines.pending(),
                        "peer closed mid-line; discarding partial data"
                    );
                }
                return Ok(None);
            }
            self.lines.push(&self.chunk[..n]);
        }
    }
}
