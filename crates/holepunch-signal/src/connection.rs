//! Relay connections and the messages they carry.

use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use futures::SinkExt;
use futures::stream::SplitSink;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::Mutex;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tracing::debug;

use crate::error::{Result, SignalError};

/// Registry handle identifying one connection
///
/// Ids are handed out by [`ConnectionRegistry::allocate_id`] and never reused.
///
/// [`ConnectionRegistry::allocate_id`]: crate::registry::ConnectionRegistry::allocate_id
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Wrap a raw id
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Raw id
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Opaque signaling payload
///
/// The frame kind is kept so a text frame is relayed as text and a binary
/// frame as binary. The contents are never inspected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalMessage {
    /// UTF-8 text frame
    Text(String),
    /// Binary frame
    Binary(Vec<u8>),
}

impl SignalMessage {
    /// Payload length in bytes
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Text(text) => text.len(),
            Self::Binary(data) => data.len(),
        }
    }

    /// Whether the payload is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Extract a relayable payload from a WebSocket frame
    ///
    /// Control frames (ping, pong, close) yield `None`.
    #[must_use]
    pub fn from_frame(frame: Message) -> Option<Self> {
        match frame {
            Message::Text(text) => Some(Self::Text(text)),
            Message::Binary(data) => Some(Self::Binary(data)),
            _ => None,
        }
    }
}

impl From<SignalMessage> for Message {
    fn from(msg: SignalMessage) -> Self {
        match msg {
            SignalMessage::Text(text) => Message::Text(text),
            SignalMessage::Binary(data) => Message::Binary(data),
        }
    }
}

/// A registered peer's outbound half
#[async_trait]
pub trait Connection: Send + Sync {
    /// Registry handle of this connection
    fn id(&self) -> ConnectionId;

    /// Deliver one message to the peer
    ///
    /// # Errors
    ///
    /// Any error means the connection is no longer writable.
    async fn send(&self, message: &SignalMessage) -> Result<()>;

    /// Close the underlying channel, best effort
    async fn close(&self);
}

/// Write half of an upgraded WebSocket
pub struct WsConnection<S> {
    id: ConnectionId,
    peer: SocketAddr,
    sink: Mutex<SplitSink<WebSocketStream<S>, Message>>,
    closed: AtomicBool,
}

impl<S> WsConnection<S> {
    /// Wrap the write half of a WebSocket stream
    pub fn new(
        id: ConnectionId,
        peer: SocketAddr,
        sink: SplitSink<WebSocketStream<S>, Message>,
    ) -> Self {
        Self {
            id,
            peer,
            sink: Mutex::new(sink),
            closed: AtomicBool::new(false),
        }
    }

    /// Whether [`Connection::close`] has been called
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

#[async_trait]
impl<S> Connection for WsConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    fn id(&self) -> ConnectionId {
        self.id
    }

    async fn send(&self, message: &SignalMessage) -> Result<()> {
        if self.is_closed() {
            return Err(SignalError::Closed);
        }

        let mut sink = self.sink.lock().await;
        sink.send(Message::from(message.clone())).await?;
        Ok(())
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        let mut sink = self.sink.lock().await;
        if let Err(e) = sink.close().await {
            debug!(conn_id = %self.id, peer = %self.peer, error = %e, "Close handshake failed");
        }
    }
}
