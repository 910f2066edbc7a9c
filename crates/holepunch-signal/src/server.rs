//! WebSocket endpoint for the signaling relay.

use std::net::SocketAddr;
use std::sync::Arc;

use futures::StreamExt;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tracing::{debug, info, warn};

use crate::connection::{Connection, SignalMessage, WsConnection};
use crate::error::Result;
use crate::registry::ConnectionRegistry;
use crate::relay::BroadcastRelay;

/// Default upgrade path
pub const DEFAULT_PATH: &str = "/ws";

/// Signaling endpoint configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalingConfig {
    /// Only upgrade requests for this path are accepted
    pub path: String,
}

impl Default for SignalingConfig {
    fn default() -> Self {
        Self {
            path: DEFAULT_PATH.to_string(),
        }
    }
}

/// Accepts WebSocket peers and relays their messages to each other
pub struct SignalingServer {
    listener: TcpListener,
    relay: BroadcastRelay,
    config: SignalingConfig,
}

impl SignalingServer {
    /// Bind the endpoint with the default configuration
    ///
    /// # Errors
    ///
    /// Returns error if the listener cannot be bound.
    pub async fn bind(addr: SocketAddr) -> Result<Self> {
        Self::bind_with_config(addr, SignalingConfig::default()).await
    }

    /// Bind the endpoint with a custom configuration
    ///
    /// # Errors
    ///
    /// Returns error if the listener cannot be bound.
    pub async fn bind_with_config(addr: SocketAddr, config: SignalingConfig) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            relay: BroadcastRelay::new(Arc::new(ConnectionRegistry::new())),
            config,
        })
    }

    /// Address the listener is bound to
    ///
    /// # Errors
    ///
    /// Returns error if the local address cannot be read.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Registry of currently connected peers
    #[must_use]
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        self.relay.registry()
    }

    /// Accept connections until the task is cancelled
    ///
    /// Each peer is served on its own task. A failed accept or handshake is
    /// logged and does not stop the loop.
    ///
    /// # Errors
    ///
    /// Returns error if the listener address cannot be read.
    pub async fn run(&self) -> Result<()> {
        info!(
            addr = %self.listener.local_addr()?,
            path = %self.config.path,
            "Signaling relay listening"
        );

        loop {
            let (stream, peer) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!(error = %e, "Accept failed");
                    continue;
                }
            };

            let relay = self.relay.clone();
            let path = self.config.path.clone();
            tokio::spawn(async move {
                match upgrade(stream, &path).await {
                    Ok(ws) => serve_connection(ws, peer, relay).await,
                    Err(e) => debug!(%peer, error = %e, "WebSocket handshake rejected"),
                }
            });
        }
    }
}

/// Perform the WebSocket handshake, answering 404 for any other path
async fn upgrade(stream: TcpStream, path: &str) -> Result<WebSocketStream<TcpStream>> {
    let check_path = |request: &Request, response: Response| {
        if request.uri().path() == path {
            Ok(response)
        } else {
            let mut rejection = ErrorResponse::new(Some("not found".to_string()));
            *rejection.status_mut() = StatusCode::NOT_FOUND;
            Err(rejection)
        }
    };

    Ok(tokio_tungstenite::accept_hdr_async(stream, check_path).await?)
}

/// Drive one upgraded connection from registration to deregistration
///
/// Every text or binary frame read from the peer is broadcast to all other
/// registered connections. Control frames are not relayed. The connection is
/// deregistered and closed when the peer closes or the stream fails. A peer
/// that was evicted by the relay stops being read at its next frame.
pub async fn serve_connection<S>(ws: WebSocketStream<S>, peer: SocketAddr, relay: BroadcastRelay)
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let registry = Arc::clone(relay.registry());
    let id = registry.allocate_id();
    let (sink, mut stream) = ws.split();
    let connection: Arc<dyn Connection> = Arc::new(WsConnection::new(id, peer, sink));

    registry.add(Arc::clone(&connection)).await;
    info!(conn_id = %id, %peer, "Peer connected");

    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Close(_)) => break,
            Ok(frame) => {
                let Some(message) = SignalMessage::from_frame(frame) else {
                    continue;
                };
                if !registry.contains(id).await {
                    debug!(conn_id = %id, "Dropping frame from evicted peer");
                    break;
                }
                relay.broadcast(id, &message).await;
            }
            Err(e) => {
                debug!(conn_id = %id, error = %e, "Read failed");
                break;
            }
        }
    }

    registry.remove(id).await;
    connection.close().await;
    info!(conn_id = %id, %peer, "Peer disconnected");
}
