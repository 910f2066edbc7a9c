//! # Holepunch Signal
//!
//! WebSocket signaling relay for peers negotiating a direct connection.
//!
//! Peers connect to a single endpoint and every message one of them sends is
//! forwarded, unmodified, to all the others. Payloads are opaque; the relay
//! never parses offers, answers or candidates.
//!
//! This crate provides:
//! - A connection registry safe to mutate while a broadcast is in progress
//! - Broadcast fan-out that evicts connections which can no longer be written
//! - A WebSocket endpoint serving one task per peer
//!
//! ## Example
//!
//! ```rust,no_run
//! use holepunch_signal::SignalingServer;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let server = SignalingServer::bind("0.0.0.0:8080".parse()?).await?;
//! println!("relay on ws://{}/ws", server.local_addr()?);
//! server.run().await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod connection;
pub mod error;
pub mod registry;
pub mod relay;
pub mod server;

pub use connection::{Connection, ConnectionId, SignalMessage, WsConnection};
pub use error::SignalError;
pub use registry::ConnectionRegistry;
pub use relay::{BroadcastRelay, BroadcastReport};
pub use server::{SignalingConfig, SignalingServer, serve_connection};
