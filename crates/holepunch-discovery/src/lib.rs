//! # Holepunch Discovery
//!
//! Public address discovery for peers behind NAT.
//!
//! This crate provides:
//! - STUN message encoding and decoding (RFC 5389 framing)
//! - XOR-MAPPED-ADDRESS obfuscation for IPv4 and IPv6
//! - A stateless Binding responder reporting each requester's public address
//! - A Binding client for querying a responder
//!
//! ## Example
//!
//! ```rust,no_run
//! use holepunch_discovery::stun::{BindingClient, BindingResponder};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let responder = BindingResponder::bind("0.0.0.0:3478".parse()?).await?;
//! tokio::spawn(async move { responder.run().await });
//!
//! let client = BindingClient::bind("0.0.0.0:0".parse()?).await?;
//! let public = client.query("198.51.100.1:3478".parse()?).await?;
//! println!("reachable at {public}");
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod stun;

pub use error::StunError;
pub use stun::{
    Attribute, BindingClient, BindingResponder, Message, MessageClass, Method, ResponderConfig,
    ResponderStats, TransactionId,
};
