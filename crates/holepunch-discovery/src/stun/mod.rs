//! STUN Binding (RFC 5389)
//!
//! This module implements the subset of STUN needed to tell a peer which
//! public address its packets arrive from:
//!
//! - [`message`]: header and attribute framing
//! - [`address`]: MAPPED-ADDRESS / XOR-MAPPED-ADDRESS values and the XOR transform
//! - [`responder`]: stateless UDP server answering Binding requests
//! - [`client`]: one-shot Binding query against a server
//!
//! No authentication (MESSAGE-INTEGRITY) is performed; the responder answers
//! any well-formed Binding request.

pub mod address;
pub mod client;
pub mod message;
pub mod responder;

pub use address::{AddressFamily, XorAddress, deobfuscate, obfuscate};
pub use client::BindingClient;
pub use message::{Attribute, Message, MessageClass, Method, TransactionId};
pub use responder::{BindingResponder, ResponderConfig, ResponderStats};

/// STUN magic cookie (0x2112A442)
pub const MAGIC_COOKIE: u32 = 0x2112_A442;

/// STUN message header size (20 bytes)
pub const HEADER_SIZE: usize = 20;

/// Attribute type + length prefix (4 bytes)
pub const ATTRIBUTE_HEADER_SIZE: usize = 4;

/// IANA-assigned STUN port
pub const DEFAULT_STUN_PORT: u16 = 3478;
