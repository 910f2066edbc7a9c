//! MAPPED-ADDRESS and XOR-MAPPED-ADDRESS value encoding.
//!
//! Both attributes share one layout (RFC 5389 Section 15.1):
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |0 0 0 0 0 0 0 0|    Family     |           Port                |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                 Address (32 bits or 128 bits)                 |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! The XOR variant XORs the port with the high half of the magic cookie and
//! the address with the cookie followed by the transaction id. Applying the
//! transform twice yields the original address.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use super::MAGIC_COOKIE;
use super::message::TransactionId;
use crate::error::{Result, StunError};

/// Address family code carried in the attribute value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressFamily {
    /// IPv4 (0x01)
    V4,
    /// IPv6 (0x02)
    V6,
}

impl AddressFamily {
    /// Wire code for this family
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::V4 => 0x01,
            Self::V6 => 0x02,
        }
    }

    /// Parse a wire code
    #[must_use]
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            0x01 => Some(Self::V4),
            0x02 => Some(Self::V6),
            _ => None,
        }
    }

    /// Family of an IP address
    #[must_use]
    pub const fn of(ip: &IpAddr) -> Self {
        match ip {
            IpAddr::V4(_) => Self::V4,
            IpAddr::V6(_) => Self::V6,
        }
    }

    /// Length of the address portion in bytes
    #[must_use]
    pub const fn address_len(self) -> usize {
        match self {
            Self::V4 => 4,
            Self::V6 => 16,
        }
    }
}

/// Port and IP as they appear on the wire after the XOR transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XorAddress {
    /// Port XORed with the high 16 bits of the magic cookie
    pub port: u16,
    /// IP XORed with the magic cookie (and the transaction id for IPv6)
    pub ip: IpAddr,
}

impl XorAddress {
    /// Address family of the obfuscated IP
    #[must_use]
    pub const fn family(&self) -> AddressFamily {
        AddressFamily::of(&self.ip)
    }
}

/// Obfuscate an observed address for XOR-MAPPED-ADDRESS.
#[must_use]
pub fn obfuscate(addr: SocketAddr, transaction_id: &TransactionId) -> XorAddress {
    XorAddress {
        port: xor_port(addr.port()),
        ip: xor_ip(addr.ip(), transaction_id),
    }
}

/// Recover the real address from its XOR-MAPPED-ADDRESS form.
#[must_use]
pub fn deobfuscate(addr: XorAddress, transaction_id: &TransactionId) -> SocketAddr {
    SocketAddr::new(xor_ip(addr.ip, transaction_id), xor_port(addr.port))
}

fn xor_port(port: u16) -> u16 {
    port ^ (MAGIC_COOKIE >> 16) as u16
}

fn xor_ip(ip: IpAddr, transaction_id: &TransactionId) -> IpAddr {
    // cookie || transaction id; IPv4 only uses the first four bytes
    let mut key = [0u8; 16];
    key[..4].copy_from_slice(&MAGIC_COOKIE.to_be_bytes());
    key[4..].copy_from_slice(transaction_id.as_bytes());

    match ip {
        IpAddr::V4(v4) => {
            let mut octets = v4.octets();
            for (byte, k) in octets.iter_mut().zip(key.iter()) {
                *byte ^= k;
            }
            IpAddr::V4(Ipv4Addr::from(octets))
        }
        IpAddr::V6(v6) => {
            let mut octets = v6.octets();
            for (byte, k) in octets.iter_mut().zip(key.iter()) {
                *byte ^= k;
            }
            IpAddr::V6(Ipv6Addr::from(octets))
        }
    }
}

/// Encode an address attribute value (reserved, family, port, address).
pub(crate) fn encode_value(port: u16, ip: IpAddr) -> Vec<u8> {
    let family = AddressFamily::of(&ip);
    let mut value = Vec::with_capacity(4 + family.address_len());
    value.push(0);
    value.push(family.code());
    value.extend_from_slice(&port.to_be_bytes());
    match ip {
        IpAddr::V4(v4) => value.extend_from_slice(&v4.octets()),
        IpAddr::V6(v6) => value.extend_from_slice(&v6.octets()),
    }
    value
}

/// Decode an address attribute value into its port and IP.
///
/// The reserved byte is ignored. The value must be exactly as long as the
/// family requires.
pub(crate) fn decode_value(kind: u16, value: &[u8]) -> Result<(u16, IpAddr)> {
    if value.len() < 4 {
        return Err(StunError::InvalidAttribute(kind));
    }

    let family = AddressFamily::from_code(value[1]).ok_or(StunError::InvalidAttribute(kind))?;
    if value.len() != 4 + family.address_len() {
        return Err(StunError::InvalidAttribute(kind));
    }

    let port = u16::from_be_bytes([value[2], value[3]]);
    let ip = match family {
        AddressFamily::V4 => {
            let mut octets = [0u8; 4];
            octets.copy_from_slice(&value[4..8]);
            IpAddr::V4(Ipv4Addr::from(octets))
        }
        AddressFamily::V6 => {
            let mut octets = [0u8; 16];
            octets.copy_from_slice(&value[4..20]);
            IpAddr::V6(Ipv6Addr::from(octets))
        }
    };

    Ok((port, ip))
}
