//! STUN message framing (RFC 5389 Section 6).
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |0 0|     STUN Message Type     |         Message Length        |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                         Magic Cookie                          |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                     Transaction ID (96 bits)                  |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! Attributes follow the header as type/length/value records, each value
//! padded with zeros to a 4-byte boundary.

use std::fmt;
use std::net::SocketAddr;

use super::address::{self, XorAddress};
use super::{ATTRIBUTE_HEADER_SIZE, HEADER_SIZE, MAGIC_COOKIE};
use crate::error::{Result, StunError};

/// MAPPED-ADDRESS attribute type
pub const ATTR_MAPPED_ADDRESS: u16 = 0x0001;
/// XOR-MAPPED-ADDRESS attribute type
pub const ATTR_XOR_MAPPED_ADDRESS: u16 = 0x0020;
/// SOFTWARE attribute type
pub const ATTR_SOFTWARE: u16 = 0x8022;
/// FINGERPRINT attribute type
pub const ATTR_FINGERPRINT: u16 = 0x8028;

/// STUN message class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageClass {
    /// Request message
    Request,
    /// Indication (no response expected)
    Indication,
    /// Success response
    SuccessResponse,
    /// Error response
    ErrorResponse,
}

impl MessageClass {
    const fn bits(self) -> u16 {
        match self {
            Self::Request => 0b00,
            Self::Indication => 0b01,
            Self::SuccessResponse => 0b10,
            Self::ErrorResponse => 0b11,
        }
    }

    const fn from_bits(bits: u16) -> Self {
        match bits & 0b11 {
            0b00 => Self::Request,
            0b01 => Self::Indication,
            0b10 => Self::SuccessResponse,
            _ => Self::ErrorResponse,
        }
    }
}

/// STUN method
///
/// Only Binding is understood; other 12-bit method codes are carried through
/// so the caller can decide to ignore them. Codes are masked to 12 bits on
/// construction, so every value has exactly one wire form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Method(u16);

impl Method {
    /// Binding (0x001)
    pub const BINDING: Self = Self(0x001);

    /// Method for a code; bits above the low 12 are dropped
    #[must_use]
    pub const fn new(code: u16) -> Self {
        Self(code & 0x0FFF)
    }

    /// 12-bit method code
    #[must_use]
    pub const fn code(self) -> u16 {
        self.0
    }
}

/// Encode class and method into the 14-bit message type.
///
/// ```text
///  0                 1
///  2  3  4 5 6 7 8 9 0 1 2 3 4 5
/// +--+--+-+-+-+-+-+-+-+-+-+-+-+-+
/// |M |M |M|M|M|C|M|M|M|C|M|M|M|M|
/// |11|10|9|8|7|1|6|5|4|0|3|2|1|0|
/// +--+--+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
fn encode_type(class: MessageClass, method: Method) -> u16 {
    let method = method.code();
    let class = class.bits();

    let m0_m3 = method & 0x000F;
    let c0 = (class & 0x01) << 4;
    let m4_m6 = (method & 0x0070) << 1;
    let c1 = (class & 0x02) << 7;
    let m7_m11 = (method & 0x0F80) << 2;

    m0_m3 | c0 | m4_m6 | c1 | m7_m11
}

fn decode_type(msg_type: u16) -> Result<(MessageClass, Method)> {
    if msg_type & 0xC000 != 0 {
        return Err(StunError::InvalidMessageType(msg_type));
    }

    let c0 = (msg_type >> 4) & 0x01;
    let c1 = (msg_type >> 8) & 0x01;
    let class = MessageClass::from_bits(c0 | (c1 << 1));

    let m0_m3 = msg_type & 0x000F;
    let m4_m6 = (msg_type >> 1) & 0x0070;
    let m7_m11 = (msg_type >> 2) & 0x0F80;
    let method = Method::new(m0_m3 | m4_m6 | m7_m11);

    Ok((class, method))
}

const fn padded_len(len: usize) -> usize {
    (len + 3) & !3
}

/// 96-bit transaction identifier
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransactionId([u8; 12]);

impl TransactionId {
    /// Generate a random transaction id
    #[must_use]
    pub fn random() -> Self {
        use rand::RngCore;

        let mut bytes = [0u8; 12];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Wrap raw bytes
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 12]) -> Self {
        Self(bytes)
    }

    /// Raw bytes
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 12] {
        &self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TransactionId({self})")
    }
}

/// STUN attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attribute {
    /// MAPPED-ADDRESS (0x0001), sent in the clear
    MappedAddress(SocketAddr),
    /// XOR-MAPPED-ADDRESS (0x0020); holds the real address, XORed on the wire
    XorMappedAddress(SocketAddr),
    /// SOFTWARE (0x8022)
    Software(String),
    /// FINGERPRINT (0x8028)
    Fingerprint(u32),
    /// Any other attribute, kept verbatim
    Unknown {
        /// Attribute type code
        kind: u16,
        /// Raw value without padding
        value: Vec<u8>,
    },
}

impl Attribute {
    /// Attribute type code
    #[must_use]
    pub fn kind(&self) -> u16 {
        match self {
            Self::MappedAddress(_) => ATTR_MAPPED_ADDRESS,
            Self::XorMappedAddress(_) => ATTR_XOR_MAPPED_ADDRESS,
            Self::Software(_) => ATTR_SOFTWARE,
            Self::Fingerprint(_) => ATTR_FINGERPRINT,
            Self::Unknown { kind, .. } => *kind,
        }
    }

    fn encode_value(&self, transaction_id: &TransactionId) -> Vec<u8> {
        match self {
            Self::MappedAddress(addr) => address::encode_value(addr.port(), addr.ip()),
            Self::XorMappedAddress(addr) => {
                let xored = address::obfuscate(*addr, transaction_id);
                address::encode_value(xored.port, xored.ip)
            }
            Self::Software(s) => s.as_bytes().to_vec(),
            Self::Fingerprint(crc) => crc.to_be_bytes().to_vec(),
            Self::Unknown { value, .. } => value.clone(),
        }
    }

    /// Append type, length, value and padding to `out`.
    fn encode_into(&self, transaction_id: &TransactionId, out: &mut Vec<u8>) -> Result<()> {
        let value = self.encode_value(transaction_id);
        let len = u16::try_from(value.len()).map_err(|_| StunError::MessageTooLarge(value.len()))?;

        out.extend_from_slice(&self.kind().to_be_bytes());
        out.extend_from_slice(&len.to_be_bytes());
        out.extend_from_slice(&value);
        out.resize(out.len() + padded_len(value.len()) - value.len(), 0);
        Ok(())
    }

    /// Decode one attribute value
    ///
    /// A well-known attribute whose value does not parse is kept as
    /// [`Attribute::Unknown`]; only framing faults fail a message.
    fn decode(kind: u16, value: &[u8], transaction_id: &TransactionId) -> Self {
        let parsed = match kind {
            ATTR_MAPPED_ADDRESS => address::decode_value(kind, value)
                .ok()
                .map(|(port, ip)| Self::MappedAddress(SocketAddr::new(ip, port))),
            ATTR_XOR_MAPPED_ADDRESS => address::decode_value(kind, value).ok().map(|(port, ip)| {
                Self::XorMappedAddress(address::deobfuscate(XorAddress { port, ip }, transaction_id))
            }),
            ATTR_SOFTWARE => Some(Self::Software(String::from_utf8_lossy(value).into_owned())),
            ATTR_FINGERPRINT => <[u8; 4]>::try_from(value)
                .ok()
                .map(|bytes| Self::Fingerprint(u32::from_be_bytes(bytes))),
            _ => None,
        };

        parsed.unwrap_or_else(|| Self::Unknown {
            kind,
            value: value.to_vec(),
        })
    }
}

/// Decoded STUN message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Message class
    pub class: MessageClass,
    /// Method
    pub method: Method,
    /// Transaction ID (96 bits)
    pub transaction_id: TransactionId,
    /// Attributes in wire order
    pub attributes: Vec<Attribute>,
}

impl Message {
    /// Create an empty message
    #[must_use]
    pub const fn new(class: MessageClass, method: Method, transaction_id: TransactionId) -> Self {
        Self {
            class,
            method,
            transaction_id,
            attributes: Vec::new(),
        }
    }

    /// Binding request with a fresh random transaction id
    #[must_use]
    pub fn binding_request() -> Self {
        Self::new(
            MessageClass::Request,
            Method::BINDING,
            TransactionId::random(),
        )
    }

    /// Binding success response reporting `observed` for `transaction_id`.
    #[must_use]
    pub fn binding_success(transaction_id: TransactionId, observed: SocketAddr) -> Self {
        let mut msg = Self::new(MessageClass::SuccessResponse, Method::BINDING, transaction_id);
        msg.add_attribute(Attribute::XorMappedAddress(observed));
        msg
    }

    /// Whether this is a Binding request
    #[must_use]
    pub fn is_binding_request(&self) -> bool {
        self.class == MessageClass::Request && self.method == Method::BINDING
    }

    /// Add an attribute to the message
    pub fn add_attribute(&mut self, attr: Attribute) {
        self.attributes.push(attr);
    }

    /// First XOR-MAPPED-ADDRESS, already deobfuscated
    #[must_use]
    pub fn xor_mapped_address(&self) -> Option<SocketAddr> {
        self.attributes.iter().find_map(|attr| match attr {
            Attribute::XorMappedAddress(addr) => Some(*addr),
            _ => None,
        })
    }

    /// First MAPPED-ADDRESS
    #[must_use]
    pub fn mapped_address(&self) -> Option<SocketAddr> {
        self.attributes.iter().find_map(|attr| match attr {
            Attribute::MappedAddress(addr) => Some(*addr),
            _ => None,
        })
    }

    /// Encode message to bytes
    ///
    /// The length field is always computed from the serialized attributes.
    ///
    /// # Errors
    ///
    /// Returns [`StunError::MessageTooLarge`] if an attribute value or the
    /// whole attribute section exceeds 65535 bytes.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut bytes = Vec::with_capacity(HEADER_SIZE + 12 * self.attributes.len());

        bytes.extend_from_slice(&encode_type(self.class, self.method).to_be_bytes());
        // Length placeholder, patched below
        bytes.extend_from_slice(&[0u8; 2]);
        bytes.extend_from_slice(&MAGIC_COOKIE.to_be_bytes());
        bytes.extend_from_slice(self.transaction_id.as_bytes());

        for attr in &self.attributes {
            attr.encode_into(&self.transaction_id, &mut bytes)?;
        }

        let body_len = bytes.len() - HEADER_SIZE;
        let len = u16::try_from(body_len).map_err(|_| StunError::MessageTooLarge(bytes.len()))?;
        bytes[2..4].copy_from_slice(&len.to_be_bytes());

        Ok(bytes)
    }

    /// Decode message from bytes
    ///
    /// # Errors
    ///
    /// Fails if the buffer is shorter than a header, the type has its two
    /// leading bits set, the magic cookie is wrong, the declared length does
    /// not match the buffer, or an attribute overruns the message. A
    /// well-known attribute with a malformed value is kept as
    /// [`Attribute::Unknown`].
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(StunError::MessageTooShort(bytes.len()));
        }

        let msg_type = u16::from_be_bytes([bytes[0], bytes[1]]);
        let declared = usize::from(u16::from_be_bytes([bytes[2], bytes[3]]));
        let cookie = u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);

        let (class, method) = decode_type(msg_type)?;

        if cookie != MAGIC_COOKIE {
            return Err(StunError::InvalidMagicCookie(cookie));
        }

        let body = &bytes[HEADER_SIZE..];
        if declared != body.len() || declared % 4 != 0 {
            return Err(StunError::LengthMismatch {
                declared,
                actual: body.len(),
            });
        }

        let mut id = [0u8; 12];
        id.copy_from_slice(&bytes[8..HEADER_SIZE]);
        let transaction_id = TransactionId::from_bytes(id);

        let mut attributes = Vec::new();
        let mut offset = 0;

        while offset < body.len() {
            let remaining = body.len() - offset;
            if remaining < ATTRIBUTE_HEADER_SIZE {
                return Err(StunError::AttributeOverrun {
                    kind: 0,
                    needed: ATTRIBUTE_HEADER_SIZE,
                    remaining,
                });
            }

            let kind = u16::from_be_bytes([body[offset], body[offset + 1]]);
            let len = usize::from(u16::from_be_bytes([body[offset + 2], body[offset + 3]]));
            offset += ATTRIBUTE_HEADER_SIZE;

            let remaining = body.len() - offset;
            if len > remaining {
                return Err(StunError::AttributeOverrun {
                    kind,
                    needed: len,
                    remaining,
                });
            }

            let value = &body[offset..offset + len];
            attributes.push(Attribute::decode(kind, value, &transaction_id));

            // Padding is skipped without inspecting its contents
            offset = (offset + padded_len(len)).min(body.len());
        }

        Ok(Self {
            class,
            method,
            transaction_id,
            attributes,
        })
    }
}
