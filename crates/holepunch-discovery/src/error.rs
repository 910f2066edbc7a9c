//! Error types for STUN encoding, decoding and I/O.

use thiserror::Error;

/// Errors produced by the STUN codec, responder and client.
#[derive(Debug, Error)]
pub enum StunError {
    /// Socket I/O failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Query timed out waiting for a response
    #[error("STUN query timeout")]
    Timeout,

    /// Buffer shorter than the 20-byte header
    #[error("STUN message too short: {0} bytes")]
    MessageTooShort(usize),

    /// Header length field disagrees with the datagram size
    #[error("STUN length mismatch: header declares {declared} bytes, {actual} present")]
    LengthMismatch {
        /// Length from the header
        declared: usize,
        /// Bytes actually following the header
        actual: usize,
    },

    /// Magic cookie did not match 0x2112A442
    #[error("Invalid STUN magic cookie: {0:#010x}")]
    InvalidMagicCookie(u32),

    /// Leading bits of the message type were not zero
    #[error("Invalid STUN message type: {0:#06x}")]
    InvalidMessageType(u16),

    /// Attribute length runs past the end of the message
    #[error("STUN attribute {kind:#06x} overruns message: needs {needed} bytes, {remaining} left")]
    AttributeOverrun {
        /// Attribute type code
        kind: u16,
        /// Declared value length plus padding
        needed: usize,
        /// Bytes left in the message
        remaining: usize,
    },

    /// A well-known attribute carried a malformed value
    #[error("Invalid STUN attribute {0:#06x}")]
    InvalidAttribute(u16),

    /// Encoded message or attribute would not fit its 16-bit length field
    #[error("STUN message too large: {0} bytes")]
    MessageTooLarge(usize),

    /// Server answered with an error response
    #[error("STUN error response")]
    ErrorResponse,

    /// Response lacked a mapped address
    #[error("Missing required STUN attribute")]
    MissingAttribute,

    /// Source address cannot be reported back to the peer
    #[error("Unusable source address: {0}")]
    UnusableSource(std::net::SocketAddr),
}

impl StunError {
    /// Whether the error came from malformed wire data rather than I/O.
    #[must_use]
    pub fn is_decode(&self) -> bool {
        matches!(
            self,
            Self::MessageTooShort(_)
                | Self::LengthMismatch { .. }
                | Self::InvalidMagicCookie(_)
                | Self::InvalidMessageType(_)
                | Self::AttributeOverrun { .. }
                | Self::InvalidAttribute(_)
        )
    }
}

/// Result alias for STUN operations.
pub type Result<T> = std::result::Result<T, StunError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stun_error_display() {
        let errors = vec![
            (StunError::Timeout, "STUN query timeout"),
            (StunError::MessageTooShort(3), "STUN message too short: 3 bytes"),
            (
                StunError::InvalidMagicCookie(0xdead_beef),
                "Invalid STUN magic cookie: 0xdeadbeef",
            ),
            (
                StunError::InvalidAttribute(0x0020),
                "Invalid STUN attribute 0x0020",
            ),
            (
                StunError::MissingAttribute,
                "Missing required STUN attribute",
            ),
        ];

        for (err, expected_msg) in errors {
            assert_eq!(err.to_string(), expected_msg);
        }
    }

    #[test]
    fn test_stun_error_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        let stun_err: StunError = io_err.into();
        assert!(matches!(stun_err, StunError::Io(_)));
        assert!(!stun_err.is_decode());
    }

    #[test]
    fn test_decode_classification() {
        assert!(StunError::MessageTooShort(0).is_decode());
        assert!(
            StunError::LengthMismatch {
                declared: 8,
                actual: 4
            }
            .is_decode()
        );
        assert!(!StunError::Timeout.is_decode());
        assert!(!StunError::UnusableSource("0.0.0.0:0".parse().unwrap()).is_decode());
    }
}
