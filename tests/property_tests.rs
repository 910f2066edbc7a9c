//! Property-based tests for holepunch
//!
//! Uses proptest to verify invariants across large input spaces.

use std::net::{IpAddr, SocketAddr};

use proptest::prelude::*;

fn socket_addr() -> impl Strategy<Value = SocketAddr> {
    (any::<IpAddr>(), any::<u16>()).prop_map(|(ip, port)| SocketAddr::new(ip, port))
}

// ============================================================================
// XOR-MAPPED-ADDRESS Properties
// ============================================================================

mod address_properties {
    use super::*;
    use holepunch_discovery::stun::{AddressFamily, TransactionId, deobfuscate, obfuscate};

    proptest! {
        /// Obfuscation is its own inverse for every address and transaction
        #[test]
        fn xor_is_involution(addr in socket_addr(), tid in any::<[u8; 12]>()) {
            let tid = TransactionId::from_bytes(tid);
            let xored = obfuscate(addr, &tid);
            prop_assert_eq!(deobfuscate(xored, &tid), addr);
        }

        /// Obfuscation never changes the address family
        #[test]
        fn xor_preserves_family(addr in socket_addr(), tid in any::<[u8; 12]>()) {
            let xored = obfuscate(addr, &TransactionId::from_bytes(tid));
            prop_assert_eq!(xored.family(), AddressFamily::of(&addr.ip()));
        }
    }
}

// ============================================================================
// Message Codec Properties
// ============================================================================

mod message_properties {
    use super::*;
    use holepunch_discovery::stun::{Attribute, Message, MessageClass, Method, TransactionId};

    fn class() -> impl Strategy<Value = MessageClass> {
        prop_oneof![
            Just(MessageClass::Request),
            Just(MessageClass::Indication),
            Just(MessageClass::SuccessResponse),
            Just(MessageClass::ErrorResponse),
        ]
    }

    fn method() -> impl Strategy<Value = Method> {
        any::<u16>().prop_map(Method::new)
    }

    fn attribute() -> impl Strategy<Value = Attribute> {
        prop_oneof![
            socket_addr().prop_map(Attribute::MappedAddress),
            socket_addr().prop_map(Attribute::XorMappedAddress),
            "[ -~]{0,40}".prop_map(Attribute::Software),
            any::<u32>().prop_map(Attribute::Fingerprint),
            (0xC000u16..0xC100, prop::collection::vec(any::<u8>(), 0..64))
                .prop_map(|(kind, value)| Attribute::Unknown { kind, value }),
        ]
    }

    fn message() -> impl Strategy<Value = Message> {
        (
            class(),
            method(),
            any::<[u8; 12]>(),
            prop::collection::vec(attribute(), 0..6),
        )
            .prop_map(|(class, method, tid, attributes)| Message {
                class,
                method,
                transaction_id: TransactionId::from_bytes(tid),
                attributes,
            })
    }

    proptest! {
        /// Decoding an encoded message gives back the same message
        #[test]
        fn encode_decode_roundtrip(msg in message()) {
            let bytes = msg.encode().unwrap();
            prop_assert_eq!(bytes.len() % 4, 0);
            prop_assert_eq!(Message::decode(&bytes).unwrap(), msg);
        }

        /// The length field always matches the attribute section
        #[test]
        fn length_field_is_derived(msg in message()) {
            let bytes = msg.encode().unwrap();
            let declared = usize::from(u16::from_be_bytes([bytes[2], bytes[3]]));
            prop_assert_eq!(declared, bytes.len() - 20);
        }

        /// Arbitrary bytes never panic the decoder
        #[test]
        fn decode_arbitrary_bytes(bytes in prop::collection::vec(any::<u8>(), 0..256)) {
            let _ = Message::decode(&bytes);
        }

        /// Every strict prefix of a non-empty message is rejected
        #[test]
        fn truncation_is_rejected(msg in message(), cut in any::<prop::sample::Index>()) {
            let bytes = msg.encode().unwrap();
            let len = cut.index(bytes.len());
            prop_assert!(Message::decode(&bytes[..len]).is_err());
        }

        /// A single flipped bit in the cookie is always caught
        #[test]
        fn corrupted_cookie_is_rejected(msg in message(), bit in 0usize..32) {
            let mut bytes = msg.encode().unwrap();
            bytes[4 + bit / 8] ^= 1 << (bit % 8);
            prop_assert!(Message::decode(&bytes).is_err());
        }
    }
}

// ============================================================================
// Responder Properties
// ============================================================================

mod responder_properties {
    use super::*;
    use holepunch_discovery::stun::responder::handle_datagram;
    use holepunch_discovery::stun::{Message, MessageClass, Method, TransactionId};

    proptest! {
        /// Every binding request is answered with the requester's own address
        #[test]
        fn binding_reply_reflects_source(
            tid in any::<[u8; 12]>(),
            ip in any::<IpAddr>()
                .prop_map(|ip| ip.to_canonical())
                .prop_filter("usable", |ip| !ip.is_unspecified()),
            port in 1u16..=u16::MAX,
        ) {
            let tid = TransactionId::from_bytes(tid);
            let source = SocketAddr::new(ip, port);
            let request = Message::new(MessageClass::Request, Method::BINDING, tid)
                .encode()
                .unwrap();

            let reply = handle_datagram(&request, source).unwrap().unwrap();
            let response = Message::decode(&reply).unwrap();

            prop_assert_eq!(response.class, MessageClass::SuccessResponse);
            prop_assert_eq!(response.transaction_id, tid);
            prop_assert_eq!(response.xor_mapped_address(), Some(source));
        }

        /// Garbage is never answered and never panics
        #[test]
        fn garbage_is_never_answered(bytes in prop::collection::vec(any::<u8>(), 0..64)) {
            let source: SocketAddr = "198.51.100.7:40000".parse().unwrap();
            if let Ok(Some(reply)) = handle_datagram(&bytes, source) {
                // Only a genuine binding request earns a reply
                prop_assert!(Message::decode(&bytes).unwrap().is_binding_request());
                prop_assert!(Message::decode(&reply).is_ok());
            }
        }
    }
}
