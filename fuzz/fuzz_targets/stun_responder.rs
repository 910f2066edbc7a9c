//! Fuzz target for the binding responder's datagram handler
//!
//! Any datagram from any source must be answered, ignored or rejected
//! without panicking, and every answer must be a decodable success response.

#![no_main]

use std::net::{IpAddr, SocketAddr};

use arbitrary::Arbitrary;
use holepunch_discovery::stun::responder::handle_datagram;
use holepunch_discovery::stun::{Message, MessageClass};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct Input {
    ip: IpAddr,
    port: u16,
    datagram: Vec<u8>,
}

fuzz_target!(|input: Input| {
    let source = SocketAddr::new(input.ip, input.port);
    if let Ok(Some(reply)) = handle_datagram(&input.datagram, source) {
        let response = Message::decode(&reply).expect("reply must decode");
        assert_eq!(response.class, MessageClass::SuccessResponse);
        assert!(response.xor_mapped_address().is_some());
    }
});
