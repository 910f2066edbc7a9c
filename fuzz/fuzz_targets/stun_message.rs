//! Fuzz target for STUN message decoding
//!
//! Arbitrary bytes must decode to an error or to a message that survives
//! another encode/decode pass unchanged.

#![no_main]

use holepunch_discovery::stun::Message;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(msg) = Message::decode(data) else {
        return;
    };

    // Lossy SOFTWARE decoding can grow a value past the length limit
    let Ok(encoded) = msg.encode() else {
        return;
    };
    assert_eq!(
        Message::decode(&encoded).expect("re-encoded message must decode"),
        msg
    );
});
