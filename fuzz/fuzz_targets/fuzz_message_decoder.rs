//! Fuzz target: `codec::decode`
//!
//! Drives arbitrary byte sequences into the message decoder and asserts
//! that it never panics and that anything it accepts re-encodes to a
//! buffer that decodes to the same message.
//!
//! cargo fuzz run fuzz_message_decoder

#![no_main]

use dicelink::protocol::codec::{decode, encode};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(message) = decode(data) {
        let bytes = encode(&message);
        assert!(bytes.len() <= data.len(), "encoding grew past the input");

        let again = decode(&bytes).expect("re-encoded message must decode");
        assert_eq!(again, message);
    }
});
