//! Fuzz target for peer payload decoding
//!
//! Payloads arrive from untrusted peers through the gateway.
//!
//! # Strategy
//!
//! - Raw bytes through both message and reaction decoders
//! - Structured messages with arbitrary text and stamps
//!
//! # Invariants
//!
//! - Decoding NEVER panics on malformed input
//! - A decoded message re-encodes and decodes to the same value
//! - A structured message survives encode then decode unchanged

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use pearchat_core::{ReactionPayload, Timestamp, WireMessage};

#[derive(Debug, Arbitrary)]
enum Input {
    Raw(Vec<u8>),
    Message { stamp: Option<String>, body: String },
    Reaction { stamp: String, emoji: String },
}

fuzz_target!(|input: Input| {
    match input {
        Input::Raw(bytes) => {
            if let Ok(message) = WireMessage::decode(&bytes) {
                let encoded = message.encode().expect("decoded message must re-encode");
                let again = WireMessage::decode(encoded.as_bytes()).expect("re-encoded must decode");
                assert_eq!(again, message);
            }
            let _ = ReactionPayload::decode(&bytes);
        },
        Input::Message { stamp, body } => {
            let message = WireMessage {
                timestamp: stamp.map(Timestamp::new),
                ..WireMessage::text(Timestamp::new(""), body)
            };
            let encoded = message.encode().expect("message must encode");
            assert_eq!(WireMessage::decode(encoded.as_bytes()).ok(), Some(message));
        },
        Input::Reaction { stamp, emoji } => {
            let payload =
                ReactionPayload { message_timestamp: Timestamp::new(stamp), reaction: emoji };
            let encoded = payload.encode().expect("reaction must encode");
            assert_eq!(ReactionPayload::decode(encoded.as_bytes()).ok(), Some(payload));
        },
    }
});
