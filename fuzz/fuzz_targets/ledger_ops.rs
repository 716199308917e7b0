//! Fuzz target for the message ledger
//!
//! # Strategy
//!
//! - Interleaved local and remote appends, with and without sender stamps
//! - Reactions from a small member pool on existing and unknown stamps
//! - Clears at arbitrary points
//!
//! # Invariants
//!
//! - Blank bodies are never appended
//! - Messages keep append order; reactions never reorder them
//! - At most one reaction per member per message
//! - List keys are unique even when stamps collide

#![no_main]

use std::collections::HashSet;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use pearchat_core::{Author, Ledger, ManualClock, Timestamp};

#[derive(Debug, Arbitrary)]
enum LedgerOp {
    Local(String),
    Remote { member: u8, body: String },
    RemoteAt { member: u8, body: String, stamp: u8 },
    React { member: Option<u8>, target: u8, emoji: String },
    Clear,
}

fn member(id: u8) -> Author {
    Author::Member(format!("peer-{}", id % 4))
}

fuzz_target!(|ops: Vec<LedgerOp>| {
    let mut ledger = Ledger::new(ManualClock::at_epoch());
    let mut bodies: Vec<String> = Vec::new();

    for op in ops {
        match op {
            LedgerOp::Local(body) => {
                let appended = ledger.append_local(&body).is_some();
                assert_eq!(appended, !body.trim().is_empty());
                if appended {
                    bodies.push(body);
                }
            },
            LedgerOp::Remote { member: id, body } => {
                if ledger.append_remote(member(id), &body).is_some() {
                    bodies.push(body);
                }
            },
            LedgerOp::RemoteAt { member: id, body, stamp } => {
                let stamp = Timestamp::new(format!("2024-05-01T12:00:00.{:03}Z", stamp % 8));
                if ledger.append_remote_at(member(id), &body, stamp).is_some() {
                    bodies.push(body);
                }
            },
            LedgerOp::React { member: id, target, emoji } => {
                let stamp = match ledger.messages().get(usize::from(target)) {
                    Some(message) => message.timestamp().clone(),
                    None => Timestamp::new("unknown"),
                };
                let author = id.map_or(Author::Local, member);
                ledger.merge_reaction(&stamp, &emoji, author);
            },
            LedgerOp::Clear => {
                ledger.clear();
                bodies.clear();
            },
        }

        let current: Vec<_> = ledger.messages().iter().map(|m| m.body().to_owned()).collect();
        assert_eq!(current, bodies);

        for message in ledger.messages() {
            let members: HashSet<_> = message.reactions().iter().map(|r| &r.member).collect();
            assert_eq!(members.len(), message.reactions().len());
        }

        let keys: HashSet<_> = ledger.keyed().map(|(key, _)| key).collect();
        assert_eq!(keys.len(), ledger.len());
    }
});
