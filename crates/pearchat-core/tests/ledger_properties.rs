//! Property-based tests for the message ledger.
//!
//! Random sequences of appends and reaction merges are applied to a ledger
//! and to a plain `Vec` model. After every operation the ledger must agree
//! with the model on message count and order, and every message must hold
//! at most one reaction per member.

use std::collections::HashSet;

use pearchat_core::{Author, Ledger, ManualClock, Origin, Timestamp};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Local(String),
    Remote(u8, String),
    React { target: usize, member: u8, emoji: u8 },
}

const EMOJI: [&str; 4] = ["👍", "❤️", "😂", "🙏"];

fn body_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        3 => "[a-z]{1,12}",
        1 => "[ \t\n]{0,3}",
    ]
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => body_strategy().prop_map(Op::Local),
        2 => (0u8..4, body_strategy()).prop_map(|(m, b)| Op::Remote(m, b)),
        4 => (0usize..32, 0u8..4, 0u8..4)
            .prop_map(|(target, member, emoji)| Op::React { target, member, emoji }),
    ]
}

fn member(id: u8) -> Author {
    if id == 0 { Author::Local } else { Author::Member(format!("peer-{id}")) }
}

proptest! {
    #[test]
    fn prop_ledger_matches_append_model(ops in prop::collection::vec(op_strategy(), 0..60)) {
        let mut ledger = Ledger::new(ManualClock::at_epoch());
        let mut model: Vec<(Origin, String)> = Vec::new();

        for op in ops {
            match op {
                Op::Local(body) => {
                    let appended = ledger.append_local(&body).is_some();
                    prop_assert_eq!(appended, !body.trim().is_empty());
                    if appended {
                        model.push((Origin::Local, body));
                    }
                },
                Op::Remote(m, body) => {
                    if ledger.append_remote(member(m + 1), &body).is_some() {
                        model.push((Origin::Remote, body));
                    }
                },
                Op::React { target, member: m, emoji } => {
                    let Some(ts) = ledger.messages().get(target).map(|msg| msg.timestamp().clone())
                    else {
                        continue;
                    };
                    let emoji = EMOJI[usize::from(emoji)];
                    prop_assert!(ledger.merge_reaction(&ts, emoji, member(m)));

                    let reaction = ledger.find(&ts).and_then(|msg| msg.reaction_by(&member(m)));
                    prop_assert_eq!(reaction.map(|r| r.emoji.as_str()), Some(emoji));
                },
            }

            let actual: Vec<_> = ledger
                .messages()
                .iter()
                .map(|msg| (msg.origin(), msg.body().to_owned()))
                .collect();
            prop_assert_eq!(&actual, &model);

            for msg in ledger.messages() {
                let members: HashSet<_> = msg.reactions().iter().map(|r| &r.member).collect();
                prop_assert_eq!(members.len(), msg.reactions().len());
            }
        }
    }

    #[test]
    fn prop_local_stamps_strictly_increase(count in 1usize..50) {
        let mut ledger = Ledger::new(ManualClock::at_epoch());
        for i in 0..count {
            ledger.append_local(&format!("m{i}"));
        }

        let stamps: Vec<&Timestamp> = ledger.messages().iter().map(|m| m.timestamp()).collect();
        for pair in stamps.windows(2) {
            prop_assert!(pair[0] < pair[1]);
        }
    }

    #[test]
    fn prop_reactions_never_reorder_messages(
        bodies in prop::collection::vec("[a-z]{1,8}", 1..10),
        reacts in prop::collection::vec((0usize..10, 0u8..4), 0..30),
    ) {
        let mut ledger = Ledger::new(ManualClock::at_epoch());
        for body in &bodies {
            ledger.append_local(body);
        }
        let before: Vec<_> = ledger.messages().iter().map(|m| m.timestamp().clone()).collect();

        for (idx, m) in reacts {
            if let Some(ts) = before.get(idx) {
                ledger.merge_reaction(ts, "👍", member(m));
            }
        }

        let after: Vec<_> = ledger.messages().iter().map(|m| m.timestamp().clone()).collect();
        prop_assert_eq!(before, after);
    }
}
