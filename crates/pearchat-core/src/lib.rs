//! Core chat state for pearchat
//!
//! Pure, I/O-free building blocks used by the orchestration layer:
//! validated room topics, a room state machine with last-room memory, and
//! an append-ordered message ledger with per-member reactions.
//!
//! # Components
//!
//! - [`Topic`]: validated room identifier and [`resolve_target_room`]
//! - [`RoomMachine`]: room phases, connection state and last-room policy
//! - [`Ledger`]: message and reaction store
//! - [`Clock`] / [`Stamper`]: time source and unique message timestamps
//! - [`WireMessage`] / [`ReactionPayload`]: serialized gateway payloads

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod clock;
mod error;
mod ledger;
mod message;
mod room;
mod topic;
mod wire;

pub use clock::{Clock, ManualClock, Stamper, SystemClock, Timestamp};
pub use error::{RoomError, ValidationError, WireError};
pub use ledger::Ledger;
pub use message::{Author, DEFAULT_REACTIONS, LOCAL_AUTHOR, Message, Origin, Reaction};
pub use room::{ConnectionState, RoomMachine, RoomPhase};
pub use topic::{Topic, resolve_target_room};
pub use wire::{MessageKind, ReactionPayload, WireMessage};
