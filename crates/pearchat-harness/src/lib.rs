//! Deterministic simulation harness for pearchat.
//!
//! [`SimGateway`] implements the gateway trait in memory with seeded room
//! topics, scripted failures and gated calls, so the real
//! [`pearchat_app::ConnectionManager`] can be driven through any
//! interleaving of intents, completions and inbound events.
//!
//! # Invariant Testing
//!
//! The `invariants` module checks WHAT must hold after every step, not
//! specific scenarios. Use [`InvariantRegistry::standard()`] for the
//! session invariants.
//!
//! # Scripted Sessions
//!
//! The `script` module turns [`Step`] sequences (hand-written, seeded or
//! fuzzer-provided) into a running session with invariant checks after
//! every step.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod invariants;
pub mod script;
pub mod sim_gateway;

pub use invariants::{
    ActiveHasRoom, ConnectedHasRoom, Invariant, InvariantRegistry, InvariantResult,
    LastRoomPersisted, LoadingMatchesTransition, OneReactionPerMember, SessionSnapshot,
    SubscriptionFollowsMount, UniqueMessageKeys, Violation,
};
pub use script::{ScriptFailure, Session, Step, generate};
pub use sim_gateway::{Gate, GatewayCall, Op, SimGateway, SimGatewayError};
