//! Scripted chat sessions.
//!
//! A [`Session`] wires a [`ConnectionManager`] to a [`SimGateway`] and
//! applies [`Step`]s one at a time: user intents, peer activity and
//! scripted gateway faults. After every step all in-flight calls are
//! settled and the standard invariants are checked.
//!
//! Steps derive [`Arbitrary`], so the same scripts drive the simulation
//! binary (from a seeded RNG) and the fuzzer (from raw input).

use std::fmt;

use arbitrary::{Arbitrary, Unstructured};
use pearchat_app::{
    ChatConfig, ChatView, ConnectionManager, GatewayEvent, LastRoomStore, MemoryLastRoomStore,
};
use pearchat_core::{DEFAULT_REACTIONS, ManualClock, ReactionPayload, Timestamp, WireMessage};
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, trace};

use crate::{
    invariants::{InvariantRegistry, SessionSnapshot, Violation},
    sim_gateway::{Op, SimGateway},
};

/// Stamp shared by every peer message that carries one, so equal-stamp
/// collisions are exercised.
const PEER_STAMP: &str = "2024-05-01T12:00:00.000Z";

const BODIES: [&str; 5] = ["hello", "hi there", "   ", "🍐", "a longer message about nothing much"];

const PEERS: [&str; 3] = ["alice", "bob", "carol"];

/// One scripted action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Arbitrary)]
pub enum Step {
    /// Mount the manager.
    Initialize,
    /// Unmount the manager.
    Teardown,
    /// User creates a room.
    Create,
    /// User joins a known room by index, or an unknown room.
    Join {
        /// Room selector.
        room: u8,
    },
    /// User submits a blank topic.
    JoinBlank,
    /// User sends a canned message.
    Send {
        /// Body selector.
        body: u8,
    },
    /// User reacts to a message.
    React {
        /// Message selector.
        message: u8,
        /// Emoji selector.
        emoji: u8,
    },
    /// User leaves the room.
    Leave,
    /// User dismisses the error.
    ClearError,
    /// A peer sends a message.
    PeerMessage {
        /// Peer selector.
        member: u8,
        /// Body selector.
        body: u8,
    },
    /// A peer reacts to a message.
    PeerReaction {
        /// Peer selector.
        member: u8,
        /// Message selector.
        message: u8,
        /// Emoji selector.
        emoji: u8,
    },
    /// Peer count changes.
    PeerCount(u8),
    /// Backend drops the room.
    Disconnect,
    /// Next call of an operation fails.
    Fail(Op),
    /// Next room creation yields no topic.
    EmptyCreate,
}

/// A scripted session that stopped early.
#[derive(Debug)]
pub enum ScriptFailure {
    /// An invariant failed after a step.
    Violated {
        /// Index of the offending step.
        index: usize,
        /// The offending step.
        step: Step,
        /// Everything that failed.
        violations: Vec<Violation>,
    },
    /// The async runtime could not be built.
    Runtime(String),
}

impl fmt::Display for ScriptFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Violated { index, step, violations } => {
                write!(f, "step {index} ({step:?}) violated:")?;
                for violation in violations {
                    write!(f, "\n  {violation}")?;
                }
                Ok(())
            },
            Self::Runtime(reason) => write!(f, "runtime: {reason}"),
        }
    }
}

impl std::error::Error for ScriptFailure {}

/// Manager plus simulated gateway, driven step by step.
pub struct Session {
    manager: ConnectionManager<SimGateway, MemoryLastRoomStore, ManualClock>,
    gateway: SimGateway,
    registry: InvariantRegistry,
}

impl Session {
    /// Fresh session with an empty last-room store.
    pub fn new(seed: u64) -> Self {
        Self::with_store(seed, MemoryLastRoomStore::default())
    }

    /// Session whose last room is read from `store`.
    ///
    /// A stored room is registered with the gateway so the reconnect on
    /// mount can succeed.
    pub fn with_store(seed: u64, store: MemoryLastRoomStore) -> Self {
        let gateway = SimGateway::new(seed);
        if let Some(topic) = store.get() {
            gateway.add_room(topic);
        }
        let manager = ConnectionManager::new(
            Some(gateway.clone()),
            ChatConfig::default(),
            store,
            ManualClock::at_epoch(),
        );
        Self { manager, gateway, registry: InvariantRegistry::standard() }
    }

    /// The manager under test.
    pub fn manager(&self) -> &ConnectionManager<SimGateway, MemoryLastRoomStore, ManualClock> {
        &self.manager
    }

    /// The simulated backend.
    pub fn gateway(&self) -> &SimGateway {
        &self.gateway
    }

    /// Apply `step`, settle, and check invariants.
    pub async fn apply(&mut self, step: Step) -> Result<(), Vec<Violation>> {
        trace!(?step, "Applying step");
        let outcome = match step {
            Step::Initialize => self.manager.initialize(),
            Step::Teardown => {
                self.manager.teardown();
                Ok(())
            },
            Step::Create => self.manager.create(),
            Step::Join { room } => {
                let topic = self.pick_room(room);
                self.manager.join(&topic)
            },
            Step::JoinBlank => self.manager.join("  "),
            Step::Send { body } => self.manager.send(pick(&BODIES, body)),
            Step::React { message, emoji } => match self.pick_message(message) {
                Some(timestamp) => {
                    self.manager.react(&timestamp, pick(&DEFAULT_REACTIONS, emoji))
                },
                None => Ok(()),
            },
            Step::Leave => self.manager.leave().map(|_| ()),
            Step::ClearError => {
                self.manager.clear_error();
                Ok(())
            },
            Step::PeerMessage { member, body } => {
                let body = pick(&BODIES, body);
                let message = if member % 2 == 0 {
                    WireMessage::text(Timestamp::new(PEER_STAMP), body)
                } else {
                    WireMessage { timestamp: None, ..WireMessage::text(Timestamp::new(""), body) }
                };
                self.gateway.inject_message(pick(&PEERS, member), message);
                Ok(())
            },
            Step::PeerReaction { member, message, emoji } => {
                if let Some(timestamp) = self.pick_message(message) {
                    self.gateway.inject_reaction(
                        pick(&PEERS, member),
                        ReactionPayload {
                            message_timestamp: timestamp,
                            reaction: pick(&DEFAULT_REACTIONS, emoji).to_owned(),
                        },
                    );
                }
                Ok(())
            },
            Step::PeerCount(count) => {
                self.gateway.inject(GatewayEvent::PeerCountChanged(usize::from(count)));
                Ok(())
            },
            Step::Disconnect => {
                self.gateway.inject_disconnect("simulated drop");
                Ok(())
            },
            Step::Fail(op) => {
                self.gateway.fail_next(op, "scripted failure");
                Ok(())
            },
            Step::EmptyCreate => {
                self.gateway.create_returns_nothing();
                Ok(())
            },
        };
        if let Err(err) = outcome {
            debug!(?step, error = %err, "Step rejected");
        }

        self.manager.settle().await;
        self.registry.check_all(&SessionSnapshot::of(&self.manager))
    }

    /// Apply every step, stopping at the first invariant violation.
    pub async fn run(&mut self, steps: &[Step]) -> Result<ChatView, ScriptFailure> {
        for (index, &step) in steps.iter().enumerate() {
            self.apply(step)
                .await
                .map_err(|violations| ScriptFailure::Violated { index, step, violations })?;
        }
        Ok(self.manager.view())
    }

    /// Run `steps` on a fresh single-threaded runtime.
    pub fn run_blocking(seed: u64, steps: &[Step]) -> Result<ChatView, ScriptFailure> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .map_err(|e| ScriptFailure::Runtime(e.to_string()))?;
        let mut session = Self::new(seed);
        runtime.block_on(session.run(steps))
    }

    fn pick_room(&self, selector: u8) -> String {
        let rooms = self.gateway.rooms();
        match rooms.get(usize::from(selector) % (rooms.len() + 1)) {
            Some(topic) => topic.to_string(),
            None => "no-such-room".to_owned(),
        }
    }

    fn pick_message(&self, selector: u8) -> Option<Timestamp> {
        let view = self.manager.view();
        if view.messages.is_empty() {
            return None;
        }
        let row = &view.messages[usize::from(selector) % view.messages.len()];
        Some(row.message.timestamp().clone())
    }
}

fn pick<'a>(options: &[&'a str], selector: u8) -> &'a str {
    options[usize::from(selector) % options.len()]
}

/// Generate a script of up to `len` steps from `seed`.
///
/// The first step always mounts the manager.
pub fn generate(seed: u64, len: usize) -> Vec<Step> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut bytes = vec![0u8; len.saturating_mul(4)];
    rng.fill_bytes(&mut bytes);

    let mut input = Unstructured::new(&bytes);
    let mut steps = vec![Step::Initialize];
    while steps.len() < len {
        match Step::arbitrary(&mut input) {
            Ok(step) => steps.push(step),
            Err(_) => break,
        }
    }
    steps
}

