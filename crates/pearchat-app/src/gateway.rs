//! Gateway trait for the backend RPC boundary.
//!
//! The [`Gateway`] trait decouples chat orchestration from the peer-to-peer
//! backend. A production host wraps its RPC client in it; the simulation
//! harness provides a scriptable in-memory version. The generic
//! [`crate::ConnectionManager`] handles everything else.

use std::future::Future;

use bitflags::bitflags;
use pearchat_core::{ReactionPayload, Topic, WireMessage};
use tokio::sync::mpsc;

use crate::Bundle;

bitflags! {
    /// Optional gateway operations.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Capabilities: u8 {
        /// Gateway forwards reactions to peers.
        const REACTIONS = 1 << 0;
    }
}

/// Handle identifying one inbound event registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// Inbound event stream returned by [`Gateway::subscribe`].
#[derive(Debug)]
pub struct Subscription {
    /// Handle passed back to [`Gateway::unsubscribe`].
    pub id: SubscriptionId,
    /// Events pushed by the backend.
    pub events: mpsc::UnboundedReceiver<GatewayEvent>,
}

/// Event pushed by the backend outside any request/response pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayEvent {
    /// A peer sent a message to the current room.
    MessageReceived {
        /// Sender's member id.
        member_id: String,
        /// Decoded payload.
        message: WireMessage,
    },

    /// Number of connected peers changed.
    PeerCountChanged(usize),

    /// A peer reacted to a message.
    ReactionReceived {
        /// Reacting member's id.
        member_id: String,
        /// Decoded payload.
        reaction: ReactionPayload,
    },

    /// Backend lost the current room.
    Disconnected {
        /// Backend-provided description.
        reason: String,
    },
}

/// Asynchronous backend RPC boundary.
///
/// Handles are cheap to clone; every clone talks to the same backend. The
/// connection manager clones the handle into each in-flight call so that
/// calls outlive the borrow that issued them.
///
/// # Errors
///
/// Every fallible operation reports a backend-specific [`Gateway::Error`].
/// The manager converts them into session errors; they never escape to the
/// UI as `Err`.
pub trait Gateway: Clone + Send + Sync + 'static {
    /// Backend-specific error type.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Start the backend process from `bundle`.
    fn start(&self, bundle: &Bundle) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Stop the backend process. Must be safe to call repeatedly.
    fn terminate(&self) -> Result<(), Self::Error>;

    /// Create a room. `Ok(None)` means the backend produced no topic.
    fn create_room(&self) -> impl Future<Output = Result<Option<Topic>, Self::Error>> + Send;

    /// Join the room identified by `topic`.
    fn join_room(&self, topic: &Topic) -> impl Future<Output = Result<Topic, Self::Error>> + Send;

    /// Broadcast a serialized message to the current room.
    fn send_message(&self, payload: String) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Optional operations this backend supports.
    fn capabilities(&self) -> Capabilities {
        Capabilities::empty()
    }

    /// Forward a reaction to peers.
    ///
    /// Only called when [`Gateway::capabilities`] contains
    /// [`Capabilities::REACTIONS`].
    fn send_reaction(
        &self,
        payload: ReactionPayload,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send {
        let _ = payload;
        async { Ok(()) }
    }

    /// Register for inbound events.
    fn subscribe(&self) -> Subscription;

    /// Drop the registration identified by `id`.
    fn unsubscribe(&self, id: SubscriptionId);
}
