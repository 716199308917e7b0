//! Side effects requested by the chat state machine.
//!
//! [`ChatAction`]s are produced by [`crate::Chat`] and executed by
//! [`crate::ConnectionManager`]. Actions that call the gateway carry the
//! [`Epoch`] they were issued under; the completion event echoes it back.

use pearchat_core::{ReactionPayload, Timestamp, Topic};

use crate::{Bundle, Epoch};

/// Actions produced by the Chat state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatAction {
    /// Register for inbound gateway events.
    Subscribe {
        /// Epoch inbound events are tagged with.
        epoch: Epoch,
    },

    /// Drop the inbound registration, if one exists.
    Unsubscribe,

    /// Start the backend.
    Start {
        /// Issuing epoch.
        epoch: Epoch,
        /// Bundle to start from.
        bundle: Bundle,
    },

    /// Stop the backend. Failures are logged, never surfaced.
    Terminate,

    /// Create a room.
    CreateRoom {
        /// Issuing epoch.
        epoch: Epoch,
    },

    /// Join a room.
    JoinRoom {
        /// Issuing epoch.
        epoch: Epoch,
        /// Room to join.
        topic: Topic,
        /// Issued by auto-reconnect rather than the user.
        reconnect: bool,
    },

    /// Broadcast a message already appended to the ledger.
    SendMessage {
        /// Issuing epoch.
        epoch: Epoch,
        /// Stamp of the optimistic ledger entry.
        timestamp: Timestamp,
        /// Serialized wire message.
        payload: String,
    },

    /// Forward a reaction already merged into the ledger.
    SendReaction {
        /// Issuing epoch.
        epoch: Epoch,
        /// Reaction to forward.
        payload: ReactionPayload,
    },

    /// Write the last room to persistent storage. `None` forgets it.
    PersistLastRoom(Option<Topic>),
}
