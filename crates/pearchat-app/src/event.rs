//! Completions and inbound events fed back into the chat state machine.
//!
//! Failure reasons are carried as strings: the backend error type is
//! erased at the manager boundary so the state machine stays non-generic
//! over the gateway.

use pearchat_core::{Timestamp, Topic};

use crate::{Epoch, GatewayEvent};

/// Events processed by the Chat state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    /// `start` finished.
    Started {
        /// Issuing epoch.
        epoch: Epoch,
        /// Failure reason on error.
        result: Result<(), String>,
    },

    /// `create_room` finished.
    RoomCreated {
        /// Issuing epoch.
        epoch: Epoch,
        /// Created topic, `None` if the backend produced none.
        result: Result<Option<Topic>, String>,
    },

    /// `join_room` finished.
    Joined {
        /// Issuing epoch.
        epoch: Epoch,
        /// Topic the join was issued for.
        requested: Topic,
        /// Topic confirmed by the backend.
        result: Result<Topic, String>,
        /// Issued by auto-reconnect.
        reconnect: bool,
    },

    /// `send_message` finished.
    MessageSent {
        /// Issuing epoch.
        epoch: Epoch,
        /// Stamp of the optimistic ledger entry.
        timestamp: Timestamp,
        /// Failure reason on error.
        result: Result<(), String>,
    },

    /// `send_reaction` finished.
    ReactionSent {
        /// Issuing epoch.
        epoch: Epoch,
        /// Failure reason on error.
        result: Result<(), String>,
    },

    /// Event pushed by the backend.
    Inbound {
        /// Epoch of the subscription that delivered it.
        epoch: Epoch,
        /// The event.
        event: GatewayEvent,
    },
}

impl ChatEvent {
    /// Epoch the event belongs to.
    pub fn epoch(&self) -> Epoch {
        match self {
            Self::Started { epoch, .. }
            | Self::RoomCreated { epoch, .. }
            | Self::Joined { epoch, .. }
            | Self::MessageSent { epoch, .. }
            | Self::ReactionSent { epoch, .. }
            | Self::Inbound { epoch, .. } => *epoch,
        }
    }
}
