//! Error types for the chat core.
//!
//! Input validation, rejected room transitions and wire decoding each get
//! their own enum so callers can tell a user mistake from a protocol
//! violation without string matching.

use thiserror::Error;

use crate::room::RoomPhase;

/// User input rejected before any gateway call is made.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Topic was empty after trimming.
    #[error("room topic is empty")]
    EmptyTopic,

    /// Message body was empty after trimming.
    #[error("message is empty")]
    EmptyMessage,

    /// Message body exceeds the configured limit.
    #[error("message is {len} characters, limit is {max}")]
    MessageTooLong {
        /// Length of the rejected body in characters.
        len: usize,
        /// Configured maximum.
        max: usize,
    },

    /// Reaction emoji was empty after trimming.
    #[error("reaction emoji is empty")]
    EmptyReaction,
}

/// A room transition the state machine refused to start.
///
/// Rejections are no-ops: the machine is left exactly as it was.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RoomError {
    /// Another create or join is still in flight.
    #[error("room transition already in progress ({phase:?})")]
    Busy {
        /// Phase that blocked the request.
        phase: RoomPhase,
    },

    /// A room is active; it must be left before creating or joining another.
    #[error("already in room {topic}")]
    AlreadyActive {
        /// Topic of the active room.
        topic: String,
    },

    /// Operation needs an active or failed room and there is none.
    #[error("not in a room")]
    NotActive,

    /// Completion arrived for a transition that is not in flight.
    #[error("unexpected completion in phase {phase:?}")]
    Unexpected {
        /// Phase when the completion arrived.
        phase: RoomPhase,
    },
}

/// Failure decoding a payload received from the gateway.
#[derive(Error, Debug)]
pub enum WireError {
    /// Payload was not valid JSON for the expected shape.
    #[error("malformed payload: {0}")]
    Json(#[from] serde_json::Error),

    /// Payload used a message type this client does not understand.
    #[error("unsupported message type: {0}")]
    UnsupportedKind(String),
}
