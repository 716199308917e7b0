//! Chat error types.
//!
//! [`ChatError`] is returned synchronously when an intent is refused.
//! [`SessionError`] is the single user-visible error slot; it is set by
//! failed intents and by failed gateway calls whose results arrive later.

use std::fmt;

use pearchat_core::{RoomError, ValidationError, WireError};
use serde::Serialize;
use thiserror::Error;

const CREATE_FAILED: &str = "Failed to create room. Please try again.";
const JOIN_FAILED: &str =
    "Failed to join room. The room may not exist or there might be a connection issue.";
const NOT_CONNECTED: &str = "Cannot send message: not connected to chat room";
const SEND_FAILED: &str = "Failed to send message. Please try again.";
const EMPTY_TOPIC: &str = "Please enter a room topic";
const EMPTY_MESSAGE: &str = "Please enter a message";
const EMPTY_REACTION: &str = "Please choose a reaction";
const GATEWAY_UNAVAILABLE: &str = "Chat backend is not available";
const STARTUP_FAILED: &str = "Failed to start chat backend. Please restart the app.";
const DISCONNECTED: &str = "Lost connection to chat room";

/// Category of a [`SessionError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    /// No gateway handle was supplied.
    GatewayUnavailable,
    /// Gateway failed to start.
    Startup,
    /// Room create or join was rejected.
    Join,
    /// Message delivery failed after the optimistic append.
    Send,
    /// User input rejected before any gateway call.
    Validation,
    /// Send attempted without an active room.
    NotConnected,
    /// Gateway dropped the active room.
    Disconnected,
}

/// User-visible session error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionError {
    /// Category.
    pub kind: ErrorKind,
    /// Text shown to the user.
    pub message: String,
}

impl SessionError {
    fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    /// No gateway handle.
    pub fn gateway_unavailable() -> Self {
        Self::new(ErrorKind::GatewayUnavailable, GATEWAY_UNAVAILABLE)
    }

    /// Gateway start failed.
    pub fn startup() -> Self {
        Self::new(ErrorKind::Startup, STARTUP_FAILED)
    }

    /// Room creation returned no topic or failed.
    pub fn create_failed() -> Self {
        Self::new(ErrorKind::Join, CREATE_FAILED)
    }

    /// Join rejected.
    pub fn join_failed() -> Self {
        Self::new(ErrorKind::Join, JOIN_FAILED)
    }

    /// Send without an active room.
    pub fn not_connected() -> Self {
        Self::new(ErrorKind::NotConnected, NOT_CONNECTED)
    }

    /// Delivery failed.
    pub fn send_failed() -> Self {
        Self::new(ErrorKind::Send, SEND_FAILED)
    }

    /// Gateway reported a disconnect.
    pub fn disconnected() -> Self {
        Self::new(ErrorKind::Disconnected, DISCONNECTED)
    }

    /// Input rejected by validation.
    pub fn validation(err: &ValidationError) -> Self {
        let message = match err {
            ValidationError::EmptyTopic => EMPTY_TOPIC.to_owned(),
            ValidationError::EmptyMessage => EMPTY_MESSAGE.to_owned(),
            ValidationError::EmptyReaction => EMPTY_REACTION.to_owned(),
            ValidationError::MessageTooLong { len, max } => {
                format!("Message is too long ({len}/{max} characters)")
            },
        };
        Self::new(ErrorKind::Validation, message)
    }
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// An intent the chat refused to carry out.
#[derive(Error, Debug)]
pub enum ChatError {
    /// No gateway handle was supplied.
    #[error("no gateway available")]
    GatewayUnavailable,

    /// Gateway is mounted but has not finished starting, or failed to.
    #[error("gateway is not running")]
    NotReady,

    /// Send attempted without an active, connected room.
    #[error("not connected to a room")]
    NotConnected,

    /// Input rejected before any gateway call.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Room state machine refused the transition. State is unchanged.
    #[error(transparent)]
    Transition(#[from] RoomError),

    /// Message could not be serialized for the gateway.
    #[error(transparent)]
    Encode(#[from] WireError),
}

impl ChatError {
    /// Returns true if retrying the same intent later may succeed.
    ///
    /// A busy room machine or a gateway still starting clear up on their own.
    /// Bad input and a missing gateway do not.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::NotReady | Self::NotConnected | Self::Transition(RoomError::Busy { .. })
        )
    }
}

#[cfg(test)]
mod tests {
    use pearchat_core::RoomPhase;

    use super::*;

    #[test]
    fn busy_is_transient_already_active_is_not() {
        assert!(ChatError::from(RoomError::Busy { phase: RoomPhase::Joining }).is_transient());
        assert!(!ChatError::from(RoomError::AlreadyActive { topic: "x".into() }).is_transient());
        assert!(!ChatError::from(ValidationError::EmptyTopic).is_transient());
        assert!(!ChatError::GatewayUnavailable.is_transient());
    }

    #[test]
    fn validation_texts() {
        assert_eq!(
            SessionError::validation(&ValidationError::EmptyTopic).message,
            "Please enter a room topic"
        );
        assert_eq!(
            SessionError::validation(&ValidationError::MessageTooLong { len: 1001, max: 1000 })
                .message,
            "Message is too long (1001/1000 characters)"
        );
    }
}
