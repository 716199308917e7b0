//! UI snapshot.
//!
//! [`ChatView`] is everything a frontend renders, detached from the state
//! machine so it can be sent across threads or serialized to a webview.

use pearchat_core::{Clock, ConnectionState, Message, RoomPhase, Topic};
use serde::Serialize;

use crate::{Chat, GatewayStatus, SessionError};

/// One ledger row with a list key unique even across equal timestamps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageView {
    /// Stable list key.
    pub key: String,
    /// The message and its reactions.
    #[serde(flatten)]
    pub message: Message,
}

/// Snapshot of chat state for rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatView {
    /// Connection indicator.
    pub connection: ConnectionState,
    /// Room phase.
    pub phase: RoomPhase,
    /// Room the user is in.
    pub current_room: Option<Topic>,
    /// Header title for the current room.
    pub room_title: Option<String>,
    /// Room rejoined on the next start.
    pub last_room: Option<Topic>,
    /// Messages in display order.
    pub messages: Vec<MessageView>,
    /// Connected peers reported by the backend.
    pub peers: usize,
    /// A create or join is in flight.
    pub loading: bool,
    /// Backend process status.
    pub gateway: GatewayStatus,
    /// Backend started and accepting room calls.
    pub backend_ready: bool,
    /// Session error, if any.
    pub error: Option<SessionError>,
}

impl<C: Clock> From<&Chat<C>> for ChatView {
    fn from(chat: &Chat<C>) -> Self {
        let current_room = chat.current_room().cloned();
        Self {
            connection: chat.connection(),
            phase: chat.phase(),
            room_title: current_room.as_ref().map(Topic::title),
            current_room,
            last_room: chat.last_room().cloned(),
            messages: chat
                .ledger()
                .keyed()
                .map(|(key, message)| MessageView { key, message: message.clone() })
                .collect(),
            peers: chat.peers(),
            loading: chat.is_loading(),
            gateway: chat.gateway_status(),
            backend_ready: chat.gateway_status() == GatewayStatus::Running,
            error: chat.error().cloned(),
        }
    }
}
