//! Observable state snapshots for invariant checking.
//!
//! Snapshots capture what the UI and the outside world can see at one
//! point in time, so every invariant checks the same consistent state.

use pearchat_app::{Chat, ChatView, ConnectionManager, Epoch, Gateway, LastRoomStore};
use pearchat_core::{Clock, Topic};

/// Snapshot of one chat session.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    /// What the UI renders.
    pub view: ChatView,
    /// Live epoch. `None` if not mounted.
    pub epoch: Option<Epoch>,
    /// Contents of the last-room store. `None` if no store was captured.
    pub stored_last_room: Option<Option<Topic>>,
    /// Whether an inbound subscription is open. `None` if not captured.
    pub subscribed: Option<bool>,
    /// Whether the manager holds a gateway handle.
    pub has_gateway: bool,
}

impl SessionSnapshot {
    /// Capture a bare state machine.
    pub fn from_chat<C: Clock>(chat: &Chat<C>) -> Self {
        Self {
            view: chat.view(),
            epoch: chat.epoch(),
            stored_last_room: None,
            subscribed: None,
            has_gateway: false,
        }
    }

    /// Capture a manager, including its store and subscription.
    pub fn of<G, S, C>(manager: &ConnectionManager<G, S, C>) -> Self
    where
        G: Gateway,
        S: LastRoomStore,
        C: Clock,
    {
        Self {
            view: manager.view(),
            epoch: manager.chat().epoch(),
            stored_last_room: Some(manager.store().get()),
            subscribed: Some(manager.is_subscribed()),
            has_gateway: manager.gateway().is_some(),
        }
    }
}
