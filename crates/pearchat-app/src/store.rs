//! Last-room persistence.
//!
//! The chat core only needs to remember one topic between sessions. Where
//! it lives (settings file, keychain, browser storage) is up to the host.

use std::sync::{Arc, Mutex, PoisonError};

use pearchat_core::Topic;

/// Get/set storage for the last successfully entered room.
pub trait LastRoomStore: Send + Sync + 'static {
    /// Stored topic, if any.
    fn get(&self) -> Option<Topic>;

    /// Replace the stored topic. `None` forgets it.
    fn set(&self, topic: Option<Topic>);
}

/// In-memory store. Clones share the same slot.
#[derive(Debug, Clone, Default)]
pub struct MemoryLastRoomStore {
    slot: Arc<Mutex<Option<Topic>>>,
}

impl MemoryLastRoomStore {
    /// Store pre-seeded with `topic`.
    pub fn with_topic(topic: Topic) -> Self {
        Self { slot: Arc::new(Mutex::new(Some(topic))) }
    }
}

impl LastRoomStore for MemoryLastRoomStore {
    fn get(&self) -> Option<Topic> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn set(&self, topic: Option<Topic>) {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = topic;
    }
}
