//! Application layer for pearchat
//!
//! Pure chat orchestration plus the runtime that owns the gateway handle.
//! The same orchestration code runs against a real peer-to-peer backend and
//! against the simulated gateway in `pearchat-harness`.
//!
//! # Components
//!
//! - [`Chat`]: pure state machine (intents and completions in, actions out)
//! - [`Gateway`]: trait for the asynchronous backend RPC boundary
//! - [`ConnectionManager`]: owns the gateway, executes actions, feeds
//!   completions back tagged with their lifecycle [`Epoch`]
//! - [`ChatView`]: serializable snapshot for the UI

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod action;
mod chat;
mod config;
mod error;
mod event;
mod gateway;
mod lifecycle;
mod manager;
mod store;
mod view;

pub use action::ChatAction;
pub use chat::Chat;
pub use config::{Bundle, ChatConfig, DEFAULT_BUNDLE_PATH, DEFAULT_MAX_MESSAGE_LEN};
pub use error::{ChatError, ErrorKind, SessionError};
pub use event::ChatEvent;
pub use gateway::{Capabilities, Gateway, GatewayEvent, Subscription, SubscriptionId};
pub use lifecycle::{Epoch, GatewayStatus, Lifecycle};
pub use manager::{Command, ConnectionManager};
pub use store::{LastRoomStore, MemoryLastRoomStore};
pub use view::{ChatView, MessageView};
