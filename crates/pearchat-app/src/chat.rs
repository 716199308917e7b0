//! Chat state machine.
//!
//! This module defines [`Chat`], which ties the room state machine, the
//! message ledger and the gateway lifecycle together. It is a pure state
//! machine: user intents and [`ChatEvent`] completions go in,
//! [`ChatAction`]s come out, and the runtime performs the I/O.
//!
//! # Responsibilities
//!
//! - Validates intents and rejects them before any gateway call.
//! - Applies completions only while the epoch they were issued under is live.
//! - Issues the auto-reconnect join once the gateway has started.
//! - Keeps exactly one user-visible [`SessionError`].

use pearchat_core::{
    Author, Clock, ConnectionState, Ledger, ReactionPayload, RoomMachine, RoomPhase, SystemClock,
    Timestamp, Topic, ValidationError, WireMessage,
};
use tracing::{debug, info, warn};

use crate::{
    Capabilities, ChatAction, ChatConfig, ChatError, ChatEvent, ChatView, Epoch, GatewayEvent,
    GatewayStatus, Lifecycle, SessionError,
};

/// Chat state machine.
///
/// No I/O dependencies. Every gateway interaction is expressed as a
/// [`ChatAction`] and its outcome comes back through [`Chat::handle`].
#[derive(Debug, Clone)]
pub struct Chat<C: Clock = SystemClock> {
    config: ChatConfig,
    lifecycle: Lifecycle,
    room: RoomMachine,
    ledger: Ledger<C>,
    /// Room the ledger's messages belong to.
    ledger_room: Option<Topic>,
    /// Single session error slot. `None` if no error.
    error: Option<SessionError>,
    peers: usize,
    capabilities: Capabilities,
}

impl<C: Clock> Chat<C> {
    /// Create an unmounted chat stamping messages with `clock`.
    pub fn new(config: ChatConfig, clock: C) -> Self {
        Self {
            config,
            lifecycle: Lifecycle::new(),
            room: RoomMachine::new(),
            ledger: Ledger::new(clock),
            ledger_room: None,
            error: None,
            peers: 0,
            capabilities: Capabilities::empty(),
        }
    }

    /// Seed the last room, typically from a [`crate::LastRoomStore`].
    pub fn restore_last_room(&mut self, topic: Option<Topic>) {
        self.room.restore_last_room(topic);
    }

    /// Open a new lifecycle epoch and start the gateway.
    ///
    /// Does nothing if already mounted: a live gateway is never started
    /// twice.
    pub fn mount(
        &mut self,
        has_gateway: bool,
        capabilities: Capabilities,
    ) -> Result<Vec<ChatAction>, ChatError> {
        if !has_gateway {
            self.error = Some(SessionError::gateway_unavailable());
            return Err(ChatError::GatewayUnavailable);
        }
        let Some(epoch) = self.lifecycle.mount() else {
            debug!(epoch = %self.lifecycle.epoch(), "Already mounted");
            return Ok(Vec::new());
        };

        self.capabilities = capabilities;
        self.room.gateway_starting();
        info!(epoch = %epoch, bundle = %self.config.bundle, "Starting gateway");

        Ok(vec![
            ChatAction::Subscribe { epoch },
            ChatAction::Start { epoch, bundle: self.config.bundle.clone() },
        ])
    }

    /// Close the current epoch and stop the gateway.
    ///
    /// Idempotent. Any room transition in flight is abandoned and the
    /// connection reads `Disconnected` afterwards.
    pub fn unmount(&mut self) -> Vec<ChatAction> {
        let was_mounted = self.lifecycle.unmount();
        self.room.suspend();
        self.peers = 0;

        if !was_mounted {
            return Vec::new();
        }
        info!(epoch = %self.lifecycle.epoch(), "Gateway torn down");
        vec![ChatAction::Unsubscribe, ChatAction::Terminate]
    }

    /// Ask the gateway for a new room.
    pub fn create(&mut self) -> Result<Vec<ChatAction>, ChatError> {
        let epoch = self.ready_epoch()?;
        self.room.begin_create()?;
        self.enter_room(None);
        self.error = None;

        info!(epoch = %epoch, "Creating room");
        Ok(vec![ChatAction::CreateRoom { epoch }])
    }

    /// Join the room named by `raw`.
    ///
    /// A blank topic is rejected before anything else is checked.
    pub fn join(&mut self, raw: &str) -> Result<Vec<ChatAction>, ChatError> {
        let topic = Topic::parse(raw).map_err(|err| self.reject(err))?;
        let epoch = self.ready_epoch()?;
        self.room.begin_join(topic.clone())?;
        self.enter_room(Some(&topic));
        self.error = None;

        info!(epoch = %epoch, topic = %topic, "Joining room");
        Ok(vec![ChatAction::JoinRoom { epoch, topic, reconnect: false }])
    }

    /// Append `text` optimistically and broadcast it.
    ///
    /// The ledger entry stays even if delivery later fails.
    pub fn send(&mut self, text: &str) -> Result<Vec<ChatAction>, ChatError> {
        if text.trim().is_empty() {
            return Err(self.reject(ValidationError::EmptyMessage));
        }
        let len = text.chars().count();
        let max = self.config.max_message_len;
        if len > max {
            return Err(self.reject(ValidationError::MessageTooLong { len, max }));
        }

        let epoch = match self.lifecycle.live_epoch() {
            Some(epoch) if self.room.connection() == ConnectionState::Connected => epoch,
            _ => {
                self.error = Some(SessionError::not_connected());
                return Err(ChatError::NotConnected);
            },
        };

        let (timestamp, wire) = match self.ledger.append_local(text) {
            Some(message) => (message.timestamp().clone(), WireMessage::from(message)),
            None => return Err(self.reject(ValidationError::EmptyMessage)),
        };
        let payload = match wire.encode() {
            Ok(payload) => payload,
            Err(err) => {
                self.error = Some(SessionError::send_failed());
                return Err(err.into());
            },
        };
        self.error = None;

        debug!(epoch = %epoch, timestamp = %timestamp, "Sending message");
        Ok(vec![ChatAction::SendMessage { epoch, timestamp, payload }])
    }

    /// React to the message stamped `timestamp` as the local member.
    ///
    /// Merged locally first. Forwarded only if the gateway supports
    /// reactions and a room is connected.
    pub fn react(&mut self, timestamp: &Timestamp, emoji: &str) -> Result<Vec<ChatAction>, ChatError> {
        let emoji = emoji.trim();
        if emoji.is_empty() {
            return Err(self.reject(ValidationError::EmptyReaction));
        }
        if !self.ledger.merge_reaction(timestamp, emoji, Author::Local) {
            return Ok(Vec::new());
        }
        self.error = None;

        let forward = self.capabilities.contains(Capabilities::REACTIONS)
            && self.room.connection() == ConnectionState::Connected;
        match self.lifecycle.live_epoch() {
            Some(epoch) if forward => Ok(vec![ChatAction::SendReaction {
                epoch,
                payload: ReactionPayload {
                    message_timestamp: timestamp.clone(),
                    reaction: emoji.to_owned(),
                },
            }]),
            _ => Ok(Vec::new()),
        }
    }

    /// Dismiss the session error.
    pub fn clear_error(&mut self) {
        self.error = None;
    }

    /// Leave the current room and clear the ledger.
    ///
    /// The last room is kept for the next reconnect. Returns the room that
    /// was left.
    pub fn leave(&mut self) -> Result<Option<Topic>, ChatError> {
        let left = self.room.leave()?;
        self.ledger.clear();
        self.ledger_room = None;
        self.error = None;
        self.peers = 0;

        info!(topic = left.as_ref().map_or("", Topic::as_str), "Left room");
        Ok(left)
    }

    /// Apply a completion or inbound event.
    ///
    /// Events from a closed epoch are discarded without effect, except a
    /// successful start arriving while unmounted, which is answered with
    /// [`ChatAction::Terminate`].
    pub fn handle(&mut self, event: ChatEvent) -> Vec<ChatAction> {
        let epoch = event.epoch();
        if !self.lifecycle.is_live(epoch) {
            debug!(epoch = %epoch, live = %self.lifecycle.epoch(), "Discarding stale event");
            // A start that finished after unmount left the backend running.
            if matches!(event, ChatEvent::Started { result: Ok(()), .. })
                && !self.lifecycle.is_mounted()
            {
                return vec![ChatAction::Terminate];
            }
            return Vec::new();
        }

        match event {
            ChatEvent::Started { result, .. } => self.on_started(epoch, result),
            ChatEvent::RoomCreated { result, .. } => self.on_room_created(result),
            ChatEvent::Joined { requested, result, reconnect, .. } => {
                self.on_joined(&requested, result, reconnect)
            },
            ChatEvent::MessageSent { timestamp, result, .. } => {
                if let Err(reason) = result {
                    warn!(timestamp = %timestamp, reason = %reason, "Message delivery failed");
                    self.error = Some(SessionError::send_failed());
                }
                Vec::new()
            },
            ChatEvent::ReactionSent { result, .. } => {
                if let Err(reason) = result {
                    warn!(reason = %reason, "Reaction forward failed");
                }
                Vec::new()
            },
            ChatEvent::Inbound { event, .. } => {
                self.on_inbound(event);
                Vec::new()
            },
        }
    }

    fn on_started(&mut self, epoch: Epoch, result: Result<(), String>) -> Vec<ChatAction> {
        if let Err(reason) = result {
            warn!(epoch = %epoch, reason = %reason, "Gateway failed to start");
            self.lifecycle.set_status(GatewayStatus::Failed);
            self.room.gateway_failed();
            self.error = Some(SessionError::startup());
            return Vec::new();
        }

        self.lifecycle.set_status(GatewayStatus::Running);
        info!(epoch = %epoch, "Gateway started");

        let Some(topic) = self.room.reconnect_target() else {
            self.room.gateway_idle();
            return Vec::new();
        };
        if let Err(err) = self.room.begin_rejoin(topic.clone()) {
            debug!(error = %err, "Skipping reconnect");
            self.room.gateway_idle();
            return Vec::new();
        }
        self.enter_room(Some(&topic));

        info!(epoch = %epoch, topic = %topic, "Rejoining room");
        vec![ChatAction::JoinRoom { epoch, topic, reconnect: true }]
    }

    fn on_room_created(&mut self, result: Result<Option<Topic>, String>) -> Vec<ChatAction> {
        match result {
            Ok(Some(topic)) => {
                if let Err(err) = self.room.create_succeeded(topic.clone()) {
                    debug!(error = %err, "Ignoring room creation");
                    return Vec::new();
                }
                info!(topic = %topic, "Room created");
                self.ledger_room = Some(topic.clone());
                self.error = None;
                vec![ChatAction::PersistLastRoom(Some(topic))]
            },
            outcome => {
                if let Err(err) = self.room.create_failed() {
                    debug!(error = %err, "Ignoring room creation failure");
                    return Vec::new();
                }
                match outcome {
                    Err(reason) => warn!(reason = %reason, "Room creation failed"),
                    Ok(_) => warn!("Room creation returned no topic"),
                }
                self.error = Some(SessionError::create_failed());
                Vec::new()
            },
        }
    }

    fn on_joined(
        &mut self,
        requested: &Topic,
        result: Result<Topic, String>,
        reconnect: bool,
    ) -> Vec<ChatAction> {
        if self.room.pending() != Some(requested) {
            debug!(topic = %requested, "Ignoring join completion for a topic not being joined");
            return Vec::new();
        }

        match result {
            Ok(confirmed) => {
                let Ok(topic) = self.room.join_succeeded() else {
                    return Vec::new();
                };
                if confirmed != topic {
                    debug!(topic = %topic, confirmed = %confirmed, "Gateway confirmed another topic");
                }
                info!(topic = %topic, reconnect, "Joined room");
                self.error = None;
                vec![ChatAction::PersistLastRoom(Some(topic))]
            },
            Err(reason) => {
                let last_before = self.room.last().cloned();
                let Ok(topic) = self.room.join_failed() else {
                    return Vec::new();
                };
                warn!(topic = %topic, reconnect, reason = %reason, "Join failed");
                self.error = Some(SessionError::join_failed());

                if self.room.last() == last_before.as_ref() {
                    Vec::new()
                } else {
                    vec![ChatAction::PersistLastRoom(None)]
                }
            },
        }
    }

    fn on_inbound(&mut self, event: GatewayEvent) {
        match event {
            GatewayEvent::MessageReceived { member_id, message } => {
                let author = Author::Member(member_id);
                let appended = match message.timestamp {
                    Some(timestamp) => {
                        self.ledger.append_remote_at(author, &message.message, timestamp).is_some()
                    },
                    None => self.ledger.append_remote(author, &message.message).is_some(),
                };
                if !appended {
                    debug!("Dropping blank inbound message");
                }
            },
            GatewayEvent::PeerCountChanged(count) => self.peers = count,
            GatewayEvent::ReactionReceived { member_id, reaction } => {
                let emoji = reaction.reaction.trim();
                if emoji.is_empty() {
                    debug!(member = %member_id, "Dropping blank inbound reaction");
                    return;
                }
                self.ledger.merge_reaction(
                    &reaction.message_timestamp,
                    emoji,
                    Author::Member(member_id),
                );
            },
            GatewayEvent::Disconnected { reason } => match self.room.disconnected() {
                Ok(()) => {
                    warn!(reason = %reason, "Gateway dropped the room");
                    self.error = Some(SessionError::disconnected());
                },
                Err(err) => debug!(error = %err, reason = %reason, "Disconnect outside a room"),
            },
        }
    }

    /// Point the ledger at `target`, dropping history from any other room.
    ///
    /// `None` is a room still being created, which has no history.
    fn enter_room(&mut self, target: Option<&Topic>) {
        if target.is_some() && self.ledger_room.as_ref() == target {
            return;
        }
        if !self.ledger.is_empty() {
            debug!(
                from = self.ledger_room.as_ref().map_or("", Topic::as_str),
                to = target.map_or("", Topic::as_str),
                "Dropping messages from another room"
            );
        }
        self.ledger.clear();
        self.peers = 0;
        self.ledger_room = target.cloned();
    }

    fn ready_epoch(&self) -> Result<Epoch, ChatError> {
        match self.lifecycle.live_epoch() {
            Some(epoch) if self.lifecycle.status() == GatewayStatus::Running => Ok(epoch),
            _ => Err(ChatError::NotReady),
        }
    }

    fn reject(&mut self, err: ValidationError) -> ChatError {
        self.error = Some(SessionError::validation(&err));
        ChatError::Validation(err)
    }

    /// Room phase.
    pub fn phase(&self) -> RoomPhase {
        self.room.phase()
    }

    /// Connection state.
    pub fn connection(&self) -> ConnectionState {
        self.room.connection()
    }

    /// Room the user is in.
    pub fn current_room(&self) -> Option<&Topic> {
        self.room.current()
    }

    /// Room rejoined on the next start.
    pub fn last_room(&self) -> Option<&Topic> {
        self.room.last()
    }

    /// Message ledger.
    pub fn ledger(&self) -> &Ledger<C> {
        &self.ledger
    }

    /// Session error, if any.
    pub fn error(&self) -> Option<&SessionError> {
        self.error.as_ref()
    }

    /// True while a create or join is in flight.
    pub fn is_loading(&self) -> bool {
        self.room.phase().is_transitioning()
    }

    /// Connected peers reported by the gateway.
    pub fn peers(&self) -> usize {
        self.peers
    }

    /// Backend process status.
    pub fn gateway_status(&self) -> GatewayStatus {
        self.lifecycle.status()
    }

    /// Live epoch, if mounted.
    pub fn epoch(&self) -> Option<Epoch> {
        self.lifecycle.live_epoch()
    }

    /// Capabilities advertised by the mounted gateway.
    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    /// Configuration.
    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    /// Snapshot for rendering.
    pub fn view(&self) -> ChatView {
        ChatView::from(self)
    }
}

#[cfg(test)]
mod tests {
    use pearchat_core::{ManualClock, Origin, RoomError};

    use super::*;

    fn topic(s: &str) -> Topic {
        Topic::parse(s).unwrap()
    }

    fn chat() -> Chat<ManualClock> {
        Chat::new(ChatConfig::default(), ManualClock::at_epoch())
    }

    fn mounted(last: Option<&str>, caps: Capabilities) -> (Chat<ManualClock>, Epoch) {
        let mut chat = chat();
        chat.restore_last_room(last.map(topic));
        chat.mount(true, caps).unwrap();
        let epoch = chat.epoch().unwrap();
        (chat, epoch)
    }

    fn running() -> (Chat<ManualClock>, Epoch) {
        let (mut chat, epoch) = mounted(None, Capabilities::empty());
        assert!(chat.handle(ChatEvent::Started { epoch, result: Ok(()) }).is_empty());
        (chat, epoch)
    }

    fn active_in(room: &str) -> (Chat<ManualClock>, Epoch) {
        let (mut chat, epoch) = running();
        chat.join(room).unwrap();
        chat.handle(ChatEvent::Joined {
            epoch,
            requested: topic(room),
            result: Ok(topic(room)),
            reconnect: false,
        });
        assert_eq!(chat.connection(), ConnectionState::Connected);
        (chat, epoch)
    }

    #[test]
    fn mount_without_gateway_sets_error() {
        let mut chat = chat();
        let err = chat.mount(false, Capabilities::empty()).unwrap_err();

        assert!(matches!(err, ChatError::GatewayUnavailable));
        assert_eq!(chat.error().map(|e| e.kind), Some(crate::ErrorKind::GatewayUnavailable));
        assert_eq!(chat.epoch(), None);
    }

    #[test]
    fn mount_subscribes_then_starts_once() {
        let mut chat = chat();
        let actions = chat.mount(true, Capabilities::empty()).unwrap();
        let epoch = chat.epoch().unwrap();

        assert_eq!(
            actions,
            vec![
                ChatAction::Subscribe { epoch },
                ChatAction::Start { epoch, bundle: crate::Bundle::default() },
            ]
        );
        assert_eq!(chat.connection(), ConnectionState::Connecting);
        assert!(chat.mount(true, Capabilities::empty()).unwrap().is_empty());
    }

    #[test]
    fn start_without_target_leaves_backend_ready_and_disconnected() {
        let (chat, _) = running();

        assert_eq!(chat.gateway_status(), GatewayStatus::Running);
        assert_eq!(chat.connection(), ConnectionState::Disconnected);
        assert!(chat.view().backend_ready);
    }

    #[test]
    fn start_failure_sets_startup_error() {
        let (mut chat, epoch) = mounted(None, Capabilities::empty());
        chat.handle(ChatEvent::Started { epoch, result: Err("no bundle".into()) });

        assert_eq!(chat.connection(), ConnectionState::Error);
        assert_eq!(chat.gateway_status(), GatewayStatus::Failed);
        assert_eq!(chat.error().map(|e| e.kind), Some(crate::ErrorKind::Startup));
        assert!(matches!(chat.create(), Err(ChatError::NotReady)));
    }

    #[test]
    fn start_rejoins_last_room_and_forgets_it_on_failure() {
        let (mut chat, epoch) = mounted(Some("R"), Capabilities::empty());
        let actions = chat.handle(ChatEvent::Started { epoch, result: Ok(()) });

        assert_eq!(actions, vec![ChatAction::JoinRoom { epoch, topic: topic("R"), reconnect: true }]);
        assert_eq!(chat.connection(), ConnectionState::Connecting);

        let actions = chat.handle(ChatEvent::Joined {
            epoch,
            requested: topic("R"),
            result: Err("gone".into()),
            reconnect: true,
        });

        assert_eq!(actions, vec![ChatAction::PersistLastRoom(None)]);
        assert_eq!(chat.last_room(), None);
        assert_eq!(chat.current_room(), None);
        assert_eq!(chat.connection(), ConnectionState::Error);
        assert_eq!(chat.phase(), RoomPhase::Failed);
    }

    #[test]
    fn create_success_activates_and_persists() {
        let (mut chat, epoch) = running();
        assert_eq!(chat.create().unwrap(), vec![ChatAction::CreateRoom { epoch }]);
        assert!(chat.is_loading());

        let actions = chat.handle(ChatEvent::RoomCreated { epoch, result: Ok(Some(topic("abc123"))) });

        assert_eq!(actions, vec![ChatAction::PersistLastRoom(Some(topic("abc123")))]);
        assert_eq!(chat.phase(), RoomPhase::Active);
        assert_eq!(chat.current_room(), Some(&topic("abc123")));
        assert_eq!(chat.last_room(), Some(&topic("abc123")));
        assert_eq!(chat.connection(), ConnectionState::Connected);
        assert!(!chat.is_loading());
    }

    #[test]
    fn create_without_topic_fails_with_message() {
        let (mut chat, epoch) = running();
        chat.create().unwrap();
        chat.handle(ChatEvent::RoomCreated { epoch, result: Ok(None) });

        assert_eq!(chat.phase(), RoomPhase::Failed);
        assert_eq!(chat.connection(), ConnectionState::Error);
        assert_eq!(
            chat.error().map(|e| e.message.as_str()),
            Some("Failed to create room. Please try again.")
        );
    }

    #[test]
    fn join_while_joining_is_rejected_without_side_effects() {
        let (mut chat, _) = running();
        chat.join("first").unwrap();
        let before = chat.view();

        let err = chat.join("second").unwrap_err();

        assert!(matches!(err, ChatError::Transition(RoomError::Busy { .. })));
        assert!(err.is_transient());
        assert_eq!(chat.view(), before);
    }

    #[test]
    fn blank_topic_fails_before_gateway() {
        let mut chat = chat();
        let err = chat.join("   ").unwrap_err();

        assert!(matches!(err, ChatError::Validation(ValidationError::EmptyTopic)));
        assert_eq!(chat.error().map(|e| e.message.as_str()), Some("Please enter a room topic"));
        assert_eq!(chat.connection(), ConnectionState::Disconnected);
    }

    #[test]
    fn failed_join_keeps_unrelated_last_room() {
        let (mut chat, epoch) = active_in("room-y");
        chat.leave().unwrap();

        chat.join("room-x").unwrap();
        let actions = chat.handle(ChatEvent::Joined {
            epoch,
            requested: topic("room-x"),
            result: Err("no such room".into()),
            reconnect: false,
        });

        assert!(actions.is_empty());
        assert_eq!(chat.phase(), RoomPhase::Failed);
        assert_eq!(chat.current_room(), None);
        assert_eq!(chat.last_room(), Some(&topic("room-y")));
        assert_eq!(chat.error().map(|e| e.kind), Some(crate::ErrorKind::Join));
    }

    #[test]
    fn send_appends_before_gateway_call() {
        let (mut chat, epoch) = active_in("lobby");
        let actions = chat.send("hello").unwrap();

        assert_eq!(chat.ledger().len(), 1);
        let message = &chat.ledger().messages()[0];
        assert_eq!(message.origin(), Origin::Local);

        let [ChatAction::SendMessage { epoch: sent_epoch, timestamp, payload }] = actions.as_slice()
        else {
            panic!("expected one SendMessage, got {actions:?}");
        };
        assert_eq!(*sent_epoch, epoch);
        assert_eq!(timestamp, message.timestamp());

        let wire = WireMessage::decode(payload.as_bytes()).unwrap();
        assert_eq!(wire.message, "hello");
        assert_eq!(wire.timestamp.as_ref(), Some(message.timestamp()));
    }

    #[test]
    fn send_rejections_leave_ledger_untouched() {
        let (mut chat, _) = running();

        assert!(matches!(chat.send("  "), Err(ChatError::Validation(ValidationError::EmptyMessage))));
        assert!(matches!(chat.send("hello"), Err(ChatError::NotConnected)));
        assert_eq!(
            chat.error().map(|e| e.message.as_str()),
            Some("Cannot send message: not connected to chat room")
        );

        let long = "x".repeat(crate::DEFAULT_MAX_MESSAGE_LEN + 1);
        assert!(matches!(
            chat.send(&long),
            Err(ChatError::Validation(ValidationError::MessageTooLong { len: 1001, max: 1000 }))
        ));
        assert!(chat.ledger().is_empty());
    }

    #[test]
    fn delivery_failure_keeps_optimistic_message() {
        let (mut chat, epoch) = active_in("lobby");
        chat.send("hello").unwrap();
        let timestamp = chat.ledger().messages()[0].timestamp().clone();

        chat.handle(ChatEvent::MessageSent { epoch, timestamp, result: Err("offline".into()) });

        assert_eq!(chat.ledger().len(), 1);
        assert_eq!(chat.error().map(|e| e.kind), Some(crate::ErrorKind::Send));
    }

    #[test]
    fn stale_epoch_never_mutates() {
        let (mut chat, old) = mounted(Some("R"), Capabilities::empty());
        chat.unmount();
        chat.mount(true, Capabilities::empty()).unwrap();
        let before = chat.view();

        assert!(chat.handle(ChatEvent::Started { epoch: old, result: Ok(()) }).is_empty());
        assert!(
            chat.handle(ChatEvent::Inbound { epoch: old, event: GatewayEvent::PeerCountChanged(9) })
                .is_empty()
        );
        assert_eq!(chat.view(), before);
    }

    #[test]
    fn start_finishing_after_unmount_terminates_backend() {
        let (mut chat, old) = mounted(None, Capabilities::empty());
        chat.unmount();
        let before = chat.view();

        assert_eq!(
            chat.handle(ChatEvent::Started { epoch: old, result: Ok(()) }),
            vec![ChatAction::Terminate]
        );
        assert!(chat.handle(ChatEvent::Started { epoch: old, result: Err("x".into()) }).is_empty());
        assert_eq!(chat.view(), before);
    }

    fn receive(chat: &mut Chat<ManualClock>, epoch: Epoch, body: &str) {
        chat.handle(ChatEvent::Inbound {
            epoch,
            event: GatewayEvent::MessageReceived {
                member_id: "bob".into(),
                message: WireMessage::text(Timestamp::new("2024-05-01T12:00:00.000Z"), body),
            },
        });
    }

    #[test]
    fn joining_another_room_after_disconnect_drops_old_messages() {
        let (mut chat, epoch) = active_in("lobby");
        receive(&mut chat, epoch, "from lobby");
        chat.handle(ChatEvent::Inbound {
            epoch,
            event: GatewayEvent::Disconnected { reason: "swarm closed".into() },
        });
        assert_eq!(chat.ledger().len(), 1);

        chat.join("other").unwrap();

        assert!(chat.ledger().is_empty());
        assert_eq!(chat.peers(), 0);
    }

    #[test]
    fn rejoining_same_room_keeps_its_messages() {
        let (mut chat, epoch) = active_in("lobby");
        receive(&mut chat, epoch, "from lobby");
        chat.handle(ChatEvent::Inbound {
            epoch,
            event: GatewayEvent::Disconnected { reason: "swarm closed".into() },
        });

        chat.join("lobby").unwrap();
        chat.handle(ChatEvent::Joined {
            epoch,
            requested: topic("lobby"),
            result: Ok(topic("lobby")),
            reconnect: false,
        });

        assert_eq!(chat.ledger().len(), 1);
        assert_eq!(chat.ledger().messages()[0].body(), "from lobby");
    }

    #[test]
    fn joining_fresh_room_after_failed_rejoin_drops_old_messages() {
        let (mut chat, epoch) = active_in("old");
        receive(&mut chat, epoch, "old");
        chat.unmount();
        chat.mount(true, Capabilities::empty()).unwrap();
        let epoch = chat.epoch().unwrap();

        chat.handle(ChatEvent::Started { epoch, result: Ok(()) });
        assert_eq!(chat.ledger().len(), 1);
        chat.handle(ChatEvent::Joined {
            epoch,
            requested: topic("old"),
            result: Err("gone".into()),
            reconnect: true,
        });
        assert_eq!(chat.phase(), RoomPhase::Failed);

        chat.join("fresh").unwrap();

        assert!(chat.ledger().is_empty());
    }

    #[test]
    fn create_starts_with_empty_history() {
        let (mut chat, epoch) = active_in("lobby");
        receive(&mut chat, epoch, "from lobby");
        chat.handle(ChatEvent::Inbound {
            epoch,
            event: GatewayEvent::Disconnected { reason: "swarm closed".into() },
        });

        chat.create().unwrap();
        chat.handle(ChatEvent::RoomCreated { epoch, result: Ok(Some(topic("new-room"))) });

        assert!(chat.ledger().is_empty());
        assert_eq!(chat.current_room(), Some(&topic("new-room")));
    }

    #[test]
    fn reactions_forward_only_with_capability() {
        let (mut chat, epoch) = active_in("lobby");
        chat.send("hello").unwrap();
        let ts = chat.ledger().messages()[0].timestamp().clone();

        assert!(chat.react(&ts, "👍").unwrap().is_empty());
        assert_eq!(chat.ledger().messages()[0].reactions().len(), 1);

        chat.capabilities = Capabilities::REACTIONS;
        let actions = chat.react(&ts, "❤️").unwrap();
        assert_eq!(
            actions,
            vec![ChatAction::SendReaction {
                epoch,
                payload: ReactionPayload { message_timestamp: ts.clone(), reaction: "❤️".into() },
            }]
        );
        let reactions = chat.ledger().messages()[0].reactions();
        assert_eq!(reactions.len(), 1);
        assert_eq!(reactions[0].emoji, "❤️");
    }

    #[test]
    fn inbound_events_update_ledger_and_peers() {
        let (mut chat, epoch) = active_in("lobby");
        let sender_ts = Timestamp::new("2024-05-01T12:00:00.000Z");

        chat.handle(ChatEvent::Inbound {
            epoch,
            event: GatewayEvent::MessageReceived {
                member_id: "bob".into(),
                message: WireMessage::text(sender_ts.clone(), "hi"),
            },
        });
        chat.handle(ChatEvent::Inbound { epoch, event: GatewayEvent::PeerCountChanged(3) });
        for emoji in ["👍", "😂"] {
            chat.handle(ChatEvent::Inbound {
                epoch,
                event: GatewayEvent::ReactionReceived {
                    member_id: "alice".into(),
                    reaction: ReactionPayload {
                        message_timestamp: sender_ts.clone(),
                        reaction: emoji.into(),
                    },
                },
            });
        }

        let message = chat.ledger().find(&sender_ts).unwrap();
        assert_eq!(message.author(), &Author::Member("bob".into()));
        assert_eq!(message.origin(), Origin::Remote);
        assert_eq!(message.reactions().len(), 1);
        assert_eq!(message.reactions()[0].emoji, "😂");
        assert_eq!(chat.peers(), 3);
    }

    #[test]
    fn disconnect_fails_active_room() {
        let (mut chat, epoch) = active_in("lobby");
        chat.handle(ChatEvent::Inbound {
            epoch,
            event: GatewayEvent::Disconnected { reason: "swarm closed".into() },
        });

        assert_eq!(chat.phase(), RoomPhase::Failed);
        assert_eq!(chat.connection(), ConnectionState::Disconnected);
        assert_eq!(chat.error().map(|e| e.kind), Some(crate::ErrorKind::Disconnected));
    }

    #[test]
    fn leave_clears_ledger_keeps_last_room() {
        let (mut chat, _) = active_in("lobby");
        chat.send("hello").unwrap();

        assert_eq!(chat.leave().unwrap(), Some(topic("lobby")));
        assert!(chat.ledger().is_empty());
        assert_eq!(chat.phase(), RoomPhase::Idle);
        assert_eq!(chat.last_room(), Some(&topic("lobby")));
        assert!(matches!(chat.leave(), Err(ChatError::Transition(RoomError::NotActive))));
    }

    #[test]
    fn unmount_twice_is_harmless() {
        let (mut chat, _) = active_in("lobby");

        assert_eq!(chat.unmount(), vec![ChatAction::Unsubscribe, ChatAction::Terminate]);
        assert_eq!(chat.connection(), ConnectionState::Disconnected);
        assert!(chat.unmount().is_empty());
        assert_eq!(chat.connection(), ConnectionState::Disconnected);
        assert_eq!(chat.current_room(), Some(&topic("lobby")));
    }
}
