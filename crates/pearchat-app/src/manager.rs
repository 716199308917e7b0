//! Connection lifecycle manager.
//!
//! The [`ConnectionManager`] is the only owner of the gateway handle. It
//! executes the [`ChatAction`]s produced by [`Chat`], keeps every in-flight
//! gateway call in a [`FuturesUnordered`] set, and feeds completions and
//! inbound events back into the state machine on a single task.
//!
//! Gateway calls are issued when the manager first polls them, not when
//! the action is executed. Each queued call checks the live epoch at that
//! point and is skipped if its epoch has been torn down, so a gateway is
//! never started after it was terminated. Calls already issued are never
//! cancelled: they are polled to completion and their results discarded by
//! epoch.

use futures::{
    FutureExt, StreamExt,
    future::BoxFuture,
    stream::FuturesUnordered,
};
use pearchat_core::{Clock, SystemClock, Timestamp, Topic};
use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

use crate::{
    Chat, ChatAction, ChatConfig, ChatError, ChatEvent, ChatView, Epoch, Gateway,
    LastRoomStore, MemoryLastRoomStore, Subscription,
};

/// User intent delivered to [`ConnectionManager::run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Mount and start the gateway.
    Initialize,
    /// Create a room.
    Create,
    /// Join a room by topic.
    Join(String),
    /// Send a message.
    Send(String),
    /// React to a message.
    React {
        /// Stamp of the message.
        timestamp: Timestamp,
        /// Emoji glyph.
        emoji: String,
    },
    /// Dismiss the session error.
    ClearError,
    /// Leave the current room.
    Leave,
    /// Tear down and stop the loop.
    Shutdown,
}

/// Reported for a queued call whose epoch ended before it was issued.
const CALL_SKIPPED: &str = "lifecycle ended before the call was issued";

enum Next {
    Command(Command),
    Event(ChatEvent),
    Closed,
}

/// Owns the gateway and drives [`Chat`] with its results.
///
/// # Type Parameters
///
/// - `G`: backend gateway
/// - `S`: last-room persistence
/// - `C`: clock for message timestamps
pub struct ConnectionManager<G, S = MemoryLastRoomStore, C = SystemClock>
where
    G: Gateway,
    S: LastRoomStore,
    C: Clock,
{
    gateway: Option<G>,
    chat: Chat<C>,
    store: S,
    subscription: Option<(Epoch, Subscription)>,
    pending: FuturesUnordered<BoxFuture<'static, ChatEvent>>,
    /// Live epoch, read by queued calls before they reach the gateway.
    live: watch::Sender<Option<Epoch>>,
}

impl<G, S, C> ConnectionManager<G, S, C>
where
    G: Gateway,
    S: LastRoomStore,
    C: Clock,
{
    /// Create a manager. `gateway` may be absent; `initialize` then fails.
    ///
    /// The last room is read from `store` once, here.
    pub fn new(gateway: Option<G>, config: ChatConfig, store: S, clock: C) -> Self {
        let mut chat = Chat::new(config, clock);
        chat.restore_last_room(store.get());
        let (live, _live_rx) = watch::channel(None);
        Self {
            gateway,
            chat,
            store,
            subscription: None,
            pending: FuturesUnordered::new(),
            live,
        }
    }

    /// Mount: register for inbound events and start the gateway.
    ///
    /// Returns immediately; the start result arrives through
    /// [`Self::step`], [`Self::settle`] or [`Self::run`]. Calling this
    /// again while mounted does nothing.
    pub fn initialize(&mut self) -> Result<(), ChatError> {
        let capabilities = self.gateway.as_ref().map(Gateway::capabilities).unwrap_or_default();
        let actions = self.chat.mount(self.gateway.is_some(), capabilities)?;
        self.live.send_replace(self.chat.epoch());
        self.execute(actions);
        Ok(())
    }

    /// Unmount: deregister, terminate and invalidate the epoch.
    ///
    /// Idempotent and safe before `initialize` finished. Calls queued under
    /// the closed epoch and not yet issued never reach the gateway.
    pub fn teardown(&mut self) {
        let actions = self.chat.unmount();
        self.live.send_replace(None);
        self.execute(actions);
    }

    /// Tear down the current gateway and install `gateway` in its place.
    ///
    /// The next [`Self::initialize`] starts the new handle.
    pub fn replace_gateway(&mut self, gateway: Option<G>) {
        self.teardown();
        self.gateway = gateway;
    }

    /// Create a room.
    pub fn create(&mut self) -> Result<(), ChatError> {
        let actions = self.chat.create()?;
        self.execute(actions);
        Ok(())
    }

    /// Join a room.
    pub fn join(&mut self, topic: &str) -> Result<(), ChatError> {
        let actions = self.chat.join(topic)?;
        self.execute(actions);
        Ok(())
    }

    /// Send a message.
    pub fn send(&mut self, text: &str) -> Result<(), ChatError> {
        let actions = self.chat.send(text)?;
        self.execute(actions);
        Ok(())
    }

    /// React to a message.
    pub fn react(&mut self, timestamp: &Timestamp, emoji: &str) -> Result<(), ChatError> {
        let actions = self.chat.react(timestamp, emoji)?;
        self.execute(actions);
        Ok(())
    }

    /// Dismiss the session error.
    pub fn clear_error(&mut self) {
        self.chat.clear_error();
    }

    /// Leave the current room.
    pub fn leave(&mut self) -> Result<Option<Topic>, ChatError> {
        self.chat.leave()
    }

    /// Wait for one completion or inbound event and apply it.
    ///
    /// Returns `false` if nothing is in flight and no subscription is open.
    pub async fn step(&mut self) -> bool {
        let event = tokio::select! {
            Some(event) = self.pending.next() => event,
            Some(event) = recv_inbound(&mut self.subscription) => event,
            else => return false,
        };
        self.apply(event);
        true
    }

    /// Apply everything that is ready or in flight.
    ///
    /// Buffered inbound events are applied first, then in-flight calls are
    /// awaited until none remain, including calls issued by the completions
    /// themselves. Does not wait for inbound events that have not arrived.
    pub async fn settle(&mut self) {
        loop {
            self.drain_inbound();
            let Some(event) = self.pending.next().await else {
                break;
            };
            self.apply(event);
        }
        self.drain_inbound();
    }

    /// Issue queued gateway calls and apply every completion that is
    /// already available, without waiting.
    pub fn flush(&mut self) {
        loop {
            self.drain_inbound();
            match self.pending.next().now_or_never() {
                Some(Some(event)) => self.apply(event),
                _ => break,
            }
        }
    }

    /// Run until `commands` closes or a [`Command::Shutdown`] arrives.
    ///
    /// A fresh [`ChatView`] is published after every command and event.
    pub async fn run(&mut self, mut commands: mpsc::Receiver<Command>, view: watch::Sender<ChatView>) {
        view.send_replace(self.view());

        loop {
            let next = tokio::select! {
                command = commands.recv() => command.map_or(Next::Closed, Next::Command),
                Some(event) = self.pending.next() => Next::Event(event),
                Some(event) = recv_inbound(&mut self.subscription) => Next::Event(event),
            };

            match next {
                Next::Command(Command::Shutdown) | Next::Closed => {
                    self.teardown();
                    view.send_replace(self.view());
                    break;
                },
                Next::Command(command) => {
                    if let Err(err) = self.dispatch(command) {
                        debug!(error = %err, transient = err.is_transient(), "Command rejected");
                    }
                },
                Next::Event(event) => self.apply(event),
            }

            view.send_replace(self.view());
        }
    }

    fn dispatch(&mut self, command: Command) -> Result<(), ChatError> {
        match command {
            Command::Initialize => self.initialize(),
            Command::Create => self.create(),
            Command::Join(topic) => self.join(&topic),
            Command::Send(text) => self.send(&text),
            Command::React { timestamp, emoji } => self.react(&timestamp, &emoji),
            Command::ClearError => {
                self.clear_error();
                Ok(())
            },
            Command::Leave => self.leave().map(|_| ()),
            Command::Shutdown => {
                self.teardown();
                Ok(())
            },
        }
    }

    fn apply(&mut self, event: ChatEvent) {
        let actions = self.chat.handle(event);
        self.execute(actions);
    }

    fn drain_inbound(&mut self) {
        while let Some((epoch, subscription)) = self.subscription.as_mut() {
            let Ok(event) = subscription.events.try_recv() else {
                break;
            };
            let epoch = *epoch;
            self.apply(ChatEvent::Inbound { epoch, event });
        }
    }

    fn execute(&mut self, actions: Vec<ChatAction>) {
        for action in actions {
            match action {
                ChatAction::Subscribe { epoch } => {
                    if let Some(gateway) = &self.gateway {
                        self.subscription = Some((epoch, gateway.subscribe()));
                    }
                },
                ChatAction::Unsubscribe => {
                    if let Some((_, subscription)) = self.subscription.take()
                        && let Some(gateway) = &self.gateway
                    {
                        gateway.unsubscribe(subscription.id);
                    }
                },
                ChatAction::Terminate => {
                    if let Some(gateway) = &self.gateway
                        && let Err(err) = gateway.terminate()
                    {
                        warn!(error = %err, "Gateway terminate failed");
                    }
                },
                ChatAction::PersistLastRoom(topic) => self.store.set(topic),
                ChatAction::Start { epoch, bundle } => self.spawn(
                    epoch,
                    ChatEvent::Started { epoch, result: Err(CALL_SKIPPED.to_owned()) },
                    move |gateway| {
                        async move {
                            let result = gateway.start(&bundle).await.map_err(|e| e.to_string());
                            ChatEvent::Started { epoch, result }
                        }
                        .boxed()
                    },
                ),
                ChatAction::CreateRoom { epoch } => self.spawn(
                    epoch,
                    ChatEvent::RoomCreated { epoch, result: Err(CALL_SKIPPED.to_owned()) },
                    move |gateway| {
                        async move {
                            let result = gateway.create_room().await.map_err(|e| e.to_string());
                            ChatEvent::RoomCreated { epoch, result }
                        }
                        .boxed()
                    },
                ),
                ChatAction::JoinRoom { epoch, topic, reconnect } => self.spawn(
                    epoch,
                    ChatEvent::Joined {
                        epoch,
                        requested: topic.clone(),
                        result: Err(CALL_SKIPPED.to_owned()),
                        reconnect,
                    },
                    move |gateway| {
                        async move {
                            let result =
                                gateway.join_room(&topic).await.map_err(|e| e.to_string());
                            ChatEvent::Joined { epoch, requested: topic, result, reconnect }
                        }
                        .boxed()
                    },
                ),
                ChatAction::SendMessage { epoch, timestamp, payload } => self.spawn(
                    epoch,
                    ChatEvent::MessageSent {
                        epoch,
                        timestamp: timestamp.clone(),
                        result: Err(CALL_SKIPPED.to_owned()),
                    },
                    move |gateway| {
                        async move {
                            let result =
                                gateway.send_message(payload).await.map_err(|e| e.to_string());
                            ChatEvent::MessageSent { epoch, timestamp, result }
                        }
                        .boxed()
                    },
                ),
                ChatAction::SendReaction { epoch, payload } => self.spawn(
                    epoch,
                    ChatEvent::ReactionSent { epoch, result: Err(CALL_SKIPPED.to_owned()) },
                    move |gateway| {
                        async move {
                            let result =
                                gateway.send_reaction(payload).await.map_err(|e| e.to_string());
                            ChatEvent::ReactionSent { epoch, result }
                        }
                        .boxed()
                    },
                ),
            }
        }
    }

    /// Queue `call` under `epoch`.
    ///
    /// The gateway is only reached if `epoch` is still live when the call is
    /// first polled; otherwise `skipped` is reported in its place.
    fn spawn(
        &mut self,
        epoch: Epoch,
        skipped: ChatEvent,
        call: impl FnOnce(G) -> BoxFuture<'static, ChatEvent> + Send + 'static,
    ) {
        let Some(gateway) = self.gateway.clone() else {
            debug!("No gateway; dropping call");
            return;
        };
        let live = self.live.subscribe();

        self.pending.push(
            async move {
                let current = *live.borrow();
                if current != Some(epoch) {
                    debug!(epoch = %epoch, "Skipping call queued under a closed epoch");
                    return skipped;
                }
                call(gateway).await
            }
            .boxed(),
        );
    }

    /// Snapshot for rendering.
    pub fn view(&self) -> ChatView {
        self.chat.view()
    }

    /// Chat state machine.
    pub fn chat(&self) -> &Chat<C> {
        &self.chat
    }

    /// Gateway handle, if any.
    pub fn gateway(&self) -> Option<&G> {
        self.gateway.as_ref()
    }

    /// Last-room store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Number of gateway calls still in flight.
    pub fn in_flight(&self) -> usize {
        self.pending.len()
    }

    /// True while an inbound subscription is registered.
    pub fn is_subscribed(&self) -> bool {
        self.subscription.is_some()
    }
}

async fn recv_inbound(subscription: &mut Option<(Epoch, Subscription)>) -> Option<ChatEvent> {
    let (epoch, subscription) = subscription.as_mut()?;
    let event = subscription.events.recv().await?;
    Some(ChatEvent::Inbound { epoch: *epoch, event })
}
