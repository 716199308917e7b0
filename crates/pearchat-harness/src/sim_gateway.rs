//! Simulated gateway implementing the Gateway trait.
//!
//! `SimGateway` stands in for the peer-to-peer backend. It implements
//! [`Gateway`] so the same [`pearchat_app::ConnectionManager`] code runs in
//! production and in tests, and adds the knobs tests need:
//!
//! - a call log of every gateway operation, in issue order
//! - queued failures per operation
//! - gates that hold a call in flight until the test releases it
//! - seeded room topic generation
//! - event injection into every open subscription

#![allow(clippy::disallowed_types, reason = "Synchronous locking operations only")]

use std::{
    collections::{HashMap, HashSet, VecDeque},
    future::Future,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use arbitrary::Arbitrary;
use pearchat_app::{Bundle, Capabilities, Gateway, GatewayEvent, Subscription, SubscriptionId};
use pearchat_core::{ReactionPayload, Topic, WireMessage};
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tokio::sync::{mpsc, oneshot};

/// Error type for the simulated gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimGatewayError(pub String);

impl std::fmt::Display for SimGatewayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SimGatewayError: {}", self.0)
    }
}

impl std::error::Error for SimGatewayError {}

/// Asynchronous gateway operation, for failure scripting and gating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Arbitrary)]
pub enum Op {
    /// `start`
    Start,
    /// `create_room`
    CreateRoom,
    /// `join_room`
    JoinRoom,
    /// `send_message`
    SendMessage,
    /// `send_reaction`
    SendReaction,
}

/// Recorded gateway call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayCall {
    /// `start(bundle)`
    Start(String),
    /// `terminate()`
    Terminate,
    /// `create_room()`
    CreateRoom,
    /// `join_room(topic)`
    JoinRoom(Topic),
    /// `send_message(payload)`
    SendMessage(String),
    /// `send_reaction(payload)`
    SendReaction(ReactionPayload),
    /// `subscribe()`
    Subscribe(SubscriptionId),
    /// `unsubscribe(id)`
    Unsubscribe(SubscriptionId),
}

/// Holds one gated call in flight until released or dropped.
#[derive(Debug)]
pub struct Gate {
    release: Option<oneshot::Sender<()>>,
}

impl Gate {
    /// Let the held call complete.
    pub fn release(mut self) {
        if let Some(tx) = self.release.take() {
            let _ = tx.send(());
        }
    }
}

struct Inner {
    rng: ChaCha8Rng,
    calls: Vec<GatewayCall>,
    failures: HashMap<Op, VecDeque<String>>,
    gates: HashMap<Op, VecDeque<oneshot::Receiver<()>>>,
    empty_creates: usize,
    terminate_failure: Option<String>,
    rooms: HashSet<Topic>,
    subscribers: HashMap<SubscriptionId, mpsc::UnboundedSender<GatewayEvent>>,
    next_subscription: u64,
    capabilities: Capabilities,
    running: bool,
}

impl Inner {
    fn take_failure(&mut self, op: Op) -> Option<SimGatewayError> {
        self.failures.get_mut(&op).and_then(VecDeque::pop_front).map(SimGatewayError)
    }

    fn generate_topic(&mut self) -> Result<Topic, SimGatewayError> {
        let mut bytes = [0u8; 32];
        self.rng.fill_bytes(&mut bytes);
        Topic::parse(&hex::encode(bytes)).map_err(|e| SimGatewayError(e.to_string()))
    }
}

/// Simulated backend for deterministic testing.
///
/// Clones share state, so a test can keep one handle for scripting and
/// inspection while the manager owns another.
#[derive(Clone)]
pub struct SimGateway {
    inner: Arc<Mutex<Inner>>,
}

impl SimGateway {
    /// Create a gateway whose room topics derive from `seed`.
    pub fn new(seed: u64) -> Self {
        let inner = Inner {
            rng: ChaCha8Rng::seed_from_u64(seed),
            calls: Vec::new(),
            failures: HashMap::new(),
            gates: HashMap::new(),
            empty_creates: 0,
            terminate_failure: None,
            rooms: HashSet::new(),
            subscribers: HashMap::new(),
            next_subscription: 0,
            capabilities: Capabilities::empty(),
            running: false,
        };
        Self { inner: Arc::new(Mutex::new(inner)) }
    }

    /// Advertise `capabilities`.
    #[must_use]
    pub fn with_capabilities(self, capabilities: Capabilities) -> Self {
        self.lock().capabilities = capabilities;
        self
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make `topic` joinable.
    pub fn add_room(&self, topic: Topic) {
        self.lock().rooms.insert(topic);
    }

    /// Make the next call of `op` fail with `reason`.
    ///
    /// Failures queue up; each call consumes one.
    pub fn fail_next(&self, op: Op, reason: impl Into<String>) {
        self.lock().failures.entry(op).or_default().push_back(reason.into());
    }

    /// Make the next `create_room` succeed without producing a topic.
    pub fn create_returns_nothing(&self) {
        self.lock().empty_creates += 1;
    }

    /// Make the next `terminate` fail with `reason`.
    pub fn fail_terminate(&self, reason: impl Into<String>) {
        self.lock().terminate_failure = Some(reason.into());
    }

    /// Hold the next call of `op` in flight until the returned gate is
    /// released or dropped.
    pub fn hold(&self, op: Op) -> Gate {
        let (tx, rx) = oneshot::channel();
        self.lock().gates.entry(op).or_default().push_back(rx);
        Gate { release: Some(tx) }
    }

    /// All calls so far, in issue order.
    pub fn calls(&self) -> Vec<GatewayCall> {
        self.lock().calls.clone()
    }

    /// Number of recorded calls matching `pred`.
    pub fn count(&self, pred: impl Fn(&GatewayCall) -> bool) -> usize {
        self.lock().calls.iter().filter(|call| pred(call)).count()
    }

    /// Number of open subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }

    /// True between a successful `start` and `terminate`.
    pub fn is_running(&self) -> bool {
        self.lock().running
    }

    /// Rooms that `join_room` accepts.
    pub fn rooms(&self) -> Vec<Topic> {
        let mut rooms: Vec<_> = self.lock().rooms.iter().cloned().collect();
        rooms.sort();
        rooms
    }

    /// Push `event` to every open subscription.
    pub fn inject(&self, event: GatewayEvent) {
        let inner = self.lock();
        for tx in inner.subscribers.values() {
            let _ = tx.send(event.clone());
        }
    }

    /// Deliver a message from `member_id`.
    pub fn inject_message(&self, member_id: &str, message: WireMessage) {
        self.inject(GatewayEvent::MessageReceived { member_id: member_id.to_owned(), message });
    }

    /// Deliver a reaction from `member_id`.
    pub fn inject_reaction(&self, member_id: &str, reaction: ReactionPayload) {
        self.inject(GatewayEvent::ReactionReceived { member_id: member_id.to_owned(), reaction });
    }

    /// Report a new peer count.
    pub fn inject_peer_count(&self, count: usize) {
        self.inject(GatewayEvent::PeerCountChanged(count));
    }

    /// Report that the current room was lost.
    pub fn inject_disconnect(&self, reason: &str) {
        self.inject(GatewayEvent::Disconnected { reason: reason.to_owned() });
    }

    /// Record `call`, then complete it once its gate (if any) opens.
    ///
    /// Queued failures are consulted at completion time, so a failure
    /// scripted while a gated call is in flight still applies to it.
    fn call<T, F>(
        &self,
        op: Op,
        call: GatewayCall,
        complete: F,
    ) -> impl Future<Output = Result<T, SimGatewayError>> + Send + 'static
    where
        T: Send + 'static,
        F: FnOnce(&mut Inner) -> Result<T, SimGatewayError> + Send + 'static,
    {
        let gate = {
            let mut inner = self.lock();
            inner.calls.push(call);
            inner.gates.get_mut(&op).and_then(VecDeque::pop_front)
        };
        let shared = Arc::clone(&self.inner);

        async move {
            if let Some(gate) = gate {
                let _ = gate.await;
            }
            let mut inner = shared.lock().unwrap_or_else(PoisonError::into_inner);
            match inner.take_failure(op) {
                Some(err) => Err(err),
                None => complete(&mut inner),
            }
        }
    }
}

impl Gateway for SimGateway {
    type Error = SimGatewayError;

    fn start(&self, bundle: &Bundle) -> impl Future<Output = Result<(), Self::Error>> + Send {
        self.call(Op::Start, GatewayCall::Start(bundle.to_string()), |inner| {
            inner.running = true;
            Ok(())
        })
    }

    fn terminate(&self) -> Result<(), Self::Error> {
        let mut inner = self.lock();
        inner.calls.push(GatewayCall::Terminate);
        inner.running = false;
        match inner.terminate_failure.take() {
            Some(reason) => Err(SimGatewayError(reason)),
            None => Ok(()),
        }
    }

    fn create_room(&self) -> impl Future<Output = Result<Option<Topic>, Self::Error>> + Send {
        self.call(Op::CreateRoom, GatewayCall::CreateRoom, |inner| {
            if inner.empty_creates > 0 {
                inner.empty_creates -= 1;
                return Ok(None);
            }
            let topic = inner.generate_topic()?;
            inner.rooms.insert(topic.clone());
            Ok(Some(topic))
        })
    }

    fn join_room(&self, topic: &Topic) -> impl Future<Output = Result<Topic, Self::Error>> + Send {
        let topic = topic.clone();
        self.call(Op::JoinRoom, GatewayCall::JoinRoom(topic.clone()), move |inner| {
            if inner.rooms.contains(&topic) {
                Ok(topic)
            } else {
                Err(SimGatewayError(format!("room {topic} not found")))
            }
        })
    }

    fn send_message(&self, payload: String) -> impl Future<Output = Result<(), Self::Error>> + Send {
        self.call(Op::SendMessage, GatewayCall::SendMessage(payload), |_| Ok(()))
    }

    fn capabilities(&self) -> Capabilities {
        self.lock().capabilities
    }

    fn send_reaction(
        &self,
        payload: ReactionPayload,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send {
        self.call(Op::SendReaction, GatewayCall::SendReaction(payload), |_| Ok(()))
    }

    fn subscribe(&self) -> Subscription {
        let (tx, events) = mpsc::unbounded_channel();
        let mut inner = self.lock();
        inner.next_subscription += 1;
        let id = SubscriptionId(inner.next_subscription);
        inner.subscribers.insert(id, tx);
        inner.calls.push(GatewayCall::Subscribe(id));
        Subscription { id, events }
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        let mut inner = self.lock();
        inner.subscribers.remove(&id);
        inner.calls.push(GatewayCall::Unsubscribe(id));
    }
}
