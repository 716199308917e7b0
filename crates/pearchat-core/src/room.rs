//! Room state machine.
//!
//! Tracks which room the user intends to be in, whether the gateway has
//! fulfilled that intent, and the last room that was successfully entered.
//!
//! # State Machine
//!
//! ```text
//! Idle ──create──> Creating ──topic──────> Active
//!   │                 └─────no topic─────> Failed
//!   └───join───> Joining ──confirmed─────> Active
//!                   └─────rejected───────> Failed
//! Active ──disconnect──> Failed
//! Active | Failed ──leave──> Idle
//! ```
//!
//! Only `Idle` and `Failed` accept a new user create or join. A request
//! while `Creating` or `Joining` is rejected, never queued. Reconnect joins
//! issued by the lifecycle manager may start from any settled phase.

use serde::{Deserialize, Serialize};

use crate::{
    error::RoomError,
    topic::{Topic, resolve_target_room},
};

/// Room phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RoomPhase {
    /// No room.
    Idle,
    /// Waiting for the gateway to create a room.
    Creating,
    /// Waiting for the gateway to confirm a join.
    Joining,
    /// In a room.
    Active,
    /// Last create, join or connection failed.
    Failed,
}

impl RoomPhase {
    /// True while a create or join is in flight.
    pub fn is_transitioning(self) -> bool {
        matches!(self, Self::Creating | Self::Joining)
    }
}

/// Connection state as shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConnectionState {
    /// Not connected to any room.
    Disconnected,
    /// Gateway start or room transition in progress.
    Connecting,
    /// In a room with a live gateway.
    Connected,
    /// Last start or room transition failed.
    Error,
}

/// Room state machine.
///
/// Pure state: no I/O, no clocks. Callers drive it with the outcome of
/// gateway calls.
#[derive(Debug, Clone)]
pub struct RoomMachine {
    phase: RoomPhase,
    connection: ConnectionState,
    current: Option<Topic>,
    last: Option<Topic>,
    /// Topic of the join in flight.
    pending: Option<Topic>,
}

impl Default for RoomMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl RoomMachine {
    /// Idle and disconnected, with no room history.
    pub fn new() -> Self {
        Self {
            phase: RoomPhase::Idle,
            connection: ConnectionState::Disconnected,
            current: None,
            last: None,
            pending: None,
        }
    }

    /// Seed the last room from persistent storage.
    pub fn restore_last_room(&mut self, topic: Option<Topic>) {
        self.last = topic;
    }

    /// Current phase.
    pub fn phase(&self) -> RoomPhase {
        self.phase
    }

    /// Current connection state.
    pub fn connection(&self) -> ConnectionState {
        self.connection
    }

    /// Room the user is in. `None` if no room.
    pub fn current(&self) -> Option<&Topic> {
        self.current.as_ref()
    }

    /// Most recent room successfully created or joined.
    pub fn last(&self) -> Option<&Topic> {
        self.last.as_ref()
    }

    /// Topic of the join in flight. `None` unless `Joining`.
    pub fn pending(&self) -> Option<&Topic> {
        self.pending.as_ref()
    }

    /// Room to rejoin after the gateway starts.
    pub fn reconnect_target(&self) -> Option<Topic> {
        resolve_target_room(self.current.as_ref(), self.last.as_ref())
    }

    /// Start a user-requested room creation.
    pub fn begin_create(&mut self) -> Result<(), RoomError> {
        self.check_accepts_request()?;
        self.phase = RoomPhase::Creating;
        self.connection = ConnectionState::Connecting;
        Ok(())
    }

    /// Start a user-requested join.
    pub fn begin_join(&mut self, topic: Topic) -> Result<(), RoomError> {
        self.check_accepts_request()?;
        self.enter_joining(topic);
        Ok(())
    }

    /// Start a reconnect join on behalf of the lifecycle manager.
    ///
    /// Unlike [`Self::begin_join`] this is accepted from `Active`, since the
    /// room the user was in is exactly what gets rejoined.
    pub fn begin_rejoin(&mut self, topic: Topic) -> Result<(), RoomError> {
        if self.phase.is_transitioning() {
            return Err(RoomError::Busy { phase: self.phase });
        }
        self.enter_joining(topic);
        Ok(())
    }

    /// Gateway created a room.
    pub fn create_succeeded(&mut self, topic: Topic) -> Result<(), RoomError> {
        self.expect_phase(RoomPhase::Creating)?;
        self.activate(topic);
        Ok(())
    }

    /// Gateway returned no topic or failed to create.
    pub fn create_failed(&mut self) -> Result<(), RoomError> {
        self.expect_phase(RoomPhase::Creating)?;
        self.phase = RoomPhase::Failed;
        self.connection = ConnectionState::Error;
        Ok(())
    }

    /// Gateway confirmed the join in flight. Returns the joined topic.
    pub fn join_succeeded(&mut self) -> Result<Topic, RoomError> {
        self.expect_phase(RoomPhase::Joining)?;
        let topic = self.pending.take().ok_or(RoomError::Unexpected { phase: self.phase })?;
        self.activate(topic.clone());
        Ok(topic)
    }

    /// Gateway rejected the join in flight. Returns the attempted topic.
    ///
    /// The current room is cleared. The last room is cleared only if it is
    /// the topic that just failed, so a dead room is not retried forever.
    pub fn join_failed(&mut self) -> Result<Topic, RoomError> {
        self.expect_phase(RoomPhase::Joining)?;
        let topic = self.pending.take().ok_or(RoomError::Unexpected { phase: self.phase })?;
        self.phase = RoomPhase::Failed;
        self.connection = ConnectionState::Error;
        self.current = None;
        if self.last.as_ref() == Some(&topic) {
            self.last = None;
        }
        Ok(topic)
    }

    /// Gateway dropped the active room.
    pub fn disconnected(&mut self) -> Result<(), RoomError> {
        self.expect_phase(RoomPhase::Active).map_err(|_| RoomError::NotActive)?;
        self.phase = RoomPhase::Failed;
        self.connection = ConnectionState::Disconnected;
        Ok(())
    }

    /// Leave the current room. Returns the room that was left, if any.
    ///
    /// The last room is kept so it can be rejoined on the next start.
    pub fn leave(&mut self) -> Result<Option<Topic>, RoomError> {
        match self.phase {
            RoomPhase::Creating | RoomPhase::Joining => Err(RoomError::Busy { phase: self.phase }),
            RoomPhase::Idle => Err(RoomError::NotActive),
            RoomPhase::Active | RoomPhase::Failed => {
                self.phase = RoomPhase::Idle;
                self.connection = ConnectionState::Disconnected;
                Ok(self.current.take())
            },
        }
    }

    /// Gateway start began.
    pub fn gateway_starting(&mut self) {
        self.connection = ConnectionState::Connecting;
    }

    /// Gateway is up and there is no room to rejoin.
    pub fn gateway_idle(&mut self) {
        if !self.phase.is_transitioning() {
            self.connection = ConnectionState::Disconnected;
        }
    }

    /// Gateway failed to start.
    pub fn gateway_failed(&mut self) {
        self.connection = ConnectionState::Error;
    }

    /// Gateway torn down.
    ///
    /// Any transition in flight is abandoned: its completion will never be
    /// applied. The current room survives so it can be rejoined later.
    pub fn suspend(&mut self) {
        if self.phase.is_transitioning() {
            self.pending = None;
            self.phase = if self.current.is_some() { RoomPhase::Active } else { RoomPhase::Idle };
        }
        self.connection = ConnectionState::Disconnected;
    }

    fn enter_joining(&mut self, topic: Topic) {
        self.phase = RoomPhase::Joining;
        self.connection = ConnectionState::Connecting;
        self.pending = Some(topic);
    }

    fn activate(&mut self, topic: Topic) {
        self.phase = RoomPhase::Active;
        self.connection = ConnectionState::Connected;
        self.current = Some(topic.clone());
        self.last = Some(topic);
    }

    fn check_accepts_request(&self) -> Result<(), RoomError> {
        match self.phase {
            RoomPhase::Idle | RoomPhase::Failed => Ok(()),
            RoomPhase::Creating | RoomPhase::Joining => Err(RoomError::Busy { phase: self.phase }),
            RoomPhase::Active => Err(RoomError::AlreadyActive {
                topic: self.current.as_ref().map(ToString::to_string).unwrap_or_default(),
            }),
        }
    }

    fn expect_phase(&self, expected: RoomPhase) -> Result<(), RoomError> {
        if self.phase == expected {
            Ok(())
        } else {
            Err(RoomError::Unexpected { phase: self.phase })
        }
    }
}
