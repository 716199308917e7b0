//! Standard invariant checks.

use std::collections::HashSet;

use pearchat_core::{ConnectionState, RoomPhase};

use super::{Invariant, InvariantResult, SessionSnapshot, Violation};

/// A `Connected` indicator always names a room.
pub struct ConnectedHasRoom;

impl Invariant for ConnectedHasRoom {
    fn name(&self) -> &'static str {
        "connected_has_room"
    }

    fn check(&self, state: &SessionSnapshot) -> InvariantResult {
        if state.view.connection == ConnectionState::Connected && state.view.current_room.is_none()
        {
            return Err(Violation {
                invariant: self.name(),
                message: format!("connected in phase {:?} with no current room", state.view.phase),
            });
        }
        Ok(())
    }
}

/// An `Active` room phase always names a room.
pub struct ActiveHasRoom;

impl Invariant for ActiveHasRoom {
    fn name(&self) -> &'static str {
        "active_has_room"
    }

    fn check(&self, state: &SessionSnapshot) -> InvariantResult {
        if state.view.phase == RoomPhase::Active && state.view.current_room.is_none() {
            return Err(Violation {
                invariant: self.name(),
                message: "phase Active with no current room".to_owned(),
            });
        }
        Ok(())
    }
}

/// The loading flag is set exactly while a create or join is in flight.
pub struct LoadingMatchesTransition;

impl Invariant for LoadingMatchesTransition {
    fn name(&self) -> &'static str {
        "loading_matches_transition"
    }

    fn check(&self, state: &SessionSnapshot) -> InvariantResult {
        let transitioning = matches!(state.view.phase, RoomPhase::Creating | RoomPhase::Joining);
        if state.view.loading != transitioning {
            return Err(Violation {
                invariant: self.name(),
                message: format!(
                    "loading={} in phase {:?}",
                    state.view.loading, state.view.phase
                ),
            });
        }
        Ok(())
    }
}

/// No message carries two reactions from the same member.
pub struct OneReactionPerMember;

impl Invariant for OneReactionPerMember {
    fn name(&self) -> &'static str {
        "one_reaction_per_member"
    }

    fn check(&self, state: &SessionSnapshot) -> InvariantResult {
        for row in &state.view.messages {
            let mut seen = HashSet::new();
            for reaction in row.message.reactions() {
                if !seen.insert(&reaction.member) {
                    return Err(Violation {
                        invariant: self.name(),
                        message: format!(
                            "message {} has two reactions from {}",
                            row.key,
                            reaction.member.as_str()
                        ),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Every rendered row has a distinct list key.
pub struct UniqueMessageKeys;

impl Invariant for UniqueMessageKeys {
    fn name(&self) -> &'static str {
        "unique_message_keys"
    }

    fn check(&self, state: &SessionSnapshot) -> InvariantResult {
        let mut seen = HashSet::new();
        for row in &state.view.messages {
            if !seen.insert(row.key.as_str()) {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!("duplicate list key {}", row.key),
                });
            }
        }
        Ok(())
    }
}

/// The store holds exactly the last room the session remembers.
pub struct LastRoomPersisted;

impl Invariant for LastRoomPersisted {
    fn name(&self) -> &'static str {
        "last_room_persisted"
    }

    fn check(&self, state: &SessionSnapshot) -> InvariantResult {
        let Some(stored) = &state.stored_last_room else {
            return Ok(());
        };
        if stored != &state.view.last_room {
            return Err(Violation {
                invariant: self.name(),
                message: format!(
                    "store holds {:?}, session remembers {:?}",
                    stored.as_ref().map(|t| t.as_str()),
                    state.view.last_room.as_ref().map(|t| t.as_str())
                ),
            });
        }
        Ok(())
    }
}

/// An inbound subscription is open exactly while a gateway is mounted.
pub struct SubscriptionFollowsMount;

impl Invariant for SubscriptionFollowsMount {
    fn name(&self) -> &'static str {
        "subscription_follows_mount"
    }

    fn check(&self, state: &SessionSnapshot) -> InvariantResult {
        let Some(subscribed) = state.subscribed else {
            return Ok(());
        };
        let mounted = state.epoch.is_some() && state.has_gateway;
        if subscribed != mounted {
            return Err(Violation {
                invariant: self.name(),
                message: format!("subscribed={subscribed} while mounted={mounted}"),
            });
        }
        Ok(())
    }
}
