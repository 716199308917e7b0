//! Invariant checking for simulated chat sessions.
//!
//! Invariants are properties that must hold after every step of a session,
//! whatever order intents, completions and inbound events arrive in.
//!
//! # Architecture
//!
//! The observable state of a [`pearchat_app::ConnectionManager`] is captured
//! into a [`SessionSnapshot`], then every registered [`Invariant`] is run
//! against it.
//!
//! # Usage
//!
//! ```ignore
//! let registry = InvariantRegistry::standard();
//! let snapshot = SessionSnapshot::of(&manager);
//! registry.check_all(&snapshot)?;
//! ```

mod checks;
mod snapshot;

pub use checks::{
    ActiveHasRoom, ConnectedHasRoom, LastRoomPersisted, LoadingMatchesTransition,
    OneReactionPerMember, SubscriptionFollowsMount, UniqueMessageKeys,
};
pub use snapshot::SessionSnapshot;

/// Invariant check result.
pub type InvariantResult = Result<(), Violation>;

/// Invariant violation with context.
#[derive(Debug, Clone)]
pub struct Violation {
    /// Name of the violated invariant.
    pub invariant: &'static str,
    /// Description of what went wrong.
    pub message: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.invariant, self.message)
    }
}

impl std::error::Error for Violation {}

/// An invariant that can be checked against a session snapshot.
pub trait Invariant: Send + Sync {
    /// Invariant name for error reporting.
    fn name(&self) -> &'static str;

    /// Check the invariant against the current state.
    fn check(&self, state: &SessionSnapshot) -> InvariantResult;
}

/// Registry of invariants to check.
pub struct InvariantRegistry {
    invariants: Vec<Box<dyn Invariant>>,
}

impl Default for InvariantRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl InvariantRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self { invariants: Vec::new() }
    }

    /// Create a registry with every standard session invariant.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.add(ConnectedHasRoom);
        registry.add(ActiveHasRoom);
        registry.add(LoadingMatchesTransition);
        registry.add(OneReactionPerMember);
        registry.add(UniqueMessageKeys);
        registry.add(LastRoomPersisted);
        registry.add(SubscriptionFollowsMount);
        registry
    }

    /// Add an invariant to the registry.
    pub fn add<I: Invariant + 'static>(&mut self, invariant: I) {
        self.invariants.push(Box::new(invariant));
    }

    /// Check all invariants against the given state.
    ///
    /// Returns `Ok(())` if all invariants hold, or all violations found.
    pub fn check_all(&self, state: &SessionSnapshot) -> Result<(), Vec<Violation>> {
        let violations: Vec<_> =
            self.invariants.iter().filter_map(|inv| inv.check(state).err()).collect();

        if violations.is_empty() { Ok(()) } else { Err(violations) }
    }

    /// Check all invariants, panicking on violation.
    #[allow(clippy::panic, reason = "Test assertion helper")]
    pub fn assert_all(&self, state: &SessionSnapshot, context: &str) {
        if let Err(violations) = self.check_all(state) {
            let messages: Vec<_> = violations.iter().map(ToString::to_string).collect();
            panic!("Invariant violation {context}:\n  {}", messages.join("\n  "));
        }
    }

    /// Number of registered invariants.
    pub fn len(&self) -> usize {
        self.invariants.len()
    }

    /// Check if registry is empty.
    pub fn is_empty(&self) -> bool {
        self.invariants.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use pearchat_app::{Chat, ChatConfig};
    use pearchat_core::ManualClock;

    use super::*;

    #[test]
    fn standard_registry_has_invariants() {
        let registry = InvariantRegistry::standard();
        assert_eq!(registry.len(), 7);
    }

    #[test]
    fn fresh_chat_passes_invariants() {
        let chat = Chat::new(ChatConfig::default(), ManualClock::at_epoch());
        let snapshot = SessionSnapshot::from_chat(&chat);
        assert!(InvariantRegistry::standard().check_all(&snapshot).is_ok());
    }
}
