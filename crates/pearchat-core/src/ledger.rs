//! Message and reaction store.
//!
//! The [`Ledger`] is the ordered record of everything shown in the chat
//! view. Display order is append order: local optimistic writes and remote
//! deliveries are not re-sorted by timestamp, because their stamps come from
//! different clocks and need not increase in arrival order.
//!
//! # Invariants
//!
//! - Messages are never removed individually; [`Ledger::clear`] drops all.
//! - Each message holds at most one reaction per member.
//! - Appending never overwrites an earlier message, even with an equal
//!   timestamp. Lookups by timestamp resolve to the earliest match.

use tracing::debug;

use crate::{
    clock::{Clock, Stamper, SystemClock, Timestamp},
    message::{Author, Message, Origin, Reaction},
};

/// Append-ordered message ledger.
#[derive(Debug, Clone)]
pub struct Ledger<C: Clock = SystemClock> {
    messages: Vec<Message>,
    stamper: Stamper<C>,
}

impl Default for Ledger<SystemClock> {
    fn default() -> Self {
        Self::new(SystemClock)
    }
}

impl<C: Clock> Ledger<C> {
    /// Create an empty ledger stamping with `clock`.
    pub fn new(clock: C) -> Self {
        Self { messages: Vec::new(), stamper: Stamper::new(clock) }
    }

    /// Append a message written by this client.
    ///
    /// Returns `None` without touching the ledger if `body` is blank.
    pub fn append_local(&mut self, body: &str) -> Option<&Message> {
        if body.trim().is_empty() {
            return None;
        }
        let timestamp = self.stamper.stamp();
        self.push(Message::new(timestamp, Author::Local, body.to_owned(), Origin::Local))
    }

    /// Append a message delivered by the gateway, stamped on arrival.
    ///
    /// Returns `None` without touching the ledger if `body` is blank.
    pub fn append_remote(&mut self, author: Author, body: &str) -> Option<&Message> {
        if body.trim().is_empty() {
            return None;
        }
        let timestamp = self.stamper.stamp();
        self.push(Message::new(timestamp, author, body.to_owned(), Origin::Remote))
    }

    /// Append a message delivered by the gateway, keeping the sender's stamp.
    ///
    /// Peers address reactions by the sender's stamp, so it must survive
    /// unchanged. Returns `None` if `body` is blank.
    pub fn append_remote_at(
        &mut self,
        author: Author,
        body: &str,
        timestamp: Timestamp,
    ) -> Option<&Message> {
        if body.trim().is_empty() {
            return None;
        }
        self.push(Message::new(timestamp, author, body.to_owned(), Origin::Remote))
    }

    /// Record `member`'s reaction on the message stamped `message_timestamp`.
    ///
    /// Last write wins per (message, member): an earlier reaction by the same
    /// member is replaced in place. Returns `false` if no message carries the
    /// stamp; the event is stale or refers to a message this client never saw.
    pub fn merge_reaction(
        &mut self,
        message_timestamp: &Timestamp,
        emoji: &str,
        member: Author,
    ) -> bool {
        let Some(message) = self.messages.iter_mut().find(|m| m.timestamp() == message_timestamp)
        else {
            debug!(timestamp = %message_timestamp, member = member.as_str(), "Reaction for unknown message");
            return false;
        };
        let stamp = self.stamper.stamp();

        message.set_reaction(Reaction { emoji: emoji.to_owned(), member, timestamp: stamp });
        true
    }

    /// Drop every message.
    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// Messages in display order.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// First message stamped `timestamp`.
    pub fn find(&self, timestamp: &Timestamp) -> Option<&Message> {
        self.messages.iter().find(|m| m.timestamp() == timestamp)
    }

    /// Messages paired with list keys unique even across equal stamps.
    pub fn keyed(&self) -> impl Iterator<Item = (String, &Message)> {
        self.messages.iter().enumerate().map(|(i, m)| (format!("{}-{i}", m.timestamp()), m))
    }

    /// Number of messages.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// True if the ledger holds no messages.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    fn push(&mut self, message: Message) -> Option<&Message> {
        self.messages.push(message);
        self.messages.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn ledger() -> Ledger<ManualClock> {
        Ledger::new(ManualClock::at_epoch())
    }

    fn member(id: &str) -> Author {
        Author::Member(id.to_owned())
    }

    #[test]
    fn append_local_adds_one_local_message() {
        let mut ledger = ledger();
        let msg = ledger.append_local("hello").cloned().unwrap();

        assert_eq!(ledger.len(), 1);
        assert_eq!(msg.origin(), Origin::Local);
        assert_eq!(msg.author(), &Author::Local);
        assert_eq!(msg.body(), "hello");
        assert!(msg.reactions().is_empty());
    }

    #[test]
    fn blank_bodies_are_ignored() {
        let mut ledger = ledger();
        assert!(ledger.append_local("").is_none());
        assert!(ledger.append_local("   \n\t").is_none());
        assert!(ledger.append_remote(member("bob"), " ").is_none());
        assert!(ledger.append_remote_at(member("bob"), "", Timestamp::new("t")).is_none());
        assert!(ledger.is_empty());
    }

    #[test]
    fn append_remote_records_author() {
        let mut ledger = ledger();
        let msg = ledger.append_remote(member("bob"), "hi").cloned().unwrap();

        assert_eq!(msg.origin(), Origin::Remote);
        assert_eq!(msg.author(), &member("bob"));
    }

    #[test]
    fn two_members_give_two_reactions() {
        let mut ledger = ledger();
        let ts = ledger.append_local("hello").unwrap().timestamp().clone();

        assert!(ledger.merge_reaction(&ts, "👍", member("alice")));
        assert!(ledger.merge_reaction(&ts, "😂", member("bob")));

        assert_eq!(ledger.find(&ts).unwrap().reactions().len(), 2);
    }

    #[test]
    fn same_member_twice_replaces() {
        let mut ledger = ledger();
        let ts = ledger.append_local("hello").unwrap().timestamp().clone();

        ledger.merge_reaction(&ts, "👍", Author::Local);
        ledger.merge_reaction(&ts, "❤️", Author::Local);

        let reactions = ledger.find(&ts).unwrap().reactions();
        assert_eq!(reactions.len(), 1);
        assert_eq!(reactions[0].emoji, "❤️");
    }

    #[test]
    fn reaction_to_unknown_message_is_dropped() {
        let mut ledger = ledger();
        ledger.append_local("hello");

        assert!(!ledger.merge_reaction(&Timestamp::new("nope"), "👍", Author::Local));
        assert!(ledger.messages()[0].reactions().is_empty());
    }

    #[test]
    fn missed_reaction_does_not_advance_stamps() {
        let mut ledger = ledger();
        ledger.append_local("first");

        assert!(!ledger.merge_reaction(&Timestamp::new("nope"), "👍", Author::Local));
        let second = ledger.append_local("second").unwrap();

        assert_eq!(second.timestamp().as_str(), "1970-01-01T00:00:00.001Z");
    }

    #[test]
    fn equal_stamps_never_overwrite() {
        let mut ledger = ledger();
        let ts = Timestamp::new("2024-05-01T12:00:00.000Z");
        ledger.append_remote_at(member("alice"), "first", ts.clone());
        ledger.append_remote_at(member("bob"), "second", ts.clone());

        assert_eq!(ledger.len(), 2);
        assert!(ledger.merge_reaction(&ts, "👍", Author::Local));
        assert_eq!(ledger.messages()[0].reactions().len(), 1);
        assert!(ledger.messages()[1].reactions().is_empty());

        let keys: Vec<_> = ledger.keyed().map(|(k, _)| k).collect();
        assert_eq!(keys, ["2024-05-01T12:00:00.000Z-0", "2024-05-01T12:00:00.000Z-1"]);
    }

    #[test]
    fn keeps_arrival_order_over_timestamp_order() {
        let mut ledger = ledger();
        ledger.append_remote_at(member("bob"), "late", Timestamp::new("2030-01-01T00:00:00.000Z"));
        ledger.append_local("now");

        let bodies: Vec<_> = ledger.messages().iter().map(Message::body).collect();
        assert_eq!(bodies, ["late", "now"]);
    }

    #[test]
    fn clear_empties_everything() {
        let mut ledger = ledger();
        ledger.append_local("a");
        ledger.append_remote(member("bob"), "b");
        ledger.clear();
        assert!(ledger.is_empty());
    }
}
