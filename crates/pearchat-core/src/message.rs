//! Chat messages and reactions.

use serde::{Deserialize, Serialize};

use crate::clock::Timestamp;

/// Sentinel author id used for messages and reactions from this client.
pub const LOCAL_AUTHOR: &str = "local";

/// Emoji offered by the reaction picker.
pub const DEFAULT_REACTIONS: [&str; 6] = ["👍", "❤️", "😂", "😮", "😢", "🙏"];

/// Who wrote a message or left a reaction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Author {
    /// This client.
    Local,
    /// A remote peer, by member id.
    Member(String),
}

impl Author {
    /// Member id, or [`LOCAL_AUTHOR`] for this client.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Local => LOCAL_AUTHOR,
            Self::Member(id) => id,
        }
    }
}

impl From<String> for Author {
    fn from(value: String) -> Self {
        if value == LOCAL_AUTHOR { Self::Local } else { Self::Member(value) }
    }
}

impl From<Author> for String {
    fn from(author: Author) -> Self {
        match author {
            Author::Local => LOCAL_AUTHOR.to_owned(),
            Author::Member(id) => id,
        }
    }
}

/// Where a message entered the ledger from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    /// Optimistic append by this client.
    Local,
    /// Delivered by the gateway.
    Remote,
}

/// One member's emoji on one message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reaction {
    /// Emoji glyph.
    pub emoji: String,
    /// Member who reacted.
    pub member: Author,
    /// When the reaction was recorded locally.
    pub timestamp: Timestamp,
}

/// A chat message in the ledger.
///
/// Everything except the reaction list is fixed at creation. Reactions are
/// only changed through [`crate::Ledger::merge_reaction`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    timestamp: Timestamp,
    author: Author,
    body: String,
    origin: Origin,
    reactions: Vec<Reaction>,
}

impl Message {
    pub(crate) fn new(timestamp: Timestamp, author: Author, body: String, origin: Origin) -> Self {
        Self { timestamp, author, body, origin, reactions: Vec::new() }
    }

    /// Creation instant; also the key reactions address the message by.
    pub fn timestamp(&self) -> &Timestamp {
        &self.timestamp
    }

    /// Author of the message.
    pub fn author(&self) -> &Author {
        &self.author
    }

    /// Message text.
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Local or remote.
    pub fn origin(&self) -> Origin {
        self.origin
    }

    /// True if this client wrote the message.
    pub fn is_local(&self) -> bool {
        self.origin == Origin::Local
    }

    /// Reactions in order of first reaction per member.
    pub fn reactions(&self) -> &[Reaction] {
        &self.reactions
    }

    /// Reaction left by `member`, if any.
    pub fn reaction_by(&self, member: &Author) -> Option<&Reaction> {
        self.reactions.iter().find(|r| &r.member == member)
    }

    /// Replace `member`'s reaction, keeping their slot in the list.
    ///
    /// A member reacting for the first time is appended at the end.
    pub(crate) fn set_reaction(&mut self, reaction: Reaction) {
        match self.reactions.iter_mut().find(|r| r.member == reaction.member) {
            Some(existing) => *existing = reaction,
            None => self.reactions.push(reaction),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reaction(emoji: &str, member: &str, at: &str) -> Reaction {
        Reaction {
            emoji: emoji.to_owned(),
            member: Author::from(member.to_owned()),
            timestamp: Timestamp::new(at),
        }
    }

    #[test]
    fn local_sentinel_round_trips_through_string() {
        assert_eq!(Author::from(LOCAL_AUTHOR.to_owned()), Author::Local);
        assert_eq!(String::from(Author::Local), LOCAL_AUTHOR);
        assert_eq!(Author::from("bob".to_owned()), Author::Member("bob".into()));
    }

    #[test]
    fn replacing_a_reaction_keeps_member_order() {
        let mut msg =
            Message::new(Timestamp::new("t0"), Author::Local, "hi".into(), Origin::Local);
        msg.set_reaction(reaction("👍", "alice", "t1"));
        msg.set_reaction(reaction("😂", "bob", "t2"));
        msg.set_reaction(reaction("❤️", "alice", "t3"));

        let members: Vec<_> = msg.reactions().iter().map(|r| r.member.as_str()).collect();
        assert_eq!(members, ["alice", "bob"]);
        assert_eq!(
            msg.reaction_by(&Author::Member("alice".into())).map(|r| r.emoji.as_str()),
            Some("❤️")
        );
    }

    #[test]
    fn serializes_author_as_plain_string() {
        let msg = Message::new(Timestamp::new("t0"), Author::Local, "hi".into(), Origin::Local);
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["author"], "local");
        assert_eq!(json["origin"], "local");
    }
}
