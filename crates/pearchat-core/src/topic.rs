//! Room identity.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Validated room topic.
///
/// Opaque to this crate. The only guarantee is that the inner string is
/// non-empty and carries no surrounding whitespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Topic(String);

impl Topic {
    /// Validate and trim a user-supplied topic.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptyTopic);
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Topic as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Header title: the topic with its first character upper-cased.
    pub fn title(&self) -> String {
        let mut chars = self.0.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Topic {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Topic> for String {
    fn from(topic: Topic) -> Self {
        topic.0
    }
}

/// Room the lifecycle manager should rejoin after the gateway starts.
///
/// The current room takes precedence over the remembered last room; with
/// neither set there is nothing to rejoin.
pub fn resolve_target_room(current: Option<&Topic>, last: Option<&Topic>) -> Option<Topic> {
    current.or(last).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topic(s: &str) -> Topic {
        Topic::parse(s).unwrap()
    }

    #[test]
    fn parse_trims_whitespace() {
        assert_eq!(topic("  abc123 \n").as_str(), "abc123");
    }

    #[test]
    fn parse_rejects_blank() {
        assert_eq!(Topic::parse(""), Err(ValidationError::EmptyTopic));
        assert_eq!(Topic::parse(" \t "), Err(ValidationError::EmptyTopic));
    }

    #[test]
    fn title_capitalises_first_char() {
        assert_eq!(topic("lobby").title(), "Lobby");
        assert_eq!(topic("éclair").title(), "Éclair");
        assert_eq!(topic("42abc").title(), "42abc");
    }

    #[test]
    fn current_room_wins_over_last() {
        let current = topic("current");
        let last = topic("last");

        assert_eq!(resolve_target_room(Some(&current), Some(&last)), Some(current.clone()));
        assert_eq!(resolve_target_room(None, Some(&last)), Some(last));
        assert_eq!(resolve_target_room(Some(&current), None), Some(current));
        assert_eq!(resolve_target_room(None, None), None);
    }

    #[test]
    fn deserialize_validates() {
        let ok: Topic = serde_json::from_str("\" room-x \"").unwrap();
        assert_eq!(ok.as_str(), "room-x");
        assert!(serde_json::from_str::<Topic>("\"   \"").is_err());
    }
}
