//! Payloads exchanged with the gateway.
//!
//! The gateway moves opaque strings between peers. These types fix the JSON
//! shape this client writes and accepts:
//!
//! ```json
//! { "timestamp": "2024-05-01T12:00:00.000Z", "message": "hi", "local": true, "type": "text" }
//! { "messageTimestamp": "2024-05-01T12:00:00.000Z", "reaction": "👍" }
//! ```

use serde::{Deserialize, Serialize};

use crate::{clock::Timestamp, error::WireError, message::Message};

/// Message content type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MessageKind {
    /// Plain text.
    #[default]
    Text,
}

impl MessageKind {
    /// Wire name of the kind.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
        }
    }
}

/// Serialized chat message handed to and received from the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireMessage {
    /// Sender-side creation instant. Missing on payloads from older peers.
    pub timestamp: Option<Timestamp>,
    /// Message text.
    pub message: String,
    /// Sender's own view of the message (always true when sent).
    pub local: bool,
    /// Content type.
    pub kind: MessageKind,
}

#[derive(Serialize, Deserialize)]
struct RawWireMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    timestamp: Option<Timestamp>,
    message: String,
    #[serde(default)]
    local: bool,
    #[serde(rename = "type", default = "default_kind")]
    kind: String,
}

fn default_kind() -> String {
    MessageKind::Text.as_str().to_owned()
}

impl WireMessage {
    /// Text message with the given stamp.
    pub fn text(timestamp: Timestamp, message: impl Into<String>) -> Self {
        Self { timestamp: Some(timestamp), message: message.into(), local: true, kind: MessageKind::Text }
    }

    /// Encode as the JSON string passed to `send_message`.
    pub fn encode(&self) -> Result<String, WireError> {
        let raw = RawWireMessage {
            timestamp: self.timestamp.clone(),
            message: self.message.clone(),
            local: self.local,
            kind: self.kind.as_str().to_owned(),
        };
        Ok(serde_json::to_string(&raw)?)
    }

    /// Decode a payload received from a peer.
    pub fn decode(payload: &[u8]) -> Result<Self, WireError> {
        let raw: RawWireMessage = serde_json::from_slice(payload)?;
        let kind = match raw.kind.as_str() {
            "text" => MessageKind::Text,
            other => return Err(WireError::UnsupportedKind(other.to_owned())),
        };
        Ok(Self { timestamp: raw.timestamp, message: raw.message, local: raw.local, kind })
    }
}

impl From<&Message> for WireMessage {
    fn from(msg: &Message) -> Self {
        Self::text(msg.timestamp().clone(), msg.body())
    }
}

/// Reaction forwarded to peers when the gateway supports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactionPayload {
    /// Timestamp of the message being reacted to.
    pub message_timestamp: Timestamp,
    /// Emoji glyph.
    pub reaction: String,
}

impl ReactionPayload {
    /// Encode as JSON.
    pub fn encode(&self) -> Result<String, WireError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode a payload received from a peer.
    pub fn decode(payload: &[u8]) -> Result<Self, WireError> {
        Ok(serde_json::from_slice(payload)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_original_field_names() {
        let wire = WireMessage::text(Timestamp::new("2024-05-01T12:00:00.000Z"), "hello");
        let json: serde_json::Value = serde_json::from_str(&wire.encode().unwrap()).unwrap();

        assert_eq!(json["timestamp"], "2024-05-01T12:00:00.000Z");
        assert_eq!(json["message"], "hello");
        assert_eq!(json["local"], true);
        assert_eq!(json["type"], "text");
    }

    #[test]
    fn decodes_payload_without_timestamp_or_type() {
        let wire = WireMessage::decode(br#"{"message":"hi"}"#).unwrap();
        assert_eq!(wire.timestamp, None);
        assert_eq!(wire.message, "hi");
        assert!(!wire.local);
        assert_eq!(wire.kind, MessageKind::Text);
    }

    #[test]
    fn rejects_unknown_kind() {
        let err = WireMessage::decode(br#"{"message":"hi","type":"image"}"#).unwrap_err();
        assert!(matches!(err, WireError::UnsupportedKind(kind) if kind == "image"));
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(WireMessage::decode(b"\xff\x00"), Err(WireError::Json(_))));
        assert!(matches!(WireMessage::decode(br#"{"timestamp":"x"}"#), Err(WireError::Json(_))));
    }

    #[test]
    fn reaction_payload_uses_camel_case() {
        let payload = ReactionPayload {
            message_timestamp: Timestamp::new("2024-05-01T12:00:00.000Z"),
            reaction: "👍".into(),
        };
        let json = payload.encode().unwrap();
        assert!(json.contains("\"messageTimestamp\""));
        assert_eq!(ReactionPayload::decode(json.as_bytes()).unwrap(), payload);
    }
}
