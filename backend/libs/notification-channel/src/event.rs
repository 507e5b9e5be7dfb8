//! Notification event and its channel wire encoding

use crate::error::ChannelError;
use serde::{Deserialize, Serialize};

/// A notification flowing from a producer to every connected listener.
///
/// On the wire this is UTF-8 JSON with exactly the fields
/// `{"user": ..., "text": ..., "type": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationEvent {
    pub user: String,
    pub text: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl NotificationEvent {
    /// Build an event without validating it
    pub fn new(
        user: impl Into<String>,
        text: impl Into<String>,
        kind: impl Into<String>,
    ) -> Self {
        Self {
            user: user.into(),
            text: text.into(),
            kind: kind.into(),
        }
    }

    /// All three fields must be non-empty.
    pub fn validate(&self) -> Result<(), ChannelError> {
        for (field, value) in [("user", &self.user), ("text", &self.text), ("type", &self.kind)] {
            if value.is_empty() {
                return Err(ChannelError::InvalidEvent(format!("{field} is empty")));
            }
        }
        Ok(())
    }

    /// Canonical channel payload
    pub fn encode(&self) -> Result<String, ChannelError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode a channel payload, rejecting malformed JSON and empty fields
    pub fn decode(payload: &str) -> Result<Self, ChannelError> {
        let event: NotificationEvent = serde_json::from_str(payload)?;
        event.validate()?;
        Ok(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_uses_type_field_name() {
        let event = NotificationEvent::new("alice", "hi", "chat");
        let json = event.encode().unwrap();
        assert_eq!(json, r#"{"user":"alice","text":"hi","type":"chat"}"#);
    }

    #[test]
    fn test_decode_valid_payload() {
        let event = NotificationEvent::decode(r#"{"user":"bob","text":"yo","type":"alert"}"#)
            .unwrap();
        assert_eq!(event, NotificationEvent::new("bob", "yo", "alert"));
    }

    #[test]
    fn test_decode_ignores_unknown_fields() {
        let event = NotificationEvent::decode(
            r#"{"user":"bob","text":"yo","type":"alert","priority":"high"}"#,
        )
        .unwrap();
        assert_eq!(event.kind, "alert");
    }

    #[test]
    fn test_decode_rejects_malformed_json() {
        let err = NotificationEvent::decode("not json at all").unwrap_err();
        assert!(matches!(err, ChannelError::Serialization(_)));
    }

    #[test]
    fn test_decode_rejects_missing_field() {
        let err = NotificationEvent::decode(r#"{"user":"bob","text":"yo"}"#).unwrap_err();
        assert!(matches!(err, ChannelError::Serialization(_)));
    }

    #[test]
    fn test_decode_rejects_empty_field() {
        let err = NotificationEvent::decode(r#"{"user":"","text":"yo","type":"x"}"#).unwrap_err();
        assert!(matches!(err, ChannelError::InvalidEvent(ref m) if m == "user is empty"));
    }

    #[test]
    fn test_validate_reports_first_empty_field() {
        let event = NotificationEvent::new("alice", "", "");
        let err = event.validate().unwrap_err();
        assert_eq!(err.to_string(), "Invalid event: text is empty");
    }
}
