/// Frames pushed to real-time listeners
use notification_channel::NotificationEvent;
use serde::{Deserialize, Serialize};

/// Outbound listener frame.
///
/// Serialized as `{"event": "<name>", "data": {...}}` so the notification's own
/// `type` field stays untouched inside `data`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ListenerMessage {
    /// Connection established confirmation
    Connected { listener_id: String, timestamp: i64 },

    /// A notification received from the channel
    Notification(NotificationEvent),
}

impl ListenerMessage {
    pub fn connected(listener_id: impl Into<String>) -> Self {
        ListenerMessage::Connected {
            listener_id: listener_id.into(),
            timestamp: chrono::Utc::now().timestamp(),
        }
    }

    pub fn notification(event: NotificationEvent) -> Self {
        ListenerMessage::Notification(event)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
