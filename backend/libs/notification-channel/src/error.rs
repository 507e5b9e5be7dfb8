//! Error types for notification channel operations

use thiserror::Error;

/// Notification channel errors
#[derive(Error, Debug)]
pub enum ChannelError {
    /// Redis connection or command error
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Payload serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Event decoded but failed validation
    #[error("Invalid event: {0}")]
    InvalidEvent(String),

    /// Publish attempted without an established connection
    #[error("Channel backend not connected")]
    NotConnected,

    /// Receive loop ended without a clean shutdown
    #[error("Subscription closed: {0}")]
    SubscriptionClosed(String),
}
