use crate::error::ChannelError;
use crate::event::NotificationEvent;
use crate::Result;
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Anything that can hand a validated event to the channel backend.
///
/// Returns the number of backend subscribers that received the event.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: &NotificationEvent) -> Result<usize>;
}

/// Publisher holding the dedicated outbound connection to Redis
pub struct ChannelPublisher {
    connection: RwLock<Option<ConnectionManager>>,
    channel: String,
}

impl ChannelPublisher {
    /// Default Redis channel for notifications
    pub const DEFAULT_CHANNEL: &'static str = "chat_room";

    /// Open the publish connection
    ///
    /// # Arguments
    ///
    /// * `redis_url` - Redis connection URL (e.g., "redis://localhost:6379")
    /// * `channel` - Channel every event is published to
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use notification_channel::ChannelPublisher;
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), notification_channel::ChannelError> {
    /// let publisher = ChannelPublisher::connect("redis://localhost:6379", "chat_room").await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn connect(redis_url: &str, channel: impl Into<String>) -> Result<Self> {
        let channel = channel.into();
        let client = Client::open(redis_url)?;
        let connection = ConnectionManager::new(client).await?;

        info!(channel = %channel, "Publisher connected to channel backend");

        Ok(Self {
            connection: RwLock::new(Some(connection)),
            channel,
        })
    }

    /// Publisher with no connection; every publish fails with `NotConnected`
    pub fn disconnected(channel: impl Into<String>) -> Self {
        Self {
            connection: RwLock::new(None),
            channel: channel.into(),
        }
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub async fn is_connected(&self) -> bool {
        self.connection.read().await.is_some()
    }

    /// Drop the publish connection
    pub async fn close(&self) {
        if self.connection.write().await.take().is_some() {
            info!(channel = %self.channel, "Publisher connection closed");
        }
    }
}

#[async_trait]
impl EventPublisher for ChannelPublisher {
    async fn publish(&self, event: &NotificationEvent) -> Result<usize> {
        let payload = event.encode()?;

        // ConnectionManager is a cheap multiplexed handle; don't hold the lock across I/O
        let mut conn = self
            .connection
            .read()
            .await
            .clone()
            .ok_or(ChannelError::NotConnected)?;

        debug!(
            user = %event.user,
            kind = %event.kind,
            channel = %self.channel,
            "Publishing notification"
        );

        let receivers: usize = conn.publish(&self.channel, payload).await?;

        info!(
            channel = %self.channel,
            subscribers = receivers,
            "Notification published"
        );

        Ok(receivers)
    }
}
