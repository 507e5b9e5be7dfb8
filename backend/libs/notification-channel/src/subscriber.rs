use crate::error::ChannelError;
use crate::event::NotificationEvent;
use crate::pump::{pump, PumpExit, PumpStats};
use crate::Result;
use futures_util::StreamExt;
use redis::aio::PubSub;
use redis::Client;
use std::future::Future;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Subscriber holding the dedicated receive connection to Redis.
///
/// The connection is subscribed to the channel by the time `connect` returns.
pub struct ChannelSubscriber {
    pubsub: PubSub,
    channel: String,
}

impl ChannelSubscriber {
    /// Open a pub/sub connection and subscribe to `channel`
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use notification_channel::ChannelSubscriber;
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), notification_channel::ChannelError> {
    /// let subscriber = ChannelSubscriber::connect("redis://localhost:6379", "chat_room").await?;
    ///
    /// let handle = subscriber.spawn(|event| async move {
    ///     println!("{}: {}", event.user, event.text);
    /// });
    ///
    /// let stats = handle.unsubscribe().await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn connect(redis_url: &str, channel: impl Into<String>) -> Result<Self> {
        let channel = channel.into();
        let client = Client::open(redis_url)?;
        let mut pubsub = client.get_async_pubsub().await?;
        pubsub.subscribe(&channel).await?;

        info!(channel = %channel, "Subscribed to notification channel");

        Ok(Self { pubsub, channel })
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Start the receive loop on a background task.
    ///
    /// `handler` is awaited for each event before the next one is read.
    pub fn spawn<F, Fut>(self, handler: F) -> SubscriptionHandle
    where
        F: Fn(NotificationEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let channel = self.channel.clone();

        let join = tokio::spawn(receive_loop(self, shutdown_rx, handler));

        SubscriptionHandle {
            channel,
            shutdown: Some(shutdown_tx),
            join,
        }
    }
}

async fn receive_loop<F, Fut>(
    subscriber: ChannelSubscriber,
    shutdown_rx: oneshot::Receiver<()>,
    handler: F,
) -> Result<PumpStats>
where
    F: Fn(NotificationEvent) -> Fut,
    Fut: Future<Output = ()>,
{
    let ChannelSubscriber {
        mut pubsub,
        channel,
    } = subscriber;

    let (stats, exit) = {
        let payloads = pubsub
            .on_message()
            .map(|msg| msg.get_payload::<String>().map_err(ChannelError::from));
        let shutdown = async move {
            // A dropped handle counts as a shutdown request
            let _ = shutdown_rx.await;
        };
        pump(Box::pin(payloads), shutdown, handler).await
    };

    match exit {
        PumpExit::Shutdown => {
            pubsub.unsubscribe(&channel).await?;
            info!(
                channel = %channel,
                handled = stats.handled,
                dropped = stats.dropped,
                "Unsubscribed from notification channel"
            );
            drop(pubsub);
            info!(channel = %channel, "Subscriber connection closed");
            Ok(stats)
        }
        PumpExit::StreamEnded => {
            warn!(channel = %channel, "Notification subscription ended by backend");
            Err(ChannelError::SubscriptionClosed(
                "backend closed the subscription stream".to_string(),
            ))
        }
    }
}

/// Handle to a running receive loop
pub struct SubscriptionHandle {
    channel: String,
    shutdown: Option<oneshot::Sender<()>>,
    join: JoinHandle<Result<PumpStats>>,
}

impl SubscriptionHandle {
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Stop receiving, unsubscribe and close the connection.
    ///
    /// An event already being handled finishes first.
    pub async fn unsubscribe(mut self) -> Result<PumpStats> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        join_result(self.join.await)
    }

    /// Resolves only if the receive loop ends without `unsubscribe` being called.
    ///
    /// Cancel-safe; the handle stays usable when this future is dropped.
    pub async fn closed(&mut self) -> Result<PumpStats> {
        join_result((&mut self.join).await)
    }
}

fn join_result(
    joined: std::result::Result<Result<PumpStats>, tokio::task::JoinError>,
) -> Result<PumpStats> {
    joined.map_err(|e| ChannelError::SubscriptionClosed(format!("receive task failed: {e}")))?
}

