#![allow(dead_code)]

use async_trait::async_trait;
use notification_channel::{ChannelError, EventPublisher, NotificationEvent};
use notification_relay::config::WebSocketConfig;
use notification_relay::{AppState, Lifecycle, ListenerRegistry, RelayState};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Records every published event
#[derive(Default)]
pub struct RecordingPublisher {
    pub published: Mutex<Vec<NotificationEvent>>,
}

impl RecordingPublisher {
    pub fn published(&self) -> Vec<NotificationEvent> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish(&self, event: &NotificationEvent) -> Result<usize, ChannelError> {
        self.published.lock().unwrap().push(event.clone());
        Ok(1)
    }
}

/// Fails every publish with the error produced by `make_error`
pub struct FailingPublisher {
    make_error: fn() -> ChannelError,
}

impl FailingPublisher {
    pub fn not_connected() -> Self {
        Self {
            make_error: || ChannelError::NotConnected,
        }
    }

    pub fn rejecting() -> Self {
        Self {
            make_error: || ChannelError::InvalidEvent("rejected by backend".to_string()),
        }
    }
}

#[async_trait]
impl EventPublisher for FailingPublisher {
    async fn publish(&self, _event: &NotificationEvent) -> Result<usize, ChannelError> {
        Err((self.make_error)())
    }
}

/// Stands in for the channel: publishing goes straight to the registry
pub struct LoopbackPublisher {
    pub registry: ListenerRegistry,
}

#[async_trait]
impl EventPublisher for LoopbackPublisher {
    async fn publish(&self, event: &NotificationEvent) -> Result<usize, ChannelError> {
        Ok(self.registry.broadcast(event).await.delivered)
    }
}

pub fn websocket_config() -> WebSocketConfig {
    WebSocketConfig {
        heartbeat_interval: Duration::from_secs(5),
        client_timeout: Duration::from_secs(30),
        queue_capacity: 16,
    }
}

pub fn serving_lifecycle() -> Lifecycle {
    let lifecycle = Lifecycle::new();
    for next in [
        RelayState::ConnectingPublisher,
        RelayState::ConnectingSubscriber,
        RelayState::Subscribed,
        RelayState::Serving,
    ] {
        lifecycle.transition(next).unwrap();
    }
    lifecycle
}

pub fn serving_state(publisher: Arc<dyn EventPublisher>, registry: ListenerRegistry) -> AppState {
    AppState::new(publisher, registry, serving_lifecycle(), websocket_config())
}
