use crate::{config::WebSocketConfig, lifecycle::Lifecycle, websocket::ListenerRegistry};
use notification_channel::EventPublisher;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub publisher: Arc<dyn EventPublisher>,
    pub registry: ListenerRegistry,
    pub lifecycle: Lifecycle,
    pub websocket: WebSocketConfig,
}

impl AppState {
    pub fn new(
        publisher: Arc<dyn EventPublisher>,
        registry: ListenerRegistry,
        lifecycle: Lifecycle,
        websocket: WebSocketConfig,
    ) -> Self {
        Self {
            publisher,
            registry,
            lifecycle,
            websocket,
        }
    }
}
