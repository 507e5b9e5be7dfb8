use super::ListenerMessage;
use crate::metrics;
use notification_channel::NotificationEvent;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{
    mpsc::{channel, error::TrySendError, Receiver, Sender},
    RwLock,
};
use uuid::Uuid;

/// Unique identifier for a connected listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(Uuid);

impl ListenerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ListenerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// What a listener's session receives from the registry
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    /// Serialized frame to write to the socket
    Frame(String),
    /// The relay is shutting down; close the socket
    Close,
}

/// Result of one fan-out
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastOutcome {
    pub delivered: usize,
    /// Listeners that had gone away or fallen a full queue behind
    pub removed: usize,
}

/// Frames a listener may have queued before it is dropped as too slow
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

struct Listeners {
    senders: HashMap<ListenerId, Sender<Outbound>>,
    /// Set by `close_all`; no listener can join afterwards
    closed: bool,
}

/// Set of currently connected listeners.
///
/// Each listener owns the receiving half of a bounded queue; the registry keeps the
/// sending half. A listener that leaves only loses what was queued after it left.
/// A listener whose queue is full is removed rather than waited on.
#[derive(Clone)]
pub struct ListenerRegistry {
    inner: Arc<RwLock<Listeners>>,
    queue_capacity: usize,
}

impl Default for ListenerRegistry {
    fn default() -> Self {
        Self::with_queue_capacity(DEFAULT_QUEUE_CAPACITY)
    }
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_queue_capacity(queue_capacity: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Listeners {
                senders: HashMap::new(),
                closed: false,
            })),
            queue_capacity: queue_capacity.max(1),
        }
    }

    /// Register a listener.
    ///
    /// Returns `None` once `close_all` has run.
    pub async fn add_listener(&self) -> Option<(ListenerId, Receiver<Outbound>)> {
        let mut guard = self.inner.write().await;
        if guard.closed {
            tracing::debug!("Registry closed, listener refused");
            return None;
        }

        let (tx, rx) = channel(self.queue_capacity);
        let listener_id = ListenerId::new();
        guard.senders.insert(listener_id, tx);
        metrics::set_listener_count(guard.senders.len());

        tracing::debug!(
            listener_id = %listener_id,
            listeners = guard.senders.len(),
            "Listener registered"
        );

        Some((listener_id, rx))
    }

    /// Remove a listener; unknown ids are ignored
    pub async fn remove_listener(&self, listener_id: ListenerId) {
        let mut guard = self.inner.write().await;
        if guard.senders.remove(&listener_id).is_some() {
            metrics::set_listener_count(guard.senders.len());
            tracing::debug!(
                listener_id = %listener_id,
                remaining = guard.senders.len(),
                "Listener removed"
            );
        }
    }

    /// Queue `event` for every listener connected right now.
    ///
    /// Holding the write lock for the whole pass means a listener either joins
    /// before this event (and gets it) or after (and does not). Listeners that are
    /// gone or whose queue is full are dropped on the way.
    pub async fn broadcast(&self, event: &NotificationEvent) -> BroadcastOutcome {
        let frame = match ListenerMessage::notification(event.clone()).to_json() {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize listener frame");
                return BroadcastOutcome::default();
            }
        };

        let mut guard = self.inner.write().await;
        if guard.senders.is_empty() {
            tracing::debug!(user = %event.user, "No listeners connected, notification not delivered");
            metrics::record_broadcast(0);
            return BroadcastOutcome::default();
        }

        let before = guard.senders.len();
        guard.senders.retain(|listener_id, sender| {
            match sender.try_send(Outbound::Frame(frame.clone())) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    tracing::warn!(listener_id = %listener_id, "Listener queue full, disconnecting");
                    false
                }
                Err(TrySendError::Closed(_)) => false,
            }
        });
        let after = guard.senders.len();

        if before != after {
            tracing::debug!(
                "Broadcast: {} listeners cleaned up, {} active",
                before - after,
                after
            );
            metrics::set_listener_count(after);
        }
        metrics::record_broadcast(after);

        BroadcastOutcome {
            delivered: after,
            removed: before - after,
        }
    }

    pub async fn listener_count(&self) -> usize {
        self.inner.read().await.senders.len()
    }

    /// Tell every listener to close, forget them all and refuse new ones.
    ///
    /// Returns how many listeners were told. A listener with a full queue misses the
    /// `Close` but still sees its queue end.
    pub async fn close_all(&self) -> usize {
        let mut guard = self.inner.write().await;
        guard.closed = true;
        let count = guard.senders.len();
        for (_, sender) in guard.senders.drain() {
            let _ = sender.try_send(Outbound::Close);
        }
        metrics::set_listener_count(0);
        count
    }
}
