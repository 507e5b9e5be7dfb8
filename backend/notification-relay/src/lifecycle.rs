//! Relay lifecycle state machine.
//!
//! ```text
//! Uninitialized -> ConnectingPublisher -> ConnectingSubscriber -> Subscribed -> Serving
//!        any non-terminal state -> Draining -> Terminated
//!        a startup state -> Terminated (fatal startup error)
//! ```
//!
//! The current state lives in a `watch` channel so HTTP handlers and health
//! checks can read it without taking a lock.

use crate::error::{AppError, AppResult};
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    Uninitialized,
    ConnectingPublisher,
    ConnectingSubscriber,
    Subscribed,
    Serving,
    Draining,
    Terminated,
}

impl RelayState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelayState::Uninitialized => "uninitialized",
            RelayState::ConnectingPublisher => "connecting_publisher",
            RelayState::ConnectingSubscriber => "connecting_subscriber",
            RelayState::Subscribed => "subscribed",
            RelayState::Serving => "serving",
            RelayState::Draining => "draining",
            RelayState::Terminated => "terminated",
        }
    }

    pub fn can_transition_to(&self, next: RelayState) -> bool {
        use RelayState::*;
        matches!(
            (self, next),
            (Uninitialized, ConnectingPublisher)
                | (ConnectingPublisher, ConnectingSubscriber)
                | (ConnectingSubscriber, Subscribed)
                | (Subscribed, Serving)
                | (Uninitialized, Draining)
                | (ConnectingPublisher, Draining)
                | (ConnectingSubscriber, Draining)
                | (Subscribed, Draining)
                | (Serving, Draining)
                | (Draining, Terminated)
                | (ConnectingPublisher, Terminated)
                | (ConnectingSubscriber, Terminated)
                | (Subscribed, Terminated)
        )
    }
}

impl fmt::Display for RelayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shared handle to the relay's lifecycle state
#[derive(Debug, Clone)]
pub struct Lifecycle {
    tx: Arc<watch::Sender<RelayState>>,
}

impl Lifecycle {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(RelayState::Uninitialized);
        Self { tx: Arc::new(tx) }
    }

    pub fn current(&self) -> RelayState {
        *self.tx.borrow()
    }

    pub fn is_serving(&self) -> bool {
        self.current() == RelayState::Serving
    }

    /// Move to `next`, rejecting transitions the state machine does not allow
    pub fn transition(&self, next: RelayState) -> AppResult<RelayState> {
        let mut previous = None;
        self.tx.send_if_modified(|state| {
            if state.can_transition_to(next) {
                previous = Some(*state);
                *state = next;
                true
            } else {
                false
            }
        });

        match previous {
            Some(from) => {
                info!(from = %from, to = %next, "relay state changed");
                Ok(from)
            }
            None => Err(AppError::Lifecycle(format!(
                "illegal transition {} -> {}",
                self.current(),
                next
            ))),
        }
    }

    /// Enter `Draining` unless already draining or terminated.
    ///
    /// Returns true when this call started the drain.
    pub fn begin_draining(&self) -> bool {
        self.transition(RelayState::Draining).is_ok()
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}
