//! Real-time notification relay.
//!
//! Producers `POST /notify`; each accepted notification is published once on a
//! Redis Pub/Sub channel. A separate subscription receives it back and fans it out
//! to every WebSocket listener connected to `GET /ws`.

pub mod config;
pub mod error;
pub mod handlers;
pub mod lifecycle;
pub mod logging;
pub mod metrics;
pub mod relay;
pub mod state;
pub mod websocket;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use lifecycle::{Lifecycle, RelayState};
pub use state::AppState;
pub use websocket::ListenerRegistry;
