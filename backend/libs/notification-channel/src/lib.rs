//! Notification channel over Redis Pub/Sub
//!
//! Carries notification events from the relay's ingestion side to its fan-out side
//! through a single named Redis channel.
//!
//! # Architecture
//!
//! ```text
//! POST /notify
//!   1. Validate {user, text, type}
//!   2. Publish on the dedicated publish connection:
//!      PUBLISH chat_room {"user":"alice","text":"hi","type":"chat"}
//!      ↓
//! Redis Pub/Sub (per-channel order preserved)
//!      ↓
//! Subscriber (separate connection, SUBSCRIBE chat_room):
//!   3. Decode payload (malformed payloads are logged and dropped)
//!   4. Hand the event to the handler, one at a time
//! ```
//!
//! The publisher and the subscriber never share a connection, so a backed-up
//! subscription cannot stall publication.
//!
//! # Example: Publisher
//!
//! ```no_run
//! use notification_channel::{ChannelPublisher, EventPublisher, NotificationEvent};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), notification_channel::ChannelError> {
//!     let publisher = ChannelPublisher::connect("redis://localhost:6379", "chat_room").await?;
//!
//!     let event = NotificationEvent::new("alice", "hi", "chat");
//!     let subscribers = publisher.publish(&event).await?;
//!     println!("delivered to {subscribers} subscribers");
//!
//!     publisher.close().await;
//!     Ok(())
//! }
//! ```

mod error;
mod event;
mod publisher;
mod pump;
mod subscriber;

pub use error::ChannelError;
pub use event::NotificationEvent;
pub use publisher::{ChannelPublisher, EventPublisher};
pub use pump::{pump, PumpExit, PumpStats};
pub use subscriber::{ChannelSubscriber, SubscriptionHandle};

type Result<T> = std::result::Result<T, ChannelError>;
