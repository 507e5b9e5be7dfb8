/// Real-time listener fan-out
///
/// 1. ListenerRegistry: the set of connected listeners
/// 2. ListenerSession: one WebSocket connection, fed from the registry
/// 3. ListenerMessage: frames written to listeners

pub mod messages;
pub mod registry;
pub mod session;

pub use messages::ListenerMessage;
pub use registry::{BroadcastOutcome, ListenerId, ListenerRegistry, Outbound, DEFAULT_QUEUE_CAPACITY};
pub use session::ListenerSession;
