//! WebSocket transport: wire protocol, connection handling and fan-out

pub mod handler;
pub mod protocol;
pub mod subscriptions;

pub use subscriptions::{Broadcaster, SubscriptionRegistry};
