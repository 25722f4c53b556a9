//! Session layer between `devconsole-api` and console front ends.
//!
//! - **[`Session`]**: one connection plus its subscription machinery and a
//!   typed method for every backend call.
//! - **[`Multiplexer`]**: many local listeners per push channel, at most one
//!   underlying subscribe per channel key, cache replay for the component
//!   list and dependency graph.
//! - **[`TopicBridge`]**: the same for pub/sub topics, keyed by a derived
//!   subscription id and only retained once the backend accepts.
//! - **[`Hub`]**: the push router. Owns the [`PushCache`] and every
//!   listener registry, and fans pushes out in registration order.

pub mod cache;
pub mod config;
pub mod error;
pub mod hub;
pub mod listeners;
pub mod multiplexer;
pub mod session;
pub mod topics;

// ── Primary re-exports ──────────────────────────────────────────────
pub use cache::{DependencyGraph, PushCache};
pub use config::SessionConfig;
pub use error::CoreError;
pub use hub::{Hub, PushKey};
pub use listeners::{Listener, ListenerId};
pub use multiplexer::{Channel, Multiplexer, Requester, Subscription};
pub use session::{ReadMessagesOptions, Session};
pub use topics::{TopicBridge, TopicHandle, subscription_id};

// Wire types front ends need without depending on the api crate.
pub use devconsole_api::types::{
    CommunicationMessage, ComponentItem, ConfigMessage, Dependency, DeviceDetails, LogEntry,
    LogLevel, MessageStreamDefinition, MessageStreamInfo, Persistence, PubSubSource,
    StrategyOnFull, StreamManagerResponse, StreamMessage,
};
pub use devconsole_api::transport::{DEFAULT_HOST, DEFAULT_PORT, DEFAULT_TIMEOUT};
pub use devconsole_api::{ConnectionState, ErrorCallback};
