// devconsole-api: Async client for the device debug console WebSocket protocol

pub mod close;
pub mod connection;
pub mod correlator;
pub mod error;
pub mod protocol;
pub mod push;
pub mod transport;
pub mod types;

pub use connection::{Connection, ConnectionState, ErrorCallback};
pub use correlator::{Correlator, PendingResponse, RequestIdGenerator};
pub use error::Error;
pub use protocol::{Call, MessageType, RequestId};
pub use push::{Push, PushHandler};
pub use transport::ConnectionConfig;
