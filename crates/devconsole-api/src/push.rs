//! Unsolicited messages the backend sends outside request/response.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::Error;
use crate::protocol::MessageType;
use crate::types::{CommunicationMessage, ComponentItem, DepGraphNode, LogEntry};

/// A decoded push, tagged by channel.
#[derive(Debug, Clone, PartialEq)]
pub enum Push {
    /// Full component table. Replaces any previous list.
    ComponentList(Vec<ComponentItem>),
    /// Full dependency graph as an ordered node sequence.
    DependencyGraph(Vec<DepGraphNode>),
    /// Status change of one component.
    ComponentChange(ComponentItem),
    /// One log line of one component.
    ComponentLog(LogEntry),
    /// A message on a topic subscription.
    PubSub(CommunicationMessage),
}

impl Push {
    /// Decode the payload of a non-response envelope.
    ///
    /// Returns `Ok(None)` for [`MessageType::Response`], which is not a push.
    pub fn decode(kind: MessageType, payload: &Value) -> Result<Option<Self>, Error> {
        let push = match kind {
            MessageType::Response => return Ok(None),
            MessageType::ComponentList => Self::ComponentList(from_payload(payload)?),
            MessageType::DependencyGraph => Self::DependencyGraph(from_payload(payload)?),
            MessageType::ComponentChange => Self::ComponentChange(from_payload(payload)?),
            MessageType::ComponentLogs => Self::ComponentLog(from_payload(payload)?),
            MessageType::PubSubMessage => Self::PubSub(from_payload(payload)?),
        };
        Ok(Some(push))
    }

    /// The subscription key this push is routed by, if it has one.
    pub fn key(&self) -> Option<&str> {
        match self {
            Self::ComponentList(_) | Self::DependencyGraph(_) => None,
            Self::ComponentChange(item) => Some(&item.name),
            Self::ComponentLog(entry) => Some(&entry.name),
            Self::PubSub(msg) => Some(&msg.sub_id),
        }
    }
}

fn from_payload<T: DeserializeOwned>(payload: &Value) -> Result<T, Error> {
    T::deserialize(payload).map_err(|e| Error::Deserialization {
        message: e.to_string(),
        body: payload.to_string(),
    })
}

/// Receives every decoded push, in transport order, on the connection's
/// driver task. Implementations must not block.
pub trait PushHandler: Send + Sync {
    fn on_push(&self, push: Push);
}

impl<F> PushHandler for F
where
    F: Fn(Push) + Send + Sync,
{
    fn on_push(&self, push: Push) {
        self(push);
    }
}

// ── Tests ────────────────────────────────────────────────────────────
