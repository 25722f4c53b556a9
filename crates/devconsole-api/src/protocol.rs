//! Wire envelopes and the call vocabulary.
//!
//! Outbound frames are `{"requestID": n, "request": {"call": "...", "args": [...]}}`.
//! Inbound frames are `{"messageType": n, "requestID": n, "payload": ...}`.
//! Both directions are JSON text frames over a single WebSocket.

use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

/// Largest integer a JavaScript peer can represent exactly (`2^53 - 1`).
///
/// Request ids never exceed it so the backend and any browser client
/// sharing the protocol agree on every id.
pub const MAX_SAFE_INTEGER: i64 = (1 << 53) - 1;

// ── RequestId ────────────────────────────────────────────────────────

/// Correlates a response with the request that caused it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(i64);

impl RequestId {
    /// Reserved id carried by the init handshake and its response.
    pub const INIT: Self = Self(-1024);

    /// Id the backend stamps on unsolicited pushes.
    pub const PUSH: Self = Self(-1);

    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ── Call ─────────────────────────────────────────────────────────────

/// Every call name the backend understands.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum Call {
    // Queries
    GetDeviceDetails,
    GetComponentList,
    GetComponent,
    GetConfig,

    // Mutations
    StartComponent,
    StopComponent,
    ReinstallComponent,
    UpdateConfig,

    // Subscriptions
    SubscribeToComponentList,
    UnsubscribeToComponentList,
    SubscribeToDependencyGraph,
    UnsubscribeToDependencyGraph,
    SubscribeToComponent,
    UnsubscribeToComponent,
    SubscribeToComponentLogs,
    UnsubscribeToComponentLogs,
    SubscribeToPubSubTopic,
    UnsubscribeToPubSubTopic,
    PublishToPubSubTopic,

    // Stream manager
    StreamManagerListStreams,
    StreamManagerDescribeStream,
    StreamManagerDeleteMessageStream,
    StreamManagerReadMessages,
    StreamManagerAppendMessage,
    StreamManagerCreateMessageStream,
    StreamManagerUpdateMessageStream,

    // Internal
    Init,
    ForcePushComponentList,
    ForcePushDependencyGraph,
    Ping,
}

impl Call {
    /// Calls issued only by the session layer itself.
    pub fn is_internal(self) -> bool {
        matches!(
            self,
            Self::Init | Self::ForcePushComponentList | Self::ForcePushDependencyGraph | Self::Ping
        )
    }
}

// ── Outbound ─────────────────────────────────────────────────────────

/// The `request` half of an outbound envelope.
///
/// The backend declares `args` as `String[]`; structured arguments are
/// JSON-encoded into a single string by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub call: Call,
    pub args: Vec<String>,
}

/// Outbound envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackedRequest {
    #[serde(rename = "requestID")]
    pub request_id: RequestId,
    pub request: Request,
}

impl PackedRequest {
    pub fn new(request_id: RequestId, call: Call, args: Vec<String>) -> Self {
        Self {
            request_id,
            request: Request { call, args },
        }
    }
}

// ── Inbound ──────────────────────────────────────────────────────────

/// Kind tag of an inbound envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum MessageType {
    Response,
    ComponentList,
    DependencyGraph,
    ComponentChange,
    ComponentLogs,
    PubSubMessage,
}

impl MessageType {
    /// Decode the numeric tag. Unknown codes yield `None` and are ignored
    /// by the dispatcher.
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::Response),
            1 => Some(Self::ComponentList),
            2 => Some(Self::DependencyGraph),
            3 => Some(Self::ComponentChange),
            4 => Some(Self::ComponentLogs),
            5 => Some(Self::PubSubMessage),
            _ => None,
        }
    }

    pub fn code(self) -> i64 {
        match self {
            Self::Response => 0,
            Self::ComponentList => 1,
            Self::DependencyGraph => 2,
            Self::ComponentChange => 3,
            Self::ComponentLogs => 4,
            Self::PubSubMessage => 5,
        }
    }
}

/// Inbound envelope with the payload left undecoded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "messageType")]
    pub message_type: i64,

    #[serde(rename = "requestID")]
    pub request_id: RequestId,

    #[serde(default)]
    pub payload: serde_json::Value,
}

impl Message {
    pub fn kind(&self) -> Option<MessageType> {
        MessageType::from_code(self.message_type)
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn packed_request_wire_shape() {
        let req = PackedRequest::new(RequestId::new(7), Call::Ping, vec!["test".into()]);
        insta::assert_snapshot!(
            serde_json::to_string(&req).unwrap(),
            @r#"{"requestID":7,"request":{"call":"ping","args":["test"]}}"#
        );
    }

    #[test]
    fn init_request_uses_sentinel_id() {
        let req = PackedRequest::new(
            RequestId::INIT,
            Call::Init,
            vec!["admin".into(), "hunter2".into()],
        );
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["requestID"], -1024);
        assert_eq!(json["request"]["call"], "init");
    }

    #[test]
    fn call_names_match_serde_and_strum() {
        for call in Call::iter() {
            let via_serde = serde_json::to_value(call).unwrap();
            let via_strum: &'static str = call.into();
            assert_eq!(via_serde, via_strum, "mismatch for {call:?}");
        }
    }

    #[test]
    fn call_names_are_camel_case() {
        assert_eq!(Call::SubscribeToPubSubTopic.to_string(), "subscribeToPubSubTopic");
        assert_eq!(
            Call::StreamManagerDeleteMessageStream.to_string(),
            "streamManagerDeleteMessageStream"
        );
        assert_eq!(Call::ForcePushComponentList.to_string(), "forcePushComponentList");
        assert_eq!("unsubscribeToComponentLogs".parse::<Call>().unwrap(), Call::UnsubscribeToComponentLogs);
    }

    #[test]
    fn internal_calls() {
        let internal: Vec<Call> = Call::iter().filter(|c| c.is_internal()).collect();
        assert_eq!(
            internal,
            vec![
                Call::Init,
                Call::ForcePushComponentList,
                Call::ForcePushDependencyGraph,
                Call::Ping
            ]
        );
    }

    #[test]
    fn message_type_codes_round_trip() {
        for code in 0..=5 {
            let kind = MessageType::from_code(code).unwrap();
            assert_eq!(kind.code(), code);
        }
        assert_eq!(MessageType::from_code(6), None);
        assert_eq!(MessageType::from_code(-1), None);
    }

    #[test]
    fn inbound_message_without_payload() {
        let msg: Message = serde_json::from_str(r#"{"messageType":0,"requestID":-1024}"#).unwrap();
        assert_eq!(msg.kind(), Some(MessageType::Response));
        assert_eq!(msg.request_id, RequestId::INIT);
        assert!(msg.payload.is_null());
    }
}
