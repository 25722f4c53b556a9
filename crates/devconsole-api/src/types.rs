//! Payload types carried inside inbound envelopes and structured request
//! arguments. Field names follow the backend's camelCase JSON.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, EnumString};

// ── Components ───────────────────────────────────────────────────────

/// One row of the component table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentItem {
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub status: String,
    /// UI hint derived from the lifecycle state: `success`, `error`,
    /// `in-progress` or `pending`.
    #[serde(default)]
    pub status_icon: String,
    /// `BUILTIN` or `USER`.
    #[serde(default)]
    pub origin: String,
    #[serde(default)]
    pub can_start: bool,
    #[serde(default)]
    pub can_stop: bool,
}

/// An edge of the dependency graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub name: String,
    /// Hard dependencies restart their dependents.
    #[serde(default)]
    pub hard: bool,
}

/// Wire form of one graph node, as pushed by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepGraphNode {
    pub name: String,
    #[serde(default)]
    pub children: Vec<Dependency>,
}

// ── Logs ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Display)]
#[serde(try_from = "u8", into = "u8")]
#[strum(serialize_all = "UPPERCASE")]
pub enum LogLevel {
    All,
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl TryFrom<u8> for LogLevel {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, String> {
        match value {
            0 => Ok(Self::All),
            1 => Ok(Self::Trace),
            2 => Ok(Self::Debug),
            3 => Ok(Self::Info),
            4 => Ok(Self::Warn),
            5 => Ok(Self::Error),
            other => Err(format!("unknown log level {other}")),
        }
    }
}

impl From<LogLevel> for u8 {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::All => 0,
            LogLevel::Trace => 1,
            LogLevel::Debug => 2,
            LogLevel::Info => 3,
            LogLevel::Warn => 4,
            LogLevel::Error => 5,
        }
    }
}

/// A single log line for one component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub name: String,
    pub level: LogLevel,
    pub log: String,
}

// ── Device & config ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceDetails {
    #[serde(default)]
    pub os: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub cpu: String,
    #[serde(default)]
    pub root_path: String,
    #[serde(default)]
    pub log_store: String,
    #[serde(default)]
    pub registered: bool,
    #[serde(default)]
    pub thing_name: String,
}

/// Answer to `getConfig` and `updateConfig`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigMessage {
    pub successful: bool,
    #[serde(default)]
    pub yaml: Option<String>,
    #[serde(default)]
    pub error_msg: Option<String>,
}

// ── Pub/sub ──────────────────────────────────────────────────────────

/// Which broker a topic lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
pub enum PubSubSource {
    /// The on-device IPC broker.
    #[serde(rename = "pubsub")]
    #[strum(serialize = "pubsub")]
    Local,
    /// The cloud MQTT connection.
    #[serde(rename = "iotcore")]
    #[strum(serialize = "iotcore")]
    IotCore,
}

/// Argument of `subscribeToPubSubTopic`, JSON-encoded into one string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicSubscription {
    pub sub_id: String,
    pub topic_filter: String,
    pub source: PubSubSource,
}

/// Argument of `publishToPubSubTopic`, JSON-encoded into one string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicPublication {
    pub topic: String,
    pub payload: String,
    pub destination: PubSubSource,
}

/// A message delivered on a topic subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommunicationMessage {
    pub sub_id: String,
    #[serde(default)]
    pub subscribed_topic: String,
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub payload: String,
}

// ── Stream manager ───────────────────────────────────────────────────

/// Envelope for every `streamManager*` answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamManagerResponse {
    pub successful: bool,
    #[serde(default)]
    pub error_msg: Option<String>,
    #[serde(default)]
    pub message_stream_info: Option<MessageStreamInfo>,
    #[serde(default)]
    pub messages_list: Vec<StreamMessage>,
    #[serde(default)]
    pub streams_list: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageStreamInfo {
    pub definition: MessageStreamDefinition,
    #[serde(default)]
    pub storage_status: StorageStatus,
    #[serde(default)]
    pub export_statuses: Vec<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageStatus {
    #[serde(default)]
    pub oldest_sequence_number: Option<i64>,
    #[serde(default)]
    pub newest_sequence_number: Option<i64>,
    #[serde(default)]
    pub total_bytes: Option<i64>,
}

/// A message read back from a stream. `payload` is base64 as the backend
/// encodes byte arrays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamMessage {
    pub stream_name: String,
    #[serde(default)]
    pub sequence_number: Option<i64>,
    #[serde(default)]
    pub ingest_time: Option<i64>,
    #[serde(default)]
    pub payload: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(try_from = "u8", into = "u8")]
pub enum Persistence {
    #[default]
    File,
    Memory,
}

impl TryFrom<u8> for Persistence {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::File),
            1 => Ok(Self::Memory),
            other => Err(format!("unknown persistence {other}")),
        }
    }
}

impl From<Persistence> for u8 {
    fn from(p: Persistence) -> Self {
        match p {
            Persistence::File => 0,
            Persistence::Memory => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(try_from = "u8", into = "u8")]
pub enum StrategyOnFull {
    RejectNewData,
    #[default]
    OverwriteOldestData,
}

impl TryFrom<u8> for StrategyOnFull {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::RejectNewData),
            1 => Ok(Self::OverwriteOldestData),
            other => Err(format!("unknown strategy {other}")),
        }
    }
}

impl From<StrategyOnFull> for u8 {
    fn from(s: StrategyOnFull) -> Self {
        match s {
            StrategyOnFull::RejectNewData => 0,
            StrategyOnFull::OverwriteOldestData => 1,
        }
    }
}

/// Definition used to create or update a stream.
///
/// `exportDefinition` is passed through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageStreamDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_size: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream_segment_size: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_to_live_millis: Option<i64>,
    #[serde(default)]
    pub strategy_on_full: StrategyOnFull,
    #[serde(default)]
    pub persistence: Persistence,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flush_on_write: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export_definition: Option<Value>,
}

impl MessageStreamDefinition {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            max_size: None,
            stream_segment_size: None,
            time_to_live_millis: None,
            strategy_on_full: StrategyOnFull::default(),
            persistence: Persistence::default(),
            flush_on_write: None,
            export_definition: None,
        }
    }
}

// ── Generic acknowledgement ──────────────────────────────────────────

/// Interpretation of a response whose success is signalled by shape:
/// `true` accepts, a string carries a failure message.
#[derive(Debug, Clone, PartialEq)]
pub enum Ack {
    Accepted,
    Rejected(String),
    Other(Value),
}

impl From<Value> for Ack {
    fn from(payload: Value) -> Self {
        match payload {
            Value::Bool(true) => Self::Accepted,
            Value::String(message) => Self::Rejected(message),
            other => Self::Other(other),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn deserialize_component_item() {
        let item: ComponentItem = serde_json::from_value(json!({
            "name": "aws.greengrass.Nucleus",
            "version": "2.12.0",
            "status": "RUNNING",
            "statusIcon": "in-progress",
            "origin": "BUILTIN",
            "canStart": false,
            "canStop": true
        }))
        .unwrap();
        assert_eq!(item.name, "aws.greengrass.Nucleus");
        assert_eq!(item.status_icon, "in-progress");
        assert!(item.can_stop);
        assert!(!item.can_start);
    }

    #[test]
    fn log_level_decodes_from_integer() {
        let entry: LogEntry =
            serde_json::from_value(json!({"name": "svc", "level": 4, "log": "disk low"})).unwrap();
        assert_eq!(entry.level, LogLevel::Warn);
        assert_eq!(entry.level.to_string(), "WARN");
        assert!(serde_json::from_value::<LogEntry>(json!({"name": "svc", "level": 9, "log": ""})).is_err());
    }

    #[test]
    fn pubsub_source_wire_names() {
        assert_eq!(serde_json::to_value(PubSubSource::Local).unwrap(), "pubsub");
        assert_eq!(serde_json::to_value(PubSubSource::IotCore).unwrap(), "iotcore");
        assert_eq!("iotcore".parse::<PubSubSource>().unwrap(), PubSubSource::IotCore);
    }

    #[test]
    fn topic_subscription_wire_shape() {
        let sub = TopicSubscription {
            sub_id: "pubsubsensors/#".into(),
            topic_filter: "sensors/#".into(),
            source: PubSubSource::Local,
        };
        assert_eq!(
            serde_json::to_value(&sub).unwrap(),
            json!({"subId": "pubsubsensors/#", "topicFilter": "sensors/#", "source": "pubsub"})
        );
    }

    #[test]
    fn stream_manager_response_defaults() {
        let resp: StreamManagerResponse =
            serde_json::from_value(json!({"successful": false, "errorMsg": "no such stream"})).unwrap();
        assert!(!resp.successful);
        assert_eq!(resp.error_msg.as_deref(), Some("no such stream"));
        assert!(resp.streams_list.is_empty());
        assert!(resp.message_stream_info.is_none());
    }

    #[test]
    fn stream_definition_omits_unset_fields() {
        let def = MessageStreamDefinition {
            persistence: Persistence::Memory,
            ..MessageStreamDefinition::named("telemetry")
        };
        assert_eq!(
            serde_json::to_value(&def).unwrap(),
            json!({"name": "telemetry", "strategyOnFull": 1, "persistence": 1})
        );
    }

    #[test]
    fn ack_interprets_payload_shape() {
        assert_eq!(Ack::from(json!(true)), Ack::Accepted);
        assert_eq!(Ack::from(json!("denied")), Ack::Rejected("denied".into()));
        assert_eq!(Ack::from(json!(false)), Ack::Other(json!(false)));
        assert_eq!(Ack::from(Value::Null), Ack::Other(Value::Null));
    }
}
