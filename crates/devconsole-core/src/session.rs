// ── Session facade ──
//
// One connection to the console backend plus the subscription machinery
// layered on it. Every backend call has a typed method here; front ends
// never build envelopes themselves.

use std::sync::Arc;

use devconsole_api::types::{
    CommunicationMessage, ComponentItem, ConfigMessage, DeviceDetails, LogEntry, MessageStreamDefinition,
    MessageStreamInfo, PubSubSource, StreamManagerResponse, StreamMessage,
};
use devconsole_api::{Call, Connection, ConnectionState, ErrorCallback, PushHandler, RequestIdGenerator};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::watch;

use crate::cache::DependencyGraph;
use crate::config::SessionConfig;
use crate::error::CoreError;
use crate::hub::Hub;
use crate::multiplexer::{Multiplexer, Requester, Subscription, expect_ack};
use crate::topics::{TopicBridge, TopicHandle};

/// Window for `streamManagerReadMessages`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadMessagesOptions {
    pub desired_start_sequence_number: i64,
    pub min_message_count: i64,
    pub max_message_count: i64,
    pub read_timeout_millis: i64,
}

impl Default for ReadMessagesOptions {
    fn default() -> Self {
        Self {
            desired_start_sequence_number: 0,
            min_message_count: 1,
            max_message_count: 100,
            read_timeout_millis: 0,
        }
    }
}

impl ReadMessagesOptions {
    fn to_args(self, stream: &str) -> Vec<String> {
        vec![
            stream.to_owned(),
            self.desired_start_sequence_number.to_string(),
            self.min_message_count.to_string(),
            self.max_message_count.to_string(),
            self.read_timeout_millis.to_string(),
        ]
    }
}

// ── Session ──────────────────────────────────────────────────────────

/// A live console session. Cheaply cloneable.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    connection: Connection,
    hub: Arc<Hub>,
    channels: Multiplexer<Connection>,
    topics: TopicBridge<Connection>,
}

impl Session {
    /// Start connecting and return immediately.
    ///
    /// `on_error` receives connection-wide failures exactly once per
    /// failure, plus every attempt to send while not connected.
    pub fn connect(config: SessionConfig, on_error: ErrorCallback) -> Result<Self, CoreError> {
        let hub = Hub::new();
        let ids = Arc::new(RequestIdGenerator::new());
        let pushes: Arc<dyn PushHandler> = hub.clone();
        let connection = Connection::connect(config.into(), ids, pushes, on_error)?;

        Ok(Self {
            inner: Arc::new(SessionInner {
                channels: Multiplexer::new(connection.clone(), Arc::clone(&hub)),
                topics: TopicBridge::new(connection.clone(), Arc::clone(&hub)),
                connection,
                hub,
            }),
        })
    }

    /// Connect and wait for the init handshake.
    pub async fn open(config: SessionConfig, on_error: ErrorCallback) -> Result<Self, CoreError> {
        let session = Self::connect(config, on_error)?;
        session.ready().await?;
        Ok(session)
    }

    pub async fn ready(&self) -> Result<(), CoreError> {
        Ok(self.inner.connection.init_connections().await?)
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.connection.state()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.connection.watch_state()
    }

    pub fn hub(&self) -> &Arc<Hub> {
        &self.inner.hub
    }

    /// Close the socket. Pending requests fail; the error callback stays
    /// silent.
    pub fn close(&self) {
        self.inner.connection.close();
    }

    // ── Raw access ───────────────────────────────────────────────────

    /// Send any call and return the raw payload.
    pub async fn request(&self, call: Call, args: Vec<String>) -> Result<Value, CoreError> {
        Ok(self.inner.connection.request(call, args).await?)
    }

    /// Round-trip check. The backend answers `true`.
    pub async fn ping(&self, echo: &str) -> Result<Value, CoreError> {
        self.request(Call::Ping, vec![echo.to_owned()]).await
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub async fn device_details(&self) -> Result<DeviceDetails, CoreError> {
        self.typed(Call::GetDeviceDetails, Vec::new()).await
    }

    pub async fn component_list(&self) -> Result<Vec<ComponentItem>, CoreError> {
        self.typed(Call::GetComponentList, Vec::new()).await
    }

    pub async fn component(&self, name: &str) -> Result<ComponentItem, CoreError> {
        let found: Option<ComponentItem> = self.typed(Call::GetComponent, vec![name.to_owned()]).await?;
        found.ok_or_else(|| component_not_found(name))
    }

    /// Running configuration of `name` as YAML.
    pub async fn component_config(&self, name: &str) -> Result<String, CoreError> {
        let message: ConfigMessage = self.typed(Call::GetConfig, vec![name.to_owned()]).await?;
        match message {
            ConfigMessage {
                successful: true,
                yaml: Some(yaml),
                ..
            } => Ok(yaml),
            ConfigMessage {
                error_msg: Some(message),
                ..
            } => Err(CoreError::OperationFailed { message }),
            _ => Err(component_not_found(name)),
        }
    }

    // ── Mutations ────────────────────────────────────────────────────

    /// Ask the lifecycle to start `name`. Success means the request was
    /// accepted, not that the component is running.
    pub async fn start_component(&self, name: &str) -> Result<(), CoreError> {
        self.lifecycle(Call::StartComponent, name).await
    }

    pub async fn stop_component(&self, name: &str) -> Result<(), CoreError> {
        self.lifecycle(Call::StopComponent, name).await
    }

    pub async fn reinstall_component(&self, name: &str) -> Result<(), CoreError> {
        self.lifecycle(Call::ReinstallComponent, name).await
    }

    /// Replace the running configuration of `name` with `yaml`.
    pub async fn update_config(&self, name: &str, yaml: &str) -> Result<(), CoreError> {
        let message: ConfigMessage = self
            .typed(Call::UpdateConfig, vec![name.to_owned(), yaml.to_owned()])
            .await?;
        if message.successful {
            Ok(())
        } else {
            Err(CoreError::Rejected {
                message: message
                    .error_msg
                    .unwrap_or_else(|| format!("configuration of {name} was not updated")),
            })
        }
    }

    // ── Channels ─────────────────────────────────────────────────────

    pub async fn subscribe_component_list<F>(&self, listener: F) -> Result<Subscription, CoreError>
    where
        F: Fn(&[ComponentItem]) + Send + Sync + 'static,
    {
        self.inner.channels.subscribe_component_list(listener).await
    }

    pub async fn subscribe_dependency_graph<F>(&self, listener: F) -> Result<Subscription, CoreError>
    where
        F: Fn(&DependencyGraph) + Send + Sync + 'static,
    {
        self.inner.channels.subscribe_dependency_graph(listener).await
    }

    pub async fn subscribe_component<F>(&self, name: &str, listener: F) -> Result<Subscription, CoreError>
    where
        F: Fn(&ComponentItem) + Send + Sync + 'static,
    {
        self.inner.channels.subscribe_component(name, listener).await
    }

    pub async fn subscribe_component_logs<F>(&self, name: &str, listener: F) -> Result<Subscription, CoreError>
    where
        F: Fn(&LogEntry) + Send + Sync + 'static,
    {
        self.inner.channels.subscribe_component_logs(name, listener).await
    }

    pub async fn unsubscribe(&self, subscription: Subscription) -> Result<(), CoreError> {
        self.inner.channels.unsubscribe(subscription).await
    }

    // ── Topics ───────────────────────────────────────────────────────

    pub async fn subscribe_topic<F>(
        &self,
        source: PubSubSource,
        topic_filter: &str,
        listener: F,
    ) -> Result<TopicHandle, CoreError>
    where
        F: Fn(&CommunicationMessage) + Send + Sync + 'static,
    {
        self.inner.topics.subscribe(source, topic_filter, listener).await
    }

    pub async fn unsubscribe_topic(&self, handle: TopicHandle) -> Result<(), CoreError> {
        self.inner.topics.unsubscribe(handle).await
    }

    pub async fn publish(&self, destination: PubSubSource, topic: &str, payload: &str) -> Result<(), CoreError> {
        self.inner.topics.publish(destination, topic, payload).await
    }

    // ── Streams ──────────────────────────────────────────────────────

    pub async fn list_streams(&self) -> Result<Vec<String>, CoreError> {
        let response = self.stream_call(Call::StreamManagerListStreams, Vec::new()).await?;
        Ok(response.streams_list)
    }

    pub async fn describe_stream(&self, name: &str) -> Result<MessageStreamInfo, CoreError> {
        let response = self
            .stream_call(Call::StreamManagerDescribeStream, vec![name.to_owned()])
            .await?;
        response.message_stream_info.ok_or_else(|| CoreError::NotFound {
            entity_type: "Stream".into(),
            identifier: name.to_owned(),
        })
    }

    pub async fn delete_stream(&self, name: &str) -> Result<(), CoreError> {
        self.stream_call(Call::StreamManagerDeleteMessageStream, vec![name.to_owned()])
            .await?;
        Ok(())
    }

    pub async fn read_messages(
        &self,
        name: &str,
        options: ReadMessagesOptions,
    ) -> Result<Vec<StreamMessage>, CoreError> {
        let response = self
            .stream_call(Call::StreamManagerReadMessages, options.to_args(name))
            .await?;
        Ok(response.messages_list)
    }

    /// Append `payload` as one message. The backend stores its UTF-8 bytes.
    pub async fn append_message(&self, name: &str, payload: &str) -> Result<(), CoreError> {
        self.stream_call(
            Call::StreamManagerAppendMessage,
            vec![name.to_owned(), payload.to_owned()],
        )
        .await?;
        Ok(())
    }

    pub async fn create_stream(&self, definition: &MessageStreamDefinition) -> Result<(), CoreError> {
        let arg = serde_json::to_string(definition)?;
        self.stream_call(Call::StreamManagerCreateMessageStream, vec![arg])
            .await?;
        Ok(())
    }

    pub async fn update_stream(&self, definition: &MessageStreamDefinition) -> Result<(), CoreError> {
        let arg = serde_json::to_string(definition)?;
        self.stream_call(Call::StreamManagerUpdateMessageStream, vec![arg])
            .await?;
        Ok(())
    }

    // ── Internals ────────────────────────────────────────────────────

    async fn typed<T: DeserializeOwned>(&self, call: Call, args: Vec<String>) -> Result<T, CoreError> {
        let payload = self.request(call, args).await?;
        decode(call, &payload)
    }

    async fn lifecycle(&self, call: Call, name: &str) -> Result<(), CoreError> {
        let payload = self.request(call, vec![name.to_owned()]).await?;
        match payload {
            Value::Bool(false) => Err(component_not_found(name)),
            other => expect_ack(call, other),
        }
    }

    async fn stream_call(&self, call: Call, args: Vec<String>) -> Result<StreamManagerResponse, CoreError> {
        let response: StreamManagerResponse = self.typed(call, args).await?;
        if response.successful {
            Ok(response)
        } else {
            Err(CoreError::OperationFailed {
                message: response
                    .error_msg
                    .unwrap_or_else(|| format!("{call} failed")),
            })
        }
    }
}

fn decode<T: DeserializeOwned>(call: Call, payload: &Value) -> Result<T, CoreError> {
    T::deserialize(payload).map_err(|e| {
        tracing::debug!(%call, error = %e, "response did not match the expected shape");
        CoreError::UnexpectedResponse {
            call: call.to_string(),
            payload: payload.to_string(),
        }
    })
}

fn component_not_found(name: &str) -> CoreError {
    CoreError::NotFound {
        entity_type: "Component".into(),
        identifier: name.to_owned(),
    }
}
