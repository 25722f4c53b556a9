// ── Topic pub/sub bridge ──
//
// Subscriptions to dynamically named topics on the local broker or the
// cloud connection. Unlike the fixed channels, a topic listener is only
// retained once the backend accepts the subscribe, so subscribes and
// unsubscribes of one subscription id are serialized through that id's
// gate: a second subscriber for a key whose subscribe is still in flight
// waits for its outcome instead of sending a duplicate. Other ids proceed.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError};

use devconsole_api::Call;
use devconsole_api::types::{Ack, CommunicationMessage, PubSubSource, TopicPublication, TopicSubscription};
use tokio::sync::Mutex;

use crate::error::CoreError;
use crate::hub::Hub;
use crate::listeners::{Listener, ListenerId, Removal};
use crate::multiplexer::{Requester, expect_ack};

/// Subscription id for a (source, filter) pair. Repeat subscriptions to
/// the same pair share one server-side subscription.
pub fn subscription_id(source: PubSubSource, topic_filter: &str) -> String {
    format!("{source}{topic_filter}")
}

/// Handle returned by [`TopicBridge::subscribe`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "dropping a topic handle leaves its listener registered"]
pub struct TopicHandle {
    sub_id: String,
    listener: ListenerId,
}

impl TopicHandle {
    pub fn sub_id(&self) -> &str {
        &self.sub_id
    }
}

pub struct TopicBridge<R> {
    requester: R,
    hub: Arc<Hub>,
    gates: std::sync::Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl<R: Requester> TopicBridge<R> {
    pub fn new(requester: R, hub: Arc<Hub>) -> Self {
        Self {
            requester,
            hub,
            gates: std::sync::Mutex::default(),
        }
    }

    fn gate(&self, sub_id: &str) -> Arc<Mutex<()>> {
        let mut gates = self.gates.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(gates.entry(sub_id.to_owned()).or_default())
    }

    /// Subscribe `listener` to `topic_filter` on `source`.
    ///
    /// If the backend rejects the subscribe, nothing is retained and the
    /// rejection is returned.
    pub async fn subscribe<F>(
        &self,
        source: PubSubSource,
        topic_filter: &str,
        listener: F,
    ) -> Result<TopicHandle, CoreError>
    where
        F: Fn(&CommunicationMessage) + Send + Sync + 'static,
    {
        let sub_id = subscription_id(source, topic_filter);
        let listener: Listener<CommunicationMessage> = Arc::new(listener);
        let gate = self.gate(&sub_id);
        let _turn = gate.lock().await;

        if let Some(id) = self.hub.join_live_topic(&sub_id, Arc::clone(&listener)) {
            tracing::debug!(sub_id = %sub_id, "topic already subscribed, joining");
            return Ok(TopicHandle { sub_id, listener: id });
        }

        let arg = serde_json::to_string(&TopicSubscription {
            sub_id: sub_id.clone(),
            topic_filter: topic_filter.to_owned(),
            source,
        })?;
        let payload = self
            .requester
            .request(Call::SubscribeToPubSubTopic, vec![arg])
            .await?;

        if let Err(e) = expect_ack(Call::SubscribeToPubSubTopic, payload) {
            tracing::warn!(sub_id = %sub_id, error = %e, "topic subscribe refused");
            return Err(e);
        }

        let id = self.hub.join_topic(&sub_id, listener);
        tracing::info!(sub_id = %sub_id, "subscribed to topic");
        Ok(TopicHandle { sub_id, listener: id })
    }

    /// Remove the listener behind `handle`; the last one out unsubscribes
    /// on the backend. Unknown or repeated handles are a no-op.
    pub async fn unsubscribe(&self, handle: TopicHandle) -> Result<(), CoreError> {
        let TopicHandle { sub_id, listener } = handle;
        let gate = self.gate(&sub_id);
        let _turn = gate.lock().await;

        match self.hub.leave_topic(&sub_id, listener) {
            Removal::Emptied => {}
            Removal::Remaining(_) | Removal::Unknown => return Ok(()),
        }

        tracing::debug!(sub_id = %sub_id, "last topic listener gone, unsubscribing");
        let payload = self
            .requester
            .request(Call::UnsubscribeToPubSubTopic, vec![sub_id])
            .await?;
        expect_ack(Call::UnsubscribeToPubSubTopic, payload)
    }

    /// Publish `payload` to `topic` on `destination`.
    ///
    /// A string answer from the backend is its failure message and comes
    /// back as [`CoreError::Rejected`]. Any other answer counts as sent.
    pub async fn publish(
        &self,
        destination: PubSubSource,
        topic: &str,
        payload: &str,
    ) -> Result<(), CoreError> {
        let arg = serde_json::to_string(&TopicPublication {
            topic: topic.to_owned(),
            payload: payload.to_owned(),
            destination,
        })?;
        let answer = self
            .requester
            .request(Call::PublishToPubSubTopic, vec![arg])
            .await?;
        match Ack::from(answer) {
            Ack::Rejected(message) => Err(CoreError::Rejected { message }),
            Ack::Accepted | Ack::Other(_) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscription_id_is_source_then_filter() {
        assert_eq!(subscription_id(PubSubSource::Local, "sensors/#"), "pubsubsensors/#");
        assert_eq!(subscription_id(PubSubSource::IotCore, "a/b"), "iotcorea/b");
    }
}
