// ── Subscription multiplexer ──
//
// Many local listeners per push channel, one underlying subscription per
// channel key. The hub decides under its lock whether a subscribe is the
// first for its key; only that caller fires the underlying request, and
// nothing awaits between the decision and queueing the frame. Callers that
// join while that request is in flight wait for its outcome and share it.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use devconsole_api::types::{Ack, ComponentItem, LogEntry};
use devconsole_api::{Call, Connection, PendingResponse};
use serde_json::Value;

use crate::cache::DependencyGraph;
use crate::error::CoreError;
use crate::hub::Hub;
use crate::listeners::{self, Join, Listener, ListenerId, Removal};

// ── Requester ────────────────────────────────────────────────────────

/// The request side of a connection, as seen by the subscription layer.
pub trait Requester: Send + Sync {
    /// Resolves once the connection can carry requests.
    fn ready(&self) -> impl Future<Output = Result<(), devconsole_api::Error>> + Send;

    /// Queue one request frame without waiting.
    fn send(&self, call: Call, args: Vec<String>) -> Result<PendingResponse, devconsole_api::Error>;

    /// Await readiness, send, and await the response.
    fn request(
        &self,
        call: Call,
        args: Vec<String>,
    ) -> impl Future<Output = Result<Value, devconsole_api::Error>> + Send {
        async move {
            self.ready().await?;
            self.send(call, args)?.response().await
        }
    }
}

impl Requester for Connection {
    fn ready(&self) -> impl Future<Output = Result<(), devconsole_api::Error>> + Send {
        self.init_connections()
    }

    fn send(&self, call: Call, args: Vec<String>) -> Result<PendingResponse, devconsole_api::Error> {
        Connection::send(self, call, args)
    }

    fn request(
        &self,
        call: Call,
        args: Vec<String>,
    ) -> impl Future<Output = Result<Value, devconsole_api::Error>> + Send {
        self.send_request(call, args)
    }
}

/// Interpret a `true`-or-message answer.
pub(crate) fn expect_ack(call: Call, payload: Value) -> Result<(), CoreError> {
    match Ack::from(payload) {
        Ack::Accepted => Ok(()),
        Ack::Rejected(message) => Err(CoreError::Rejected { message }),
        Ack::Other(payload) => Err(CoreError::UnexpectedResponse {
            call: call.to_string(),
            payload: payload.to_string(),
        }),
    }
}

// ── Channel ──────────────────────────────────────────────────────────

/// One push channel and its key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Channel {
    ComponentList,
    DependencyGraph,
    /// Status changes of the named component.
    Component(String),
    /// Log lines of the named component.
    ComponentLogs(String),
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ComponentList => f.write_str("componentList"),
            Self::DependencyGraph => f.write_str("dependencyGraph"),
            Self::Component(name) => write!(f, "component:{name}"),
            Self::ComponentLogs(name) => write!(f, "componentLogs:{name}"),
        }
    }
}

/// Handle returned by every channel subscribe. Pass it back to
/// [`Multiplexer::unsubscribe`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "dropping a subscription handle leaves its listener registered"]
pub struct Subscription {
    channel: Channel,
    listener: ListenerId,
}

impl Subscription {
    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    pub fn listener(&self) -> ListenerId {
        self.listener
    }
}

// ── Multiplexer ──────────────────────────────────────────────────────

pub struct Multiplexer<R> {
    requester: R,
    hub: Arc<Hub>,
}

impl<R: Requester> Multiplexer<R> {
    pub fn new(requester: R, hub: Arc<Hub>) -> Self {
        Self { requester, hub }
    }

    pub fn hub(&self) -> &Arc<Hub> {
        &self.hub
    }

    pub fn requester(&self) -> &R {
        &self.requester
    }

    /// Observe the component table.
    ///
    /// With data cached, `listener` is called with it before this returns
    /// and no request is made. Otherwise the first subscriber triggers one
    /// force-push and every listener receives the list when it arrives.
    pub async fn subscribe_component_list<F>(&self, listener: F) -> Result<Subscription, CoreError>
    where
        F: Fn(&[ComponentItem]) + Send + Sync + 'static,
    {
        self.requester.ready().await?;

        let listener: Listener<[ComponentItem]> = Arc::new(listener);
        let joined = self.hub.join_component_list(Arc::clone(&listener));
        if let Some(list) = &joined.replay {
            listener(list.as_slice());
        }

        let subscription = Subscription {
            channel: Channel::ComponentList,
            listener: joined.id,
        };
        self.settle(&subscription.channel, joined.join, Call::ForcePushComponentList, Vec::new())
            .await?;
        Ok(subscription)
    }

    /// Observe the dependency graph. Same cache semantics as
    /// [`subscribe_component_list`](Self::subscribe_component_list).
    pub async fn subscribe_dependency_graph<F>(&self, listener: F) -> Result<Subscription, CoreError>
    where
        F: Fn(&DependencyGraph) + Send + Sync + 'static,
    {
        self.requester.ready().await?;

        let listener: Listener<DependencyGraph> = Arc::new(listener);
        let joined = self.hub.join_dependency_graph(Arc::clone(&listener));
        if let Some(graph) = &joined.replay {
            listener(&**graph);
        }

        let subscription = Subscription {
            channel: Channel::DependencyGraph,
            listener: joined.id,
        };
        self.settle(&subscription.channel, joined.join, Call::ForcePushDependencyGraph, Vec::new())
            .await?;
        Ok(subscription)
    }

    /// Observe status changes of the component `name`.
    pub async fn subscribe_component<F>(&self, name: &str, listener: F) -> Result<Subscription, CoreError>
    where
        F: Fn(&ComponentItem) + Send + Sync + 'static,
    {
        self.requester.ready().await?;

        let (id, join) = self.hub.join_component(name, Arc::new(listener));
        let subscription = Subscription {
            channel: Channel::Component(name.to_owned()),
            listener: id,
        };
        self.settle(&subscription.channel, join, Call::SubscribeToComponent, vec![name.to_owned()])
            .await?;
        Ok(subscription)
    }

    /// Observe log lines of the component `name`.
    pub async fn subscribe_component_logs<F>(&self, name: &str, listener: F) -> Result<Subscription, CoreError>
    where
        F: Fn(&LogEntry) + Send + Sync + 'static,
    {
        self.requester.ready().await?;

        let (id, join) = self.hub.join_logs(name, Arc::new(listener));
        let subscription = Subscription {
            channel: Channel::ComponentLogs(name.to_owned()),
            listener: id,
        };
        self.settle(&subscription.channel, join, Call::SubscribeToComponentLogs, vec![name.to_owned()])
            .await?;
        Ok(subscription)
    }

    /// Stop delivering to the listener behind `subscription`.
    ///
    /// The underlying unsubscribe is sent only when this removes the last
    /// listener of a keyed channel. Unknown or already removed handles are
    /// a no-op. The list and graph channels have no server-side stream, so
    /// leaving them is local.
    pub async fn unsubscribe(&self, subscription: Subscription) -> Result<(), CoreError> {
        let Subscription { channel, listener } = subscription;

        let (call, name) = match channel {
            Channel::ComponentList => {
                self.hub.leave_component_list(listener);
                return Ok(());
            }
            Channel::DependencyGraph => {
                self.hub.leave_dependency_graph(listener);
                return Ok(());
            }
            Channel::Component(name) => match self.hub.leave_component(&name, listener) {
                Removal::Emptied => (Call::UnsubscribeToComponent, name),
                Removal::Remaining(_) | Removal::Unknown => return Ok(()),
            },
            Channel::ComponentLogs(name) => match self.hub.leave_logs(&name, listener) {
                Removal::Emptied => (Call::UnsubscribeToComponentLogs, name),
                Removal::Remaining(_) | Removal::Unknown => return Ok(()),
            },
        };

        tracing::debug!(%call, component = %name, "last listener gone, unsubscribing");
        let payload = self.requester.request(call, vec![name]).await?;
        expect_ack(call, payload)
    }

    // ── Internals ────────────────────────────────────────────────────

    /// Finish a join: the first caller sends the one permitted request and
    /// settles the channel with its outcome; callers that joined while it
    /// was in flight wait for that outcome.
    async fn settle(&self, channel: &Channel, join: Join, call: Call, args: Vec<String>) -> Result<(), CoreError> {
        match join {
            Join::Live => Ok(()),
            Join::Pending(outcome) => {
                tracing::debug!(%channel, "underlying subscribe in flight, waiting");
                listeners::joined(outcome).await
            }
            Join::First => {
                let arming = Arming {
                    hub: &self.hub,
                    channel,
                    settled: false,
                };
                let outcome = self.fire(call, args).await;
                arming.settle(outcome.clone());
                outcome
            }
        }
    }

    async fn fire(&self, call: Call, args: Vec<String>) -> Result<(), CoreError> {
        tracing::debug!(%call, "first listener, subscribing");
        let outcome = match self.requester.send(call, args) {
            Ok(pending) => pending
                .response()
                .await
                .map_err(CoreError::from)
                .and_then(|payload| expect_ack(call, payload)),
            Err(e) => Err(CoreError::from(e)),
        };
        if let Err(e) = &outcome {
            tracing::warn!(%call, error = %e, "underlying subscribe failed, dropping its listeners");
        }
        outcome
    }
}

/// Settles an armed channel exactly once. If the first caller's future is
/// dropped mid-flight, the channel fails so nobody waits forever.
struct Arming<'a> {
    hub: &'a Hub,
    channel: &'a Channel,
    settled: bool,
}

impl Arming<'_> {
    fn settle(mut self, outcome: Result<(), CoreError>) {
        self.settled = true;
        self.hub.settle(self.channel, outcome);
    }
}

impl Drop for Arming<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.hub.settle(
                self.channel,
                Err(CoreError::Internal("subscribe was cancelled".into())),
            );
        }
    }
}
