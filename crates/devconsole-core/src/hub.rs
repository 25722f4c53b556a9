// ── Push hub ──
//
// Routes every decoded push to the cache and to the listeners registered
// for its channel and key. Registration and routing share one lock so a
// subscribe can check, register and decide on its one underlying request
// atomically. Listeners are always invoked after the lock is released.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use devconsole_api::push::{Push, PushHandler};
use devconsole_api::types::{CommunicationMessage, ComponentItem, LogEntry};

use crate::cache::{DependencyGraph, PushCache};
use crate::error::CoreError;
use crate::listeners::{Join, KeyedListeners, Listener, ListenerId, ListenerSet, Removal};
use crate::multiplexer::Channel;

/// Result of joining a cached channel.
pub(crate) struct CachedJoin<C> {
    pub id: ListenerId,
    /// Snapshot to hand the new listener right away.
    pub replay: Option<Arc<C>>,
    /// `First` means nothing is cached yet: ask for a force-push.
    pub join: Join,
}

#[derive(Default)]
struct HubState {
    cache: PushCache,
    component_list: ListenerSet<[ComponentItem]>,
    dependency_graph: ListenerSet<DependencyGraph>,
    components: KeyedListeners<ComponentItem>,
    logs: KeyedListeners<LogEntry>,
    topics: KeyedListeners<CommunicationMessage>,
}

/// Push router shared by the connection driver and the subscription layer.
#[derive(Default)]
pub struct Hub {
    state: Mutex<HubState>,
}

impl Hub {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    // ── Cache reads ──────────────────────────────────────────────────

    pub fn cached_component_list(&self) -> Option<Arc<Vec<ComponentItem>>> {
        self.lock().cache.component_list()
    }

    pub fn cached_dependency_graph(&self) -> Option<Arc<DependencyGraph>> {
        self.lock().cache.dependency_graph()
    }

    // ── Cached channels ──────────────────────────────────────────────

    pub(crate) fn join_component_list(
        &self,
        listener: Listener<[ComponentItem]>,
    ) -> CachedJoin<Vec<ComponentItem>> {
        let mut state = self.lock();
        let replay = state.cache.component_list();
        let (id, join) = state.component_list.join(listener, replay.is_none());
        CachedJoin { id, replay, join }
    }

    pub(crate) fn leave_component_list(&self, id: ListenerId) -> bool {
        self.lock().component_list.remove(id)
    }

    pub(crate) fn join_dependency_graph(
        &self,
        listener: Listener<DependencyGraph>,
    ) -> CachedJoin<DependencyGraph> {
        let mut state = self.lock();
        let replay = state.cache.dependency_graph();
        let (id, join) = state.dependency_graph.join(listener, replay.is_none());
        CachedJoin { id, replay, join }
    }

    pub(crate) fn leave_dependency_graph(&self, id: ListenerId) -> bool {
        self.lock().dependency_graph.remove(id)
    }

    // ── Keyed channels ───────────────────────────────────────────────

    pub(crate) fn join_component(&self, name: &str, listener: Listener<ComponentItem>) -> (ListenerId, Join) {
        self.lock().components.join(name, listener)
    }

    pub(crate) fn leave_component(&self, name: &str, id: ListenerId) -> Removal {
        self.lock().components.remove(name, id)
    }

    pub(crate) fn join_logs(&self, name: &str, listener: Listener<LogEntry>) -> (ListenerId, Join) {
        self.lock().logs.join(name, listener)
    }

    /// Record the outcome of the request that armed `channel`, releasing
    /// every listener that joined while it was in flight.
    pub(crate) fn settle(&self, channel: &Channel, outcome: Result<(), CoreError>) {
        let mut state = self.lock();
        match channel {
            Channel::ComponentList => state.component_list.settle(outcome),
            Channel::DependencyGraph => state.dependency_graph.settle(outcome),
            Channel::Component(name) => state.components.settle(name, outcome),
            Channel::ComponentLogs(name) => state.logs.settle(name, outcome),
        }
    }

    pub(crate) fn leave_logs(&self, name: &str, id: ListenerId) -> Removal {
        self.lock().logs.remove(name, id)
    }

    // ── Topics ───────────────────────────────────────────────────────

    pub(crate) fn join_live_topic(
        &self,
        sub_id: &str,
        listener: Listener<CommunicationMessage>,
    ) -> Option<ListenerId> {
        self.lock().topics.insert_if_live(sub_id, listener)
    }

    pub(crate) fn join_topic(&self, sub_id: &str, listener: Listener<CommunicationMessage>) -> ListenerId {
        self.lock().topics.insert(sub_id, listener).0
    }

    pub(crate) fn leave_topic(&self, sub_id: &str, id: ListenerId) -> Removal {
        self.lock().topics.remove(sub_id, id)
    }

    /// Number of listeners on a keyed channel or topic.
    pub fn listener_count(&self, push_key: &PushKey<'_>) -> usize {
        let state = self.lock();
        match push_key {
            PushKey::ComponentList => state.component_list.len(),
            PushKey::DependencyGraph => state.dependency_graph.len(),
            PushKey::Component(name) => state.components.len(name),
            PushKey::ComponentLogs(name) => state.logs.len(name),
            PushKey::Topic(sub_id) => state.topics.len(sub_id),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HubState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Addresses one listener registry of the hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushKey<'a> {
    ComponentList,
    DependencyGraph,
    Component(&'a str),
    ComponentLogs(&'a str),
    Topic(&'a str),
}

// ── Routing ──────────────────────────────────────────────────────────

impl PushHandler for Hub {
    fn on_push(&self, push: Push) {
        match push {
            Push::ComponentList(list) => {
                let (list, listeners) = {
                    let mut state = self.lock();
                    let list = state.cache.replace_component_list(list);
                    (list, state.component_list.snapshot())
                };
                tracing::trace!(components = list.len(), listeners = listeners.len(), "component list push");
                for listener in listeners {
                    listener(list.as_slice());
                }
            }
            Push::DependencyGraph(nodes) => {
                let (graph, listeners) = {
                    let mut state = self.lock();
                    let graph = state.cache.replace_dependency_graph(nodes);
                    (graph, state.dependency_graph.snapshot())
                };
                tracing::trace!(nodes = graph.len(), listeners = listeners.len(), "dependency graph push");
                for listener in listeners {
                    listener(&graph);
                }
            }
            Push::ComponentChange(item) => {
                let listeners = self.lock().components.snapshot(&item.name);
                fan_out("component", &item.name, &listeners, &item);
            }
            Push::ComponentLog(entry) => {
                let listeners = self.lock().logs.snapshot(&entry.name);
                fan_out("logs", &entry.name, &listeners, &entry);
            }
            Push::PubSub(message) => {
                let listeners = self.lock().topics.snapshot(&message.sub_id);
                fan_out("topic", &message.sub_id, &listeners, &message);
            }
        }
    }
}

fn fan_out<T>(channel: &str, key: &str, listeners: &[Listener<T>], value: &T) {
    if listeners.is_empty() {
        tracing::trace!(channel, key, "push without listeners, dropping");
        return;
    }
    for listener in listeners {
        listener(value);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use devconsole_api::types::{DepGraphNode, LogLevel};

    fn item(name: &str, status: &str) -> ComponentItem {
        ComponentItem {
            name: name.into(),
            status: status.into(),
            ..ComponentItem::default()
        }
    }

    #[test]
    fn first_list_listener_without_cache_asks_for_force_push() {
        let hub = Hub::new();

        let first = hub.join_component_list(Arc::new(|_: &[ComponentItem]| {}));
        assert!(matches!(first.join, Join::First));
        assert!(first.replay.is_none());

        let second = hub.join_component_list(Arc::new(|_: &[ComponentItem]| {}));
        assert!(
            matches!(second.join, Join::Pending(_)),
            "a force-push is already on its way"
        );
    }

    #[test]
    fn failed_force_push_drops_everyone_who_waited() {
        let hub = Hub::new();
        hub.join_component_list(Arc::new(|_: &[ComponentItem]| {}));
        hub.join_component_list(Arc::new(|_: &[ComponentItem]| {}));

        hub.settle(&Channel::ComponentList, Err(CoreError::NotConnected));

        assert_eq!(hub.listener_count(&PushKey::ComponentList), 0);
        let retry = hub.join_component_list(Arc::new(|_: &[ComponentItem]| {}));
        assert!(matches!(retry.join, Join::First));
    }

    #[test]
    fn list_push_fills_cache_and_reaches_listeners() {
        let hub = Hub::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        hub.join_component_list(Arc::new(move |list: &[ComponentItem]| {
            sink.lock().unwrap().push(list.len());
        }));

        hub.on_push(Push::ComponentList(vec![item("main", "RUNNING"), item("logger", "RUNNING")]));

        assert_eq!(*seen.lock().unwrap(), [2]);
        assert_eq!(hub.cached_component_list().unwrap().len(), 2);

        hub.settle(&Channel::ComponentList, Ok(()));
        let late = hub.join_component_list(Arc::new(|_: &[ComponentItem]| {}));
        assert!(matches!(late.join, Join::Live));
        assert_eq!(late.replay.unwrap().len(), 2);
    }

    #[test]
    fn graph_push_rebuilds_mapping() {
        let hub = Hub::new();
        hub.on_push(Push::DependencyGraph(vec![DepGraphNode {
            name: "main".into(),
            children: Vec::new(),
        }]));

        let graph = hub.cached_dependency_graph().unwrap();
        assert!(graph.contains_key("main"));
    }

    #[test]
    fn keyed_pushes_reach_only_their_key() {
        let hub = Hub::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&seen);
        hub.join_component(
            "main",
            Arc::new(move |c: &ComponentItem| sink.lock().unwrap().push(c.status.clone())),
        );
        let sink = Arc::clone(&seen);
        hub.join_logs(
            "main",
            Arc::new(move |l: &LogEntry| sink.lock().unwrap().push(l.log.clone())),
        );

        hub.on_push(Push::ComponentChange(item("main", "FINISHED")));
        hub.on_push(Push::ComponentChange(item("other", "BROKEN")));
        hub.on_push(Push::ComponentLog(LogEntry {
            name: "main".into(),
            level: LogLevel::Info,
            log: "started".into(),
        }));

        assert_eq!(*seen.lock().unwrap(), ["FINISHED", "started"]);
    }

    #[test]
    fn listener_may_unsubscribe_during_fan_out() {
        let hub = Hub::new();
        let id = Arc::new(Mutex::new(None));

        let (hub2, id2) = (Arc::clone(&hub), Arc::clone(&id));
        let (listener_id, _) = hub.join_component(
            "main",
            Arc::new(move |_: &ComponentItem| {
                if let Some(id) = *id2.lock().unwrap() {
                    hub2.leave_component("main", id);
                }
            }),
        );
        *id.lock().unwrap() = Some(listener_id);

        hub.on_push(Push::ComponentChange(item("main", "RUNNING")));
        assert_eq!(hub.listener_count(&PushKey::Component("main")), 0);
    }
}
