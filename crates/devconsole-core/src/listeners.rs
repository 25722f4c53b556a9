// ── Listener registries ──
//
// Typed callback sets keyed by an opaque `ListenerId`. Insertion order is
// preserved so fan-out follows registration order. Registries are plain
// data; the `Hub` owns them behind its lock.
//
// A set whose underlying request is still in flight is "arming": anyone
// joining it waits for that request's outcome, and a failure drops the
// whole set. A non-empty set that is not arming always has a live
// server-side subscription behind it.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use tokio::sync::watch;

use crate::error::CoreError;

/// A push callback. Invoked on the connection driver task; must not block.
pub type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Identifies one registered listener within its registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Outcome of removing a listener from a keyed registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    /// The key or the listener was not registered.
    Unknown,
    /// Removed; this many listeners remain under the key.
    Remaining(usize),
    /// Removed the last listener; the key is gone.
    Emptied,
}

/// Outcome of a set's underlying request. `None` while in flight.
pub type Outcome = Option<Result<(), CoreError>>;

/// How a new listener relates to its set's underlying request.
#[derive(Debug)]
pub enum Join {
    /// The caller must send the underlying request and settle the set.
    First,
    /// Nothing to send or wait for.
    Live,
    /// Another caller's request is in flight; wait for its outcome.
    Pending(watch::Receiver<Outcome>),
}

/// Wait until a pending set is settled.
pub async fn joined(mut outcome: watch::Receiver<Outcome>) -> Result<(), CoreError> {
    match outcome.wait_for(Option::is_some).await {
        Ok(settled) => (*settled).clone().unwrap_or(Ok(())),
        Err(_) => Err(CoreError::Internal("subscription attempt was abandoned".into())),
    }
}

fn arm() -> watch::Sender<Outcome> {
    watch::channel(None).0
}

// ── ListenerSet ──────────────────────────────────────────────────────

/// Listeners for one unkeyed channel.
pub struct ListenerSet<T: ?Sized> {
    last_id: u64,
    listeners: IndexMap<ListenerId, Listener<T>>,
    arming: Option<watch::Sender<Outcome>>,
}

impl<T: ?Sized> Default for ListenerSet<T> {
    fn default() -> Self {
        Self {
            last_id: 0,
            listeners: IndexMap::new(),
            arming: None,
        }
    }
}

impl<T: ?Sized> ListenerSet<T> {
    pub fn insert(&mut self, listener: Listener<T>) -> ListenerId {
        self.last_id += 1;
        let id = ListenerId(self.last_id);
        self.listeners.insert(id, listener);
        id
    }

    /// Register `listener`. `needs_request` says whether an empty set has
    /// to ask the backend for anything; the first such listener arms the
    /// set.
    pub fn join(&mut self, listener: Listener<T>, needs_request: bool) -> (ListenerId, Join) {
        let join = if let Some(arming) = &self.arming {
            Join::Pending(arming.subscribe())
        } else if needs_request && self.listeners.is_empty() {
            self.arming = Some(arm());
            Join::First
        } else {
            Join::Live
        };
        (self.insert(listener), join)
    }

    /// Record the outcome of the request that armed the set. A failure
    /// drops every listener, since they all joined while it was in flight.
    pub fn settle(&mut self, outcome: Result<(), CoreError>) {
        let Some(arming) = self.arming.take() else {
            return;
        };
        if outcome.is_err() {
            self.listeners.clear();
        }
        arming.send_replace(Some(outcome));
    }

    pub fn is_arming(&self) -> bool {
        self.arming.is_some()
    }

    /// Returns `false` if `id` was not registered.
    pub fn remove(&mut self, id: ListenerId) -> bool {
        self.listeners.shift_remove(&id).is_some()
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Clone out the listeners so they can be called without the lock.
    pub fn snapshot(&self) -> Vec<Listener<T>> {
        self.listeners.values().cloned().collect()
    }
}

// ── KeyedListeners ───────────────────────────────────────────────────

/// Listener sets per key (component name, subscription id).
///
/// Ids are unique across all keys of one registry, so a stale handle can
/// never remove a listener registered after its key was emptied.
pub struct KeyedListeners<T: ?Sized> {
    last_id: u64,
    sets: HashMap<String, IndexMap<ListenerId, Listener<T>>>,
    arming: HashMap<String, watch::Sender<Outcome>>,
}

impl<T: ?Sized> Default for KeyedListeners<T> {
    fn default() -> Self {
        Self {
            last_id: 0,
            sets: HashMap::new(),
            arming: HashMap::new(),
        }
    }
}

impl<T: ?Sized> KeyedListeners<T> {
    /// Register under `key`. The flag is `true` when `key` had no
    /// listeners before.
    pub fn insert(&mut self, key: &str, listener: Listener<T>) -> (ListenerId, bool) {
        self.last_id += 1;
        let id = ListenerId(self.last_id);
        let set = self.sets.entry(key.to_owned()).or_default();
        let first = set.is_empty();
        set.insert(id, listener);
        (id, first)
    }

    /// Register under `key`; the first listener of a key arms it.
    pub fn join(&mut self, key: &str, listener: Listener<T>) -> (ListenerId, Join) {
        let (id, first) = self.insert(key, listener);
        let join = if first {
            self.arming.insert(key.to_owned(), arm());
            Join::First
        } else if let Some(arming) = self.arming.get(key) {
            Join::Pending(arming.subscribe())
        } else {
            Join::Live
        };
        (id, join)
    }

    /// Record the outcome of the request that armed `key`. A failure drops
    /// the key with every listener that joined meanwhile.
    pub fn settle(&mut self, key: &str, outcome: Result<(), CoreError>) {
        let Some(arming) = self.arming.remove(key) else {
            return;
        };
        if outcome.is_err() {
            self.sets.remove(key);
        }
        arming.send_replace(Some(outcome));
    }

    pub fn is_arming(&self, key: &str) -> bool {
        self.arming.contains_key(key)
    }

    /// Register under `key` only if it already has listeners.
    pub fn insert_if_live(&mut self, key: &str, listener: Listener<T>) -> Option<ListenerId> {
        if !self.is_live(key) {
            return None;
        }
        Some(self.insert(key, listener).0)
    }

    pub fn remove(&mut self, key: &str, id: ListenerId) -> Removal {
        let Some(set) = self.sets.get_mut(key) else {
            return Removal::Unknown;
        };
        if set.shift_remove(&id).is_none() {
            return Removal::Unknown;
        }
        if set.is_empty() {
            self.sets.remove(key);
            Removal::Emptied
        } else {
            Removal::Remaining(set.len())
        }
    }

    /// Whether `key` has at least one listener.
    pub fn is_live(&self, key: &str) -> bool {
        self.sets.get(key).is_some_and(|set| !set.is_empty())
    }

    pub fn len(&self, key: &str) -> usize {
        self.sets.get(key).map_or(0, IndexMap::len)
    }

    pub fn snapshot(&self, key: &str) -> Vec<Listener<T>> {
        self.sets
            .get(key)
            .map(|set| set.values().cloned().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn recorder(log: &Arc<Mutex<Vec<String>>>, tag: &'static str) -> Listener<str> {
        let log = Arc::clone(log);
        Arc::new(move |msg: &str| log.lock().unwrap().push(format!("{tag}:{msg}")))
    }

    #[test]
    fn snapshot_preserves_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut set: ListenerSet<str> = ListenerSet::default();
        let a = set.insert(recorder(&log, "a"));
        set.insert(recorder(&log, "b"));
        set.insert(recorder(&log, "c"));
        assert!(set.remove(a));
        set.insert(recorder(&log, "a"));

        for listener in set.snapshot() {
            listener("x");
        }
        assert_eq!(*log.lock().unwrap(), ["b:x", "c:x", "a:x"]);
    }

    #[test]
    fn removing_twice_is_a_no_op() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut set: ListenerSet<str> = ListenerSet::default();
        let id = set.insert(recorder(&log, "a"));
        assert!(set.remove(id));
        assert!(!set.remove(id));
        assert!(set.is_empty());
    }

    #[test]
    fn keyed_reports_first_and_emptied() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut keyed: KeyedListeners<str> = KeyedListeners::default();

        let (a, first) = keyed.insert("main", recorder(&log, "a"));
        assert!(first);
        let (b, first) = keyed.insert("main", recorder(&log, "b"));
        assert!(!first);

        assert_eq!(keyed.remove("main", a), Removal::Remaining(1));
        assert_eq!(keyed.remove("main", a), Removal::Unknown);
        assert_eq!(keyed.remove("main", b), Removal::Emptied);
        assert_eq!(keyed.remove("main", b), Removal::Unknown);
        assert!(!keyed.is_live("main"));
    }

    #[test]
    fn stale_handle_cannot_remove_a_newer_listener() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut keyed: KeyedListeners<str> = KeyedListeners::default();

        let (old, _) = keyed.insert("main", recorder(&log, "old"));
        assert_eq!(keyed.remove("main", old), Removal::Emptied);
        let (_new, first) = keyed.insert("main", recorder(&log, "new"));
        assert!(first);

        assert_eq!(keyed.remove("main", old), Removal::Unknown);
        assert_eq!(keyed.len("main"), 1);
    }

    #[tokio::test]
    async fn joiners_share_the_first_outcome() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut keyed: KeyedListeners<str> = KeyedListeners::default();

        let (_, first) = keyed.join("main", recorder(&log, "a"));
        assert!(matches!(first, Join::First));
        let (_, second) = keyed.join("main", recorder(&log, "b"));
        let Join::Pending(outcome) = second else {
            panic!("second listener should wait");
        };

        keyed.settle("main", Ok(()));
        assert!(joined(outcome).await.is_ok());
        assert!(!keyed.is_arming("main"));

        let (_, third) = keyed.join("main", recorder(&log, "c"));
        assert!(matches!(third, Join::Live));
        assert_eq!(keyed.len("main"), 3);
    }

    #[tokio::test]
    async fn failed_request_drops_the_whole_key() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut keyed: KeyedListeners<str> = KeyedListeners::default();

        keyed.join("main", recorder(&log, "a"));
        let (_, second) = keyed.join("main", recorder(&log, "b"));
        let Join::Pending(outcome) = second else {
            panic!("second listener should wait");
        };

        keyed.settle("main", Err(CoreError::Rejected { message: "nope".into() }));
        assert!(matches!(joined(outcome).await, Err(CoreError::Rejected { .. })));
        assert!(!keyed.is_live("main"));

        // the key starts over
        let (_, retry) = keyed.join("main", recorder(&log, "c"));
        assert!(matches!(retry, Join::First));
    }

    #[tokio::test]
    async fn failed_set_request_clears_its_listeners() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut set: ListenerSet<str> = ListenerSet::default();

        let (_, first) = set.join(recorder(&log, "a"), true);
        assert!(matches!(first, Join::First));
        assert!(set.is_arming());
        let (_, second) = set.join(recorder(&log, "b"), true);
        let Join::Pending(outcome) = second else {
            panic!("second listener should wait");
        };

        set.settle(Err(CoreError::NotConnected));
        assert!(matches!(joined(outcome).await, Err(CoreError::NotConnected)));
        assert!(set.is_empty());
    }

    #[test]
    fn set_with_data_never_arms() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut set: ListenerSet<str> = ListenerSet::default();
        let (_, join) = set.join(recorder(&log, "a"), false);
        assert!(matches!(join, Join::Live));
        assert!(!set.is_arming());
    }

    #[test]
    fn insert_if_live_requires_an_existing_listener() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut keyed: KeyedListeners<str> = KeyedListeners::default();

        assert!(keyed.insert_if_live("sub", recorder(&log, "a")).is_none());
        keyed.insert("sub", recorder(&log, "a"));
        assert!(keyed.insert_if_live("sub", recorder(&log, "b")).is_some());
        assert_eq!(keyed.len("sub"), 2);
    }
}
