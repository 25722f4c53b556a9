//! Request id allocation and response correlation.
//!
//! Every outbound request is registered under its id before the frame is
//! written. The driver resolves the entry when a matching response
//! arrives; otherwise the caller's deadline expires and the entry is
//! evicted. Whichever happens first wins and the other is a no-op.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::oneshot;
use tokio::time::Instant;

use crate::error::Error;
use crate::protocol::{MAX_SAFE_INTEGER, RequestId};

// ── RequestIdGenerator ───────────────────────────────────────────────

/// Hands out request ids `1, 2, 3, ...`, wrapping back to 1 after
/// [`MAX_SAFE_INTEGER`].
///
/// One generator per session, shared by `Arc`. Two generators never
/// coordinate, so ids are only unique within one session.
#[derive(Debug, Default)]
pub struct RequestIdGenerator {
    last: AtomicI64,
}

impl RequestIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// A generator whose next id is `last + 1`.
    pub fn starting_after(last: i64) -> Self {
        Self {
            last: AtomicI64::new(last),
        }
    }

    pub fn next_id(&self) -> RequestId {
        let step = |last: i64| if last < MAX_SAFE_INTEGER { last + 1 } else { 1 };
        let (Ok(previous) | Err(previous)) =
            self.last
                .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |last| Some(step(last)));
        RequestId::new(step(previous))
    }
}

// ── Correlator ───────────────────────────────────────────────────────

type Outcome = Result<Value, String>;

/// Table of in-flight requests.
#[derive(Debug)]
pub struct Correlator {
    pending: Mutex<HashMap<RequestId, oneshot::Sender<Outcome>>>,
    timeout: Duration,
}

impl Correlator {
    pub fn new(timeout: Duration) -> Arc<Self> {
        Arc::new(Self {
            pending: Mutex::new(HashMap::new()),
            timeout,
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Track a request. The returned handle's deadline starts now.
    pub fn register(self: &Arc<Self>, id: RequestId) -> PendingResponse {
        let (tx, rx) = oneshot::channel();
        if self.table().insert(id, tx).is_some() {
            tracing::debug!(request_id = %id, "request id reused while still pending");
        }
        PendingResponse {
            id,
            rx,
            deadline: Instant::now() + self.timeout,
            timeout: self.timeout,
            correlator: Arc::downgrade(self),
        }
    }

    /// Settle the request `id` with `payload`.
    ///
    /// Returns `false` when nothing is waiting for `id`, e.g. because it
    /// already timed out.
    pub fn resolve(&self, id: RequestId, payload: Value) -> bool {
        let Some(tx) = self.table().remove(&id) else {
            tracing::debug!(request_id = %id, "response for unknown request, dropping");
            return false;
        };
        // The receiver may have been dropped by an impatient caller.
        tx.send(Ok(payload)).is_ok()
    }

    /// Reject every pending request with `reason`.
    pub fn fail_all(&self, reason: &str) {
        let drained: Vec<_> = self.table().drain().collect();
        if !drained.is_empty() {
            tracing::debug!(count = drained.len(), "failing pending requests");
        }
        for (_, tx) in drained {
            let _ = tx.send(Err(reason.to_owned()));
        }
    }

    /// Forget `id` without settling it.
    pub fn evict(&self, id: RequestId) {
        self.table().remove(&id);
    }

    pub fn pending_len(&self) -> usize {
        self.table().len()
    }

    fn table(&self) -> MutexGuard<'_, HashMap<RequestId, oneshot::Sender<Outcome>>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ── PendingResponse ──────────────────────────────────────────────────

/// Handle to one in-flight request.
#[derive(Debug)]
#[must_use = "a pending response does nothing unless awaited"]
pub struct PendingResponse {
    id: RequestId,
    rx: oneshot::Receiver<Outcome>,
    deadline: Instant,
    timeout: Duration,
    correlator: Weak<Correlator>,
}

impl PendingResponse {
    pub fn id(&self) -> RequestId {
        self.id
    }

    /// Wait for the matching response or the deadline, whichever is first.
    pub async fn response(self) -> Result<Value, Error> {
        let Self {
            id,
            rx,
            deadline,
            timeout,
            correlator,
        } = self;

        match tokio::time::timeout_at(deadline, rx).await {
            Ok(Ok(Ok(payload))) => Ok(payload),
            Ok(Ok(Err(reason))) => Err(Error::ConnectionClosed { reason }),
            Ok(Err(_)) => Err(Error::ConnectionClosed {
                reason: "connection dropped".into(),
            }),
            Err(_) => {
                if let Some(correlator) = correlator.upgrade() {
                    correlator.evict(id);
                }
                tracing::debug!(request_id = %id, "request timed out");
                Err(Error::Timeout { timeout })
            }
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    use serde_json::json;

    #[tokio::test(start_paused = true)]
    async fn concurrent_ids_are_distinct_and_dense() {
        let ids = Arc::new(RequestIdGenerator::new());
        let mut handles = Vec::new();
        for n in 0..64u64 {
            let ids = Arc::clone(&ids);
            handles.push(tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(64 - n)).await;
                ids.next_id().get()
            }));
        }

        let mut seen = BTreeSet::new();
        for handle in handles {
            seen.insert(handle.await.unwrap());
        }
        assert_eq!(seen, (1..=64).collect::<BTreeSet<_>>());
    }

    #[test]
    fn ids_wrap_after_safe_integer_ceiling() {
        let ids = RequestIdGenerator::starting_after(MAX_SAFE_INTEGER - 1);
        assert_eq!(ids.next_id().get(), MAX_SAFE_INTEGER);
        assert_eq!(ids.next_id().get(), 1);
        assert_eq!(ids.next_id().get(), 2);
    }

    #[test]
    fn separate_generators_do_not_share_state() {
        let a = RequestIdGenerator::new();
        let b = RequestIdGenerator::new();
        assert_eq!(a.next_id().get(), 1);
        assert_eq!(a.next_id().get(), 2);
        assert_eq!(b.next_id().get(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn silent_request_times_out_with_duration_in_message() {
        let correlator = Correlator::new(Duration::from_secs(1));
        let pending = correlator.register(RequestId::new(1));
        let started = Instant::now();

        let err = pending.response().await.unwrap_err();

        assert_eq!(started.elapsed(), Duration::from_secs(1));
        assert_eq!(err.to_string(), "Request timed out in 1 seconds");
        assert_eq!(correlator.pending_len(), 0, "timed out entry is evicted");
    }

    #[tokio::test(start_paused = true)]
    async fn sub_second_timeout_keeps_its_fraction() {
        let correlator = Correlator::new(Duration::from_millis(500));
        let err = correlator.register(RequestId::new(7)).response().await.unwrap_err();

        assert!(matches!(err, Error::Timeout { timeout } if timeout == Duration::from_millis(500)));
        assert_eq!(err.to_string(), "Request timed out in 0.5 seconds");
    }

    #[tokio::test(start_paused = true)]
    async fn response_before_deadline_resolves() {
        let correlator = Correlator::new(Duration::from_secs(1));
        let pending = correlator.register(RequestId::new(5));

        let resolver = Arc::clone(&correlator);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(400)).await;
            assert!(resolver.resolve(RequestId::new(5), json!(true)));
        });

        assert_eq!(pending.response().await.unwrap(), json!(true));
    }

    #[tokio::test(start_paused = true)]
    async fn late_response_is_dropped() {
        let correlator = Correlator::new(Duration::from_secs(1));
        let pending = correlator.register(RequestId::new(9));
        assert!(pending.response().await.is_err());

        assert!(!correlator.resolve(RequestId::new(9), json!("late")));
    }

    #[tokio::test]
    async fn fail_all_rejects_every_waiter() {
        let correlator = Correlator::new(Duration::from_secs(5));
        let a = correlator.register(RequestId::new(1));
        let b = correlator.register(RequestId::new(2));

        correlator.fail_all("Server closed");

        for pending in [a, b] {
            match pending.response().await.unwrap_err() {
                Error::ConnectionClosed { reason } => assert_eq!(reason, "Server closed"),
                other => panic!("unexpected error: {other:?}"),
            }
        }
        assert_eq!(correlator.pending_len(), 0);
    }
}
