//! Approval queue: pending requests and their resolutions.
//!
//! A request lives under `pending:{id}` until exactly one consumer removes it,
//! together with any `result:{id}`. A resolution that arrives after the
//! pending record is gone is orphaned and dropped.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::Mutex;
use tracing::{debug, info};

use burnerkit_core::{keyspace, Clock, Network};
use burnerkit_store::{KvStore, StoreExt};

use crate::error::Result;

/// Correlation key for a pending request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
    /// A fresh random id.
    pub fn new() -> Self {
        Self(hex::encode(rand::random::<[u8; 16]>()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RequestId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for RequestId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// What the page is asking for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PendingPayload {
    Connect {
        network: Network,
    },
    SignMessage {
        network: Network,
        index: u32,
        address: String,
        message: Vec<u8>,
    },
}

impl PendingPayload {
    pub fn network(&self) -> Network {
        match self {
            PendingPayload::Connect { network } | PendingPayload::SignMessage { network, .. } => {
                *network
            }
        }
    }
}

/// A request awaiting a decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingRequest {
    pub id: RequestId,
    pub origin: String,
    pub payload: PendingPayload,
    /// Unix ms.
    pub requested_at: i64,
}

/// The user's decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalResult {
    pub approved: bool,
    /// Address the user picked, for connect requests.
    #[serde(default)]
    pub public_key: Option<String>,
    /// Unix ms.
    pub timestamp: i64,
}

/// What happened to a resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolveOutcome {
    /// Stored for the waiting consumer.
    Recorded,
    /// The request was already consumed or timed out.
    Orphaned,
}

/// How a wait ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitOutcome {
    Resolved(ApprovalResult),
    TimedOut,
}

/// Correlation store over a [`KvStore`].
pub struct ApprovalQueue<S: KvStore> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    /// Pairs the pending and result keys into one logical unit.
    lock: Mutex<()>,
}

impl<S: KvStore> ApprovalQueue<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            lock: Mutex::new(()),
        }
    }

    /// Persist a new pending request.
    pub async fn enqueue(&self, origin: &str, payload: PendingPayload) -> Result<PendingRequest> {
        self.enqueue_with_id(RequestId::new(), origin, payload).await
    }

    /// Persist a pending request under a caller-chosen id.
    pub async fn enqueue_with_id(
        &self,
        id: RequestId,
        origin: &str,
        payload: PendingPayload,
    ) -> Result<PendingRequest> {
        let request = PendingRequest {
            id,
            origin: origin.to_string(),
            payload,
            requested_at: self.clock.now_millis(),
        };
        self.store
            .put_record(&keyspace::pending(request.id.as_str()), &request)
            .await?;
        info!(request_id = %request.id, origin, "request enqueued");
        Ok(request)
    }

    pub async fn pending(&self, id: &RequestId) -> Result<Option<PendingRequest>> {
        Ok(self.store.get_record(&keyspace::pending(id.as_str())).await?)
    }

    /// Every pending request, oldest first.
    pub async fn list_pending(&self) -> Result<Vec<PendingRequest>> {
        let mut requests: Vec<PendingRequest> = self
            .store
            .scan_prefix(keyspace::PENDING_PREFIX)
            .await?
            .into_iter()
            .map(|(_, request)| request)
            .collect();
        requests.sort_by(|a, b| {
            a.requested_at
                .cmp(&b.requested_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(requests)
    }

    /// Record a decision for `id`. Ignored if the request no longer exists.
    pub async fn resolve(
        &self,
        id: &RequestId,
        approved: bool,
        public_key: Option<String>,
    ) -> Result<ResolveOutcome> {
        let _guard = self.lock.lock().await;
        if self.store.get(&keyspace::pending(id.as_str())).await?.is_none() {
            debug!(request_id = %id, "orphaned resolution ignored");
            return Ok(ResolveOutcome::Orphaned);
        }
        let result = ApprovalResult {
            approved,
            public_key,
            timestamp: self.clock.now_millis(),
        };
        self.store
            .put_record(&keyspace::result(id.as_str()), &result)
            .await?;
        debug!(request_id = %id, approved, "resolution recorded");
        Ok(ResolveOutcome::Recorded)
    }

    /// Take the result for `id` and drop its pending record with it.
    ///
    /// Returns `None` while undecided; the pending record stays in place.
    pub async fn dequeue(&self, id: &RequestId) -> Result<Option<ApprovalResult>> {
        let _guard = self.lock.lock().await;
        self.take_result(id).await
    }

    /// Drop a request and any result. Returns whether the request existed.
    pub async fn cancel(&self, id: &RequestId) -> Result<bool> {
        let _guard = self.lock.lock().await;
        self.remove_both(id).await
    }

    // Callers hold `self.lock`.
    async fn take_result(&self, id: &RequestId) -> Result<Option<ApprovalResult>> {
        let result: Option<ApprovalResult> = self
            .store
            .take_record(&keyspace::result(id.as_str()))
            .await?;
        if result.is_some() {
            self.store.remove(&keyspace::pending(id.as_str())).await?;
        }
        Ok(result)
    }

    async fn remove_both(&self, id: &RequestId) -> Result<bool> {
        let existed = self.store.remove(&keyspace::pending(id.as_str())).await?;
        self.store.remove(&keyspace::result(id.as_str())).await?;
        Ok(existed)
    }

    /// Wait until `id` is resolved or `timeout` passes.
    ///
    /// Wakes on the store change feed and, as a fallback, every `poll`. On
    /// timeout a last-moment result still wins; otherwise the pending record
    /// is removed.
    pub async fn wait_for_resolution(
        &self,
        id: &RequestId,
        timeout: Duration,
        poll: Duration,
    ) -> Result<WaitOutcome> {
        let result_key = keyspace::result(id.as_str());
        let mut events = self.store.subscribe();
        let mut feed_open = true;
        let deadline = tokio::time::sleep(timeout);
        tokio::pin!(deadline);
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + poll, poll);

        loop {
            if let Some(result) = self.dequeue(id).await? {
                return Ok(WaitOutcome::Resolved(result));
            }
            loop {
                tokio::select! {
                    _ = &mut deadline => return self.finish_timeout(id).await,
                    event = events.recv(), if feed_open => match event {
                        Ok(event) if event.key == result_key => break,
                        Ok(_) => {}
                        Err(RecvError::Lagged(_)) => break,
                        Err(RecvError::Closed) => feed_open = false,
                    },
                    _ = ticker.tick() => break,
                }
            }
        }
    }

    /// Last look and removal under one guard, so a decision either lands
    /// before it and wins or after it and is orphaned.
    async fn finish_timeout(&self, id: &RequestId) -> Result<WaitOutcome> {
        let _guard = self.lock.lock().await;
        if let Some(result) = self.take_result(id).await? {
            return Ok(WaitOutcome::Resolved(result));
        }
        self.remove_both(id).await?;
        info!(request_id = %id, "request timed out");
        Ok(WaitOutcome::TimedOut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burnerkit_core::ManualClock;
    use burnerkit_store::MemoryStore;

    fn queue() -> Arc<ApprovalQueue<MemoryStore>> {
        Arc::new(ApprovalQueue::new(
            Arc::new(MemoryStore::new()),
            Arc::new(ManualClock::new(1_000)),
        ))
    }

    fn connect() -> PendingPayload {
        PendingPayload::Connect {
            network: Network::Solana,
        }
    }

    #[tokio::test]
    async fn test_happy_path_removes_both_records() {
        let queue = queue();
        let id = RequestId::from("p1");
        queue
            .enqueue_with_id(id.clone(), "https://app.example", connect())
            .await
            .unwrap();

        let waiter = {
            let queue = queue.clone();
            let id = id.clone();
            tokio::spawn(async move {
                queue
                    .wait_for_resolution(&id, Duration::from_secs(5), Duration::from_millis(500))
                    .await
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        let outcome = queue
            .resolve(&id, true, Some("Addr1".to_string()))
            .await
            .unwrap();
        assert_eq!(outcome, ResolveOutcome::Recorded);

        match waiter.await.unwrap().unwrap() {
            WaitOutcome::Resolved(result) => {
                assert!(result.approved);
                assert_eq!(result.public_key.as_deref(), Some("Addr1"));
            }
            WaitOutcome::TimedOut => panic!("expected resolution"),
        }
        assert!(queue.pending(&id).await.unwrap().is_none());
        assert!(queue.store.get("result:p1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_timeout_removes_pending() {
        let queue = queue();
        let id = RequestId::from("p2");
        queue
            .enqueue_with_id(id.clone(), "https://app.example", connect())
            .await
            .unwrap();

        let outcome = queue
            .wait_for_resolution(&id, Duration::from_millis(50), Duration::from_millis(10))
            .await
            .unwrap();
        assert_eq!(outcome, WaitOutcome::TimedOut);
        assert!(queue.pending(&id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_late_resolution_is_orphaned() {
        let queue = queue();
        let id = RequestId::from("p3");
        queue
            .enqueue_with_id(id.clone(), "https://app.example", connect())
            .await
            .unwrap();
        queue
            .wait_for_resolution(&id, Duration::from_millis(10), Duration::from_millis(5))
            .await
            .unwrap();

        let outcome = queue.resolve(&id, true, None).await.unwrap();
        assert_eq!(outcome, ResolveOutcome::Orphaned);
        assert!(queue.store.get("result:p3").await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_recorded_decision_is_never_dropped_at_deadline() {
        for round in 0..50 {
            let queue = queue();
            let id = RequestId::from(format!("edge{round}"));
            queue
                .enqueue_with_id(id.clone(), "https://app.example", connect())
                .await
                .unwrap();

            let waiter = {
                let queue = queue.clone();
                let id = id.clone();
                tokio::spawn(async move {
                    queue
                        .wait_for_resolution(&id, Duration::from_millis(5), Duration::from_millis(1))
                        .await
                })
            };
            tokio::time::sleep(Duration::from_millis(5)).await;
            let decided = queue.resolve(&id, true, None).await.unwrap();
            let waited = waiter.await.unwrap().unwrap();

            match decided {
                ResolveOutcome::Recorded => {
                    assert!(matches!(waited, WaitOutcome::Resolved(_)), "round {round}")
                }
                ResolveOutcome::Orphaned => assert_eq!(waited, WaitOutcome::TimedOut, "round {round}"),
            }
            assert!(queue.pending(&id).await.unwrap().is_none());
            assert!(queue
                .store
                .get(&keyspace::result(id.as_str()))
                .await
                .unwrap()
                .is_none());
        }
    }

    #[tokio::test]
    async fn test_dequeue_before_decision_keeps_pending() {
        let queue = queue();
        let request = queue.enqueue("https://app.example", connect()).await.unwrap();

        assert!(queue.dequeue(&request.id).await.unwrap().is_none());
        assert!(queue.pending(&request.id).await.unwrap().is_some());

        queue.resolve(&request.id, false, None).await.unwrap();
        let result = queue.dequeue(&request.id).await.unwrap().unwrap();
        assert!(!result.approved);
        assert!(queue.dequeue(&request.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_pending_oldest_first() {
        let clock = ManualClock::new(10);
        let queue = ApprovalQueue::new(Arc::new(MemoryStore::new()), Arc::new(clock.clone()));
        queue
            .enqueue_with_id("b".into(), "https://one.example", connect())
            .await
            .unwrap();
        clock.advance(Duration::from_millis(5));
        queue
            .enqueue_with_id("a".into(), "https://two.example", connect())
            .await
            .unwrap();

        let ids: Vec<_> = queue
            .list_pending()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.id.to_string())
            .collect();
        assert_eq!(ids, ["b", "a"]);
    }

    #[test]
    fn test_request_ids_are_unique() {
        assert_ne!(RequestId::new(), RequestId::new());
        assert_eq!(RequestId::new().as_str().len(), 32);
    }
}
