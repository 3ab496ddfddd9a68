//! In-memory implementation of the KvStore trait.
//!
//! Same semantics as SQLite, nothing persisted. Used by tests and by hosts
//! that keep state elsewhere.

use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::broadcast;

use crate::error::Result;
use crate::feed::{ChangeFeed, ChangeKind, StoreEvent};
use crate::traits::KvStore;

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
pub struct MemoryStore {
    entries: RwLock<BTreeMap<String, Bytes>>,
    feed: ChangeFeed,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
            feed: ChangeFeed::new(),
        }
    }

    /// Number of keys held.
    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Bytes>> {
        let entries = self.entries.read().unwrap();
        Ok(entries.get(key).cloned())
    }

    async fn get_all(&self) -> Result<Vec<(String, Bytes)>> {
        let entries = self.entries.read().unwrap();
        Ok(entries
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    async fn get_prefix(&self, prefix: &str) -> Result<Vec<(String, Bytes)>> {
        let entries = self.entries.read().unwrap();
        Ok(entries
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    async fn set(&self, key: &str, value: Bytes) -> Result<()> {
        self.entries.write().unwrap().insert(key.to_string(), value);
        self.feed.publish(key, ChangeKind::Set);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<bool> {
        let existed = self.entries.write().unwrap().remove(key).is_some();
        if existed {
            self.feed.publish(key, ChangeKind::Removed);
        }
        Ok(existed)
    }

    async fn take(&self, key: &str) -> Result<Option<Bytes>> {
        let taken = self.entries.write().unwrap().remove(key);
        if taken.is_some() {
            self.feed.publish(key, ChangeKind::Removed);
        }
        Ok(taken)
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.feed.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::StoreExt;

    #[tokio::test]
    async fn test_set_get_remove() {
        let store = MemoryStore::new();
        store.set("a", Bytes::from_static(b"1")).await.unwrap();
        assert_eq!(store.get("a").await.unwrap(), Some(Bytes::from_static(b"1")));

        assert!(store.remove("a").await.unwrap());
        assert!(!store.remove("a").await.unwrap());
        assert_eq!(store.get("a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_prefix_scan_is_bounded() {
        let store = MemoryStore::new();
        for key in ["burner:evm:0", "burner:solana:0", "burner:solana:1", "counter:solana"] {
            store.set(key, Bytes::from_static(b"x")).await.unwrap();
        }
        let keys: Vec<String> = store
            .get_prefix("burner:solana:")
            .await
            .unwrap()
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(keys, vec!["burner:solana:0", "burner:solana:1"]);
        assert_eq!(store.get_all().await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_take_is_exactly_once() {
        let store = MemoryStore::new();
        store.put_record("pending:p1", &42u32).await.unwrap();

        let first: Option<u32> = store.take_record("pending:p1").await.unwrap();
        let second: Option<u32> = store.take_record("pending:p1").await.unwrap();
        assert_eq!(first, Some(42));
        assert_eq!(second, None);
    }

    #[tokio::test]
    async fn test_change_feed_reports_mutations() {
        let store = MemoryStore::new();
        let mut rx = store.subscribe();

        store.set("k", Bytes::from_static(b"v")).await.unwrap();
        store.take("k").await.unwrap();
        store.remove("missing").await.unwrap();

        let first = rx.recv().await.unwrap();
        assert_eq!(first.key, "k");
        assert_eq!(first.kind, ChangeKind::Set);
        let second = rx.recv().await.unwrap();
        assert_eq!(second.kind, ChangeKind::Removed);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_typed_records() {
        let store = MemoryStore::new();
        store.put_record("site:a", &vec!["x".to_string()]).await.unwrap();
        store.put_record("site:b", &vec!["y".to_string()]).await.unwrap();

        let sites: Vec<(String, Vec<String>)> = store.scan_prefix("site:").await.unwrap();
        assert_eq!(sites.len(), 2);
        assert_eq!(sites[1].1, vec!["y".to_string()]);
    }
}
