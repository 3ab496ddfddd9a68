//! KvStore trait: the abstract interface for namespaced key-value persistence.
//!
//! The vault, session and approval queue only ever see this trait. Values are
//! opaque bytes; [`StoreExt`] layers CBOR-encoded records on top.

use async_trait::async_trait;
use bytes::Bytes;
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::broadcast;

use crate::error::{Result, StoreError};
use crate::feed::StoreEvent;

/// The KvStore trait: async interface for key-value persistence.
///
/// # Design Notes
///
/// - **Per-key atomicity**: each call is atomic for its key. There is no
///   transaction spanning several keys.
/// - **Take**: [`KvStore::take`] reads and removes in one step, so exactly one
///   caller observes a given value.
/// - **Change feed**: every mutation is published to subscribers.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Get the value under `key`.
    async fn get(&self, key: &str) -> Result<Option<Bytes>>;

    /// Get every entry, ordered by key.
    async fn get_all(&self) -> Result<Vec<(String, Bytes)>>;

    /// Get every entry whose key starts with `prefix`, ordered by key.
    async fn get_prefix(&self, prefix: &str) -> Result<Vec<(String, Bytes)>>;

    /// Insert or replace the value under `key`.
    async fn set(&self, key: &str, value: Bytes) -> Result<()>;

    /// Remove `key`. Returns whether it existed.
    async fn remove(&self, key: &str) -> Result<bool>;

    /// Remove `key` and return what it held.
    async fn take(&self, key: &str) -> Result<Option<Bytes>>;

    /// Subscribe to mutations made after this call.
    fn subscribe(&self) -> broadcast::Receiver<StoreEvent>;
}

/// Encode a record as CBOR.
pub fn encode_record<T: Serialize + ?Sized>(value: &T) -> Result<Bytes> {
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf)
        .map_err(|e| StoreError::Serialization(e.to_string()))?;
    Ok(Bytes::from(buf))
}

/// Decode a CBOR record.
pub fn decode_record<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    ciborium::from_reader(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
}

/// Extension trait for typed records.
pub trait StoreExt: KvStore {
    /// Read and decode a record.
    fn get_record<T>(&self, key: &str) -> impl std::future::Future<Output = Result<Option<T>>> + Send
    where
        T: DeserializeOwned + Send;

    /// Encode and write a record.
    fn put_record<T>(&self, key: &str, value: &T) -> impl std::future::Future<Output = Result<()>> + Send
    where
        T: Serialize + Sync + ?Sized;

    /// Atomically read, remove and decode a record.
    fn take_record<T>(&self, key: &str) -> impl std::future::Future<Output = Result<Option<T>>> + Send
    where
        T: DeserializeOwned + Send;

    /// Decode every record under a prefix.
    fn scan_prefix<T>(
        &self,
        prefix: &str,
    ) -> impl std::future::Future<Output = Result<Vec<(String, T)>>> + Send
    where
        T: DeserializeOwned + Send;
}

impl<S: KvStore + ?Sized> StoreExt for S {
    async fn get_record<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: DeserializeOwned + Send,
    {
        match self.get(key).await? {
            Some(bytes) => decode_record(&bytes).map(Some),
            None => Ok(None),
        }
    }

    async fn put_record<T>(&self, key: &str, value: &T) -> Result<()>
    where
        T: Serialize + Sync + ?Sized,
    {
        let bytes = encode_record(value)?;
        self.set(key, bytes).await
    }

    async fn take_record<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: DeserializeOwned + Send,
    {
        match self.take(key).await? {
            Some(bytes) => decode_record(&bytes).map(Some),
            None => Ok(None),
        }
    }

    async fn scan_prefix<T>(&self, prefix: &str) -> Result<Vec<(String, T)>>
    where
        T: DeserializeOwned + Send,
    {
        self.get_prefix(prefix)
            .await?
            .into_iter()
            .map(|(key, bytes)| decode_record(&bytes).map(|value| (key, value)))
            .collect()
    }
}
