//! Connected sites: which burner an origin may see without prompting.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use burnerkit_core::{keyspace, Clock, Network, NetworkFamily};
use burnerkit_store::{KvStore, StoreExt};

use crate::error::{BridgeError, Result};

/// An origin's approved binding to one burner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectedSite {
    /// Normalized origin.
    pub domain: String,
    pub burner_index: u32,
    pub network: Network,
    pub address: String,
    /// Unix ms.
    pub connected_at: i64,
}

impl ConnectedSite {
    pub fn family(&self) -> NetworkFamily {
        self.network.family()
    }
}

/// Reduce an origin to `scheme://host[:port]`, lowercased.
pub fn normalize_origin(raw: &str) -> Result<String> {
    let invalid = || BridgeError::InvalidParams(format!("invalid origin: {raw}"));

    let lowered = raw.trim().to_ascii_lowercase();
    let (scheme, rest) = lowered.split_once("://").ok_or_else(invalid)?;
    let scheme_ok = !scheme.is_empty()
        && scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    if !scheme_ok {
        return Err(invalid());
    }

    let authority = rest
        .split(|c| matches!(c, '/' | '?' | '#'))
        .next()
        .unwrap_or_default();
    if authority.is_empty() || authority.contains('@') || authority.ends_with(':') {
        return Err(invalid());
    }
    Ok(format!("{scheme}://{authority}"))
}

/// Connected-site records under `site:{origin}`.
pub struct SiteRegistry<S: KvStore> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<S: KvStore> SiteRegistry<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub async fn get(&self, origin: &str) -> Result<Option<ConnectedSite>> {
        Ok(self.store.get_record(&keyspace::site(origin)).await?)
    }

    /// Bind `origin` to a burner, replacing any earlier binding.
    pub async fn connect(
        &self,
        origin: &str,
        network: Network,
        burner_index: u32,
        address: &str,
    ) -> Result<ConnectedSite> {
        let site = ConnectedSite {
            domain: origin.to_string(),
            burner_index,
            network,
            address: address.to_string(),
            connected_at: self.clock.now_millis(),
        };
        self.store.put_record(&keyspace::site(origin), &site).await?;
        info!(origin, network = %network, index = burner_index, "site connected");
        Ok(site)
    }

    /// Remove the binding. Returns whether one existed.
    pub async fn disconnect(&self, origin: &str) -> Result<bool> {
        let removed = self.store.remove(&keyspace::site(origin)).await?;
        if removed {
            info!(origin, "site disconnected");
        }
        Ok(removed)
    }

    pub async fn list(&self) -> Result<Vec<ConnectedSite>> {
        Ok(self
            .store
            .scan_prefix(keyspace::SITE_PREFIX)
            .await?
            .into_iter()
            .map(|(_, site)| site)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burnerkit_core::ManualClock;
    use burnerkit_store::MemoryStore;

    #[test]
    fn test_normalize_origin() {
        assert_eq!(
            normalize_origin("HTTPS://App.Example.com/path?q=1").unwrap(),
            "https://app.example.com"
        );
        assert_eq!(
            normalize_origin("http://localhost:3000").unwrap(),
            "http://localhost:3000"
        );
        assert_eq!(
            normalize_origin("https://dapp.example#frag").unwrap(),
            "https://dapp.example"
        );
    }

    #[test]
    fn test_normalize_origin_rejects_garbage() {
        for raw in ["", "app.example.com", "https://", "https://user@host", "ht tp://x"] {
            assert!(normalize_origin(raw).is_err(), "{raw} accepted");
        }
    }

    #[tokio::test]
    async fn test_connect_disconnect() {
        let registry = SiteRegistry::new(Arc::new(MemoryStore::new()), Arc::new(ManualClock::new(42)));
        let origin = "https://app.example";

        assert!(registry.get(origin).await.unwrap().is_none());
        let site = registry
            .connect(origin, Network::Ethereum, 0, "0xabc")
            .await
            .unwrap();
        assert_eq!(site.connected_at, 42);
        assert_eq!(site.family(), NetworkFamily::Evm);
        assert_eq!(registry.get(origin).await.unwrap(), Some(site));
        assert_eq!(registry.list().await.unwrap().len(), 1);

        assert!(registry.disconnect(origin).await.unwrap());
        assert!(!registry.disconnect(origin).await.unwrap());
        assert!(registry.list().await.unwrap().is_empty());
    }
}
