//! One-time keyspace migration.
//!
//! Early installs stored Solana-only state under unprefixed keys. Startup
//! rewrites them to the family-prefixed layout and records the keyspace
//! version, after which only the current layout is read.

use serde::Deserialize;
use tracing::info;

use burnerkit_core::keyspace::{self, legacy, KEYSPACE_VERSION};
use burnerkit_core::{BurnerWallet, EncryptedSecret, NetworkFamily, RetiredIndexSet};
use burnerkit_store::{decode_record, KvStore, StoreExt};

use crate::error::Result;
use crate::vault::ImportedKeyRecord;

/// What a migration run rewrote.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    /// Version found before the run.
    pub from_version: u32,
    pub burners: usize,
    pub imported_keys: usize,
    pub counter_migrated: bool,
    pub retired_migrated: usize,
}

impl MigrationReport {
    pub fn is_noop(&self) -> bool {
        self.burners == 0
            && self.imported_keys == 0
            && !self.counter_migrated
            && self.retired_migrated == 0
    }
}

/// Burner record as written before family prefixes existed.
#[derive(Debug, Deserialize)]
struct LegacyBurner {
    address: String,
    #[serde(default)]
    is_active: bool,
    #[serde(default)]
    archived: bool,
    #[serde(default)]
    created_at: i64,
}

/// Rewrite legacy keys. Idempotent; a no-op once the version is current.
pub async fn migrate_keyspace<S: KvStore + ?Sized>(store: &S) -> Result<MigrationReport> {
    let from_version: u32 = store
        .get_record(keyspace::SCHEMA_VERSION)
        .await?
        .unwrap_or(0);
    let mut report = MigrationReport {
        from_version,
        ..MigrationReport::default()
    };
    if from_version >= KEYSPACE_VERSION {
        return Ok(report);
    }

    let family = NetworkFamily::Solana;
    let mut imported_indices = Vec::new();

    for (key, value) in store.get_all().await? {
        if let Some(index) = legacy::parse_burner(&key) {
            let old: LegacyBurner = decode_record(&value)?;
            let wallet = BurnerWallet {
                network: family,
                index,
                address: old.address,
                is_active: old.is_active,
                archived: old.archived,
                imported: false,
                created_at: old.created_at,
            };
            store
                .put_record(&keyspace::burner(family, index), &wallet)
                .await?;
            store.remove(&key).await?;
            report.burners += 1;
        } else if let Some(index) = legacy::parse_imported_key(&key) {
            let secret: EncryptedSecret = decode_record(&value)?;
            let record = ImportedKeyRecord {
                network: family,
                index,
                secret,
                created_at: 0,
            };
            store
                .put_record(&keyspace::import(family, index), &record)
                .await?;
            store.remove(&key).await?;
            imported_indices.push(index);
            report.imported_keys += 1;
        }
    }

    // Burners backed by a migrated import.
    for index in imported_indices {
        let key = keyspace::burner(family, index);
        if let Some(mut wallet) = store.get_record::<BurnerWallet>(&key).await? {
            wallet.imported = true;
            store.put_record(&key, &wallet).await?;
        }
    }

    if let Some(old) = store.take_record::<u32>(legacy::BURNER_COUNTER).await? {
        let current: u32 = store
            .get_record(&keyspace::counter(family))
            .await?
            .unwrap_or(0);
        store
            .put_record(&keyspace::counter(family), &current.max(old))
            .await?;
        report.counter_migrated = true;
    }

    if let Some(old) = store.take_record::<Vec<u32>>(legacy::RETIRED_INDICES).await? {
        let mut retired: RetiredIndexSet = store
            .get_record(&keyspace::retired(family))
            .await?
            .unwrap_or_default();
        for index in old {
            if retired.insert(index) {
                report.retired_migrated += 1;
            }
        }
        store
            .put_record(&keyspace::retired(family), &retired)
            .await?;
    }

    store
        .put_record(keyspace::SCHEMA_VERSION, &KEYSPACE_VERSION)
        .await?;
    if !report.is_noop() {
        info!(
            burners = report.burners,
            imported_keys = report.imported_keys,
            retired = report.retired_migrated,
            "legacy keyspace migrated"
        );
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use burnerkit_core::encrypt_secret;
    use burnerkit_store::MemoryStore;
    use serde::Serialize;

    #[derive(Serialize)]
    struct OldBurner<'a> {
        index: u32,
        address: &'a str,
        is_active: bool,
    }

    #[tokio::test]
    async fn test_migrates_legacy_layout() {
        let store = MemoryStore::new();
        store
            .put_record("burner:0", &OldBurner { index: 0, address: "A0", is_active: true })
            .await
            .unwrap();
        store
            .put_record("burner:2", &OldBurner { index: 2, address: "A2", is_active: false })
            .await
            .unwrap();
        store.put_record("burner_counter", &3u32).await.unwrap();
        store.put_record("retired_indices", &vec![1u32]).await.unwrap();
        let secret = encrypt_secret(b"key", "pw", 10).unwrap();
        store.put_record("imported_key:2", &secret).await.unwrap();

        let report = migrate_keyspace(&store).await.unwrap();
        assert_eq!(report.burners, 2);
        assert_eq!(report.imported_keys, 1);
        assert!(report.counter_migrated);
        assert_eq!(report.retired_migrated, 1);

        let wallet: BurnerWallet = store.get_record("burner:solana:2").await.unwrap().unwrap();
        assert_eq!(wallet.address, "A2");
        assert!(wallet.imported);
        let counter: u32 = store.get_record("counter:solana").await.unwrap().unwrap();
        assert_eq!(counter, 3);
        let retired: RetiredIndexSet = store.get_record("retired:solana").await.unwrap().unwrap();
        assert!(retired.contains(1));
        let record: ImportedKeyRecord = store.get_record("import:solana:2").await.unwrap().unwrap();
        assert_eq!(record.secret, secret);

        for legacy_key in ["burner:0", "burner:2", "burner_counter", "retired_indices", "imported_key:2"] {
            assert!(store.get(legacy_key).await.unwrap().is_none(), "{legacy_key} left behind");
        }
    }

    #[tokio::test]
    async fn test_second_run_is_noop() {
        let store = MemoryStore::new();
        store.put_record("burner_counter", &5u32).await.unwrap();

        let first = migrate_keyspace(&store).await.unwrap();
        assert!(first.counter_migrated);

        store.put_record("burner_counter", &9u32).await.unwrap();
        let second = migrate_keyspace(&store).await.unwrap();
        assert!(second.is_noop());
        assert_eq!(second.from_version, KEYSPACE_VERSION);
    }

    #[tokio::test]
    async fn test_fresh_store_gets_version() {
        let store = MemoryStore::new();
        let report = migrate_keyspace(&store).await.unwrap();
        assert!(report.is_noop());
        let version: u32 = store.get_record(keyspace::SCHEMA_VERSION).await.unwrap().unwrap();
        assert_eq!(version, KEYSPACE_VERSION);
    }
}
