//! Persisted key names.
//!
//! Every record lives under a purpose prefix. Burner, counter, retired and
//! import keys are further namespaced by [`NetworkFamily`].

use crate::types::NetworkFamily;

/// Current keyspace layout version.
pub const KEYSPACE_VERSION: u32 = 1;

pub const VAULT_MASTER: &str = "vault:master";
pub const SESSION_LOCKED: &str = "session:locked";
pub const SESSION_EXPIRES_AT: &str = "session:expires_at";
pub const SCHEMA_VERSION: &str = "schema:keyspace_version";

pub const BURNER_PREFIX: &str = "burner:";
pub const SITE_PREFIX: &str = "site:";
pub const PENDING_PREFIX: &str = "pending:";
pub const RESULT_PREFIX: &str = "result:";

pub fn burner(family: NetworkFamily, index: u32) -> String {
    format!("burner:{family}:{index}")
}

/// Prefix matching every burner of one family.
pub fn burner_family_prefix(family: NetworkFamily) -> String {
    format!("burner:{family}:")
}

pub fn counter(family: NetworkFamily) -> String {
    format!("counter:{family}")
}

pub fn retired(family: NetworkFamily) -> String {
    format!("retired:{family}")
}

pub fn import(family: NetworkFamily, index: u32) -> String {
    format!("import:{family}:{index}")
}

pub fn site(origin: &str) -> String {
    format!("{SITE_PREFIX}{origin}")
}

pub fn pending(id: &str) -> String {
    format!("{PENDING_PREFIX}{id}")
}

pub fn result(id: &str) -> String {
    format!("{RESULT_PREFIX}{id}")
}

/// Unprefixed names written before burners were namespaced per family.
///
/// All of them describe Solana state.
pub mod legacy {
    pub const BURNER_COUNTER: &str = "burner_counter";
    pub const RETIRED_INDICES: &str = "retired_indices";
    pub const IMPORTED_KEY_PREFIX: &str = "imported_key:";

    /// Parse `burner:{index}` (no family segment).
    pub fn parse_burner(key: &str) -> Option<u32> {
        key.strip_prefix(super::BURNER_PREFIX)?.parse().ok()
    }

    /// Parse `imported_key:{index}`.
    pub fn parse_imported_key(key: &str) -> Option<u32> {
        key.strip_prefix(IMPORTED_KEY_PREFIX)?.parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_names() {
        assert_eq!(burner(NetworkFamily::Solana, 3), "burner:solana:3");
        assert_eq!(burner(NetworkFamily::Evm, 0), "burner:evm:0");
        assert_eq!(counter(NetworkFamily::Evm), "counter:evm");
        assert_eq!(retired(NetworkFamily::Solana), "retired:solana");
        assert_eq!(import(NetworkFamily::Solana, 2), "import:solana:2");
        assert_eq!(site("https://app.example"), "site:https://app.example");
        assert_eq!(pending("p1"), "pending:p1");
        assert_eq!(result("p1"), "result:p1");
    }

    #[test]
    fn test_legacy_parsing() {
        assert_eq!(legacy::parse_burner("burner:7"), Some(7));
        assert_eq!(legacy::parse_burner("burner:solana:7"), None);
        assert_eq!(legacy::parse_imported_key("imported_key:2"), Some(2));
        assert_eq!(legacy::parse_imported_key("import:solana:2"), None);
    }
}
