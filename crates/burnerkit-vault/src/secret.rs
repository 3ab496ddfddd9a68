//! The single in-memory home of the session password.

use std::sync::RwLock;

use zeroize::Zeroizing;

/// Holds the unlocked password. Nothing else keeps a copy.
///
/// Owned by the session manager, which sets and clears it. The bridge and
/// the facade read the password through `SessionManager::password`, which
/// checks expiry first.
#[derive(Default)]
pub struct SecretHolder {
    inner: RwLock<Option<Zeroizing<String>>>,
}

impl SecretHolder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<Zeroizing<String>> {
        self.inner.read().unwrap().clone()
    }

    pub fn set(&self, secret: &str) {
        *self.inner.write().unwrap() = Some(Zeroizing::new(secret.to_string()));
    }

    /// Drop the secret. The previous value is zeroized.
    pub fn clear(&self) {
        self.inner.write().unwrap().take();
    }

    pub fn is_set(&self) -> bool {
        self.inner.read().unwrap().is_some()
    }
}

impl std::fmt::Debug for SecretHolder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretHolder")
            .field("is_set", &self.is_set())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_clear() {
        let holder = SecretHolder::new();
        assert!(holder.get().is_none());

        holder.set("pw");
        assert_eq!(holder.get().unwrap().as_str(), "pw");

        holder.clear();
        assert!(!holder.is_set());
    }

    #[test]
    fn test_debug_hides_secret() {
        let holder = SecretHolder::new();
        holder.set("hunter2");
        assert!(!format!("{holder:?}").contains("hunter2"));
    }
}
