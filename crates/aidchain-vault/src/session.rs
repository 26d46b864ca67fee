//! In-memory session keys.
//!
//! Signing the transaction stream cannot block on passphrase re-entry, so a
//! principal's private key is decrypted once at login and held here until
//! logout. Plaintext never touches disk and is zeroized on removal.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use zeroize::Zeroizing;

/// Process-local concurrent map from principal id to plaintext private key.
/// Cloning the table clones the handle, not the contents.
#[derive(Clone, Default)]
pub struct SessionKeyTable {
    inner: Arc<RwLock<HashMap<String, Zeroizing<String>>>>,
}

impl SessionKeyTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store (or replace) a principal's session key.
    pub fn put(&self, principal_id: &str, private_key: String) {
        self.inner
            .write()
            .expect("session table lock poisoned")
            .insert(principal_id.to_string(), Zeroizing::new(private_key));
    }

    /// Fetch a copy of a principal's session key.
    pub fn get(&self, principal_id: &str) -> Option<String> {
        self.inner
            .read()
            .expect("session table lock poisoned")
            .get(principal_id)
            .map(|k| k.to_string())
    }

    /// Drop a principal's session key; the plaintext is zeroized.
    pub fn remove(&self, principal_id: &str) {
        self.inner
            .write()
            .expect("session table lock poisoned")
            .remove(principal_id);
    }

    pub fn contains(&self, principal_id: &str) -> bool {
        self.inner
            .read()
            .expect("session table lock poisoned")
            .contains_key(principal_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_get_remove() {
        let table = SessionKeyTable::new();
        table.put("u1", "sk-bytes".into());
        assert_eq!(table.get("u1").as_deref(), Some("sk-bytes"));
        table.remove("u1");
        assert_eq!(table.get("u1"), None);
    }

    #[test]
    fn handles_share_contents() {
        let table = SessionKeyTable::new();
        let other = table.clone();
        table.put("u1", "k".into());
        assert!(other.contains("u1"));
    }

    #[test]
    fn concurrent_writers_do_not_lose_entries() {
        let table = SessionKeyTable::new();
        let mut handles = Vec::new();
        for i in 0..8 {
            let t = table.clone();
            handles.push(std::thread::spawn(move || {
                for j in 0..50 {
                    t.put(&format!("p{i}-{j}"), format!("key{j}"));
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(table.get("p0-0").as_deref(), Some("key0"));
        assert_eq!(table.get("p7-49").as_deref(), Some("key49"));
    }
}
