//! In-memory slot backend for testing.

use crate::error::{ErrorKind, Result};
use crate::{SlotBackend, validate_key};
use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

/// In-memory slot backend for testing.
///
/// Values are stored in a `BTreeMap` behind a [`RwLock`], so all trait
/// methods can operate on `&self` without external synchronisation. An
/// optional quota (total bytes across all values) makes it easy to test
/// how callers cope with a full store.
///
/// # Examples
///
/// ```
/// use shelf_storage::backend::{MockBackend, SlotBackend};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = MockBackend::with_slots([("books", "[]")]);
/// assert_eq!(backend.read("books").await?.as_deref(), Some("[]"));
///
/// backend.write("lastSync", "2024-01-01T00:00:00Z").await?;
/// assert!(backend.read("lastSync").await?.is_some());
/// # Ok(())
/// # }
/// ```
pub struct MockBackend {
    name: String,
    quota: Option<usize>,
    storage: RwLock<BTreeMap<String, String>>,
}

impl MockBackend {
    /// Create a mock backend pre-populated with values.
    ///
    /// Panics if any key fails validation. If test setup is wrong, then
    /// test should not pass.
    pub fn with_slots(slots: impl IntoIterator<Item = (impl Into<String>, impl Into<String>)>) -> Self {
        let mut map = BTreeMap::new();
        for (key, value) in slots {
            let key = key.into();
            if validate_key(&key).is_err() {
                // The panic here is DELIBERATE. MockBackend is intended to be
                // used in tests; panics are expected. There is no error result.
                panic!("MockBackend::with_slots: invalid key {key:?}");
            }
            map.insert(key, value.into());
        }
        Self {
            name: "mock".to_string(),
            quota: None,
            storage: RwLock::new(map),
        }
    }

    /// Limit the total size (in bytes) of all stored values. Writes that
    /// would exceed it fail with [`ErrorKind::QuotaExceeded`].
    pub fn with_quota(mut self, bytes: usize) -> Self {
        self.quota = Some(bytes);
        self
    }

    /// Snapshot of everything currently stored.
    pub async fn snapshot(&self) -> BTreeMap<String, String> {
        self.storage.read().await.clone()
    }
}
impl Default for MockBackend {
    fn default() -> Self {
        let slots: [(&str, &str); 0] = [];
        Self::with_slots(slots)
    }
}

#[async_trait]
impl SlotBackend for MockBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn read(&self, key: &str) -> Result<Option<String>> {
        let key = validate_key(key)?;
        Ok(self.storage.read().await.get(key).cloned())
    }

    async fn write(&self, key: &str, value: &str) -> Result<()> {
        let key = validate_key(key)?;
        let mut guard = self.storage.write().await;
        if let Some(quota) = self.quota {
            let others: usize = guard.iter().filter(|(k, _)| k.as_str() != key).map(|(_, v)| v.len()).sum();
            if others + value.len() > quota {
                exn::bail!(ErrorKind::QuotaExceeded(key.to_string()));
            }
        }
        guard.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_and_read() {
        let backend = MockBackend::default();
        backend.write("books", "[]").await.unwrap();
        assert_eq!(backend.read("books").await.unwrap().as_deref(), Some("[]"));
    }

    #[tokio::test]
    async fn test_with_slots() {
        let backend = MockBackend::with_slots([("books", "[]"), ("users", "[]")]);
        assert_eq!(backend.read("users").await.unwrap().as_deref(), Some("[]"));
        assert_eq!(backend.read("lastSync").await.unwrap(), None);
        assert_eq!(backend.snapshot().await.len(), 2);
    }

    #[tokio::test]
    async fn test_quota_exceeded_keeps_previous_value() {
        let backend = MockBackend::with_slots([("books", "[]")]).with_quota(8);
        backend.write("books", "12345678").await.unwrap();
        let err = backend.write("books", "123456789").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::QuotaExceeded(key) if key == "books"));
        assert_eq!(backend.read("books").await.unwrap().as_deref(), Some("12345678"));
    }

    #[tokio::test]
    async fn test_quota_counts_other_keys() {
        let backend = MockBackend::with_slots([("users", "1234")]).with_quota(8);
        assert!(backend.write("books", "12345").await.is_err());
        assert!(backend.write("books", "1234").await.is_ok());
    }

    #[tokio::test]
    async fn test_invalid_key_rejected() {
        let backend = MockBackend::default();
        assert!(backend.read("../books").await.is_err());
        assert!(backend.write("a/b", "bad").await.is_err());
    }

    #[test]
    #[should_panic(expected = "invalid key")]
    fn test_with_slots_panics_on_bad_key() {
        MockBackend::with_slots([("../escape", "bad")]);
    }
}
