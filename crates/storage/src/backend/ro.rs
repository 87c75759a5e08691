//! Read-only slot backend.
//!
//! This module provides a slot backend implementation that wraps other
//! implementations and prevents write operations from executing, but
//! indicating success on return.

use async_trait::async_trait;

use crate::{BackendHandle, SlotBackend, error::Result};

/// Read-only slot backend.
///
/// Wraps another backend and silently drops all write operations, logging an
/// [`info event`](tracing::Event). Callers see writes succeed, so only wrap
/// a backend whose writes are a copy of data kept elsewhere.
#[derive(Clone)]
pub struct ReadOnlyBackend {
    inner: BackendHandle,
}
impl ReadOnlyBackend {
    pub fn new(inner: BackendHandle) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl SlotBackend for ReadOnlyBackend {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn read(&self, key: &str) -> Result<Option<String>> {
        self.inner.read(key).await
    }

    async fn write(&self, key: &str, value: &str) -> Result<()> {
        tracing::info!(backend = self.name(), key, bytes = value.len(), "Skipping write during read-only mode");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::LocalBackend;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_writes_are_dropped() {
        let temp_dir = tempfile::tempdir().unwrap();
        let inner = LocalBackend::new("local", temp_dir.path()).unwrap();
        inner.write("books", "[]").await.unwrap();
        let backend = ReadOnlyBackend::new(Arc::new(inner));
        backend.write("books", r#"[{"id":"1"}]"#).await.unwrap();
        backend.write("lastSync", "2024-01-01T00:00:00Z").await.unwrap();
        assert_eq!(backend.read("books").await.unwrap().as_deref(), Some("[]"));
        assert_eq!(backend.read("lastSync").await.unwrap(), None);
        assert_eq!(backend.name(), "local");
    }
}
