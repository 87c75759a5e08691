//! Typed access to the flat slot store.
//!
//! The `"books"` slot holds a JSON array of book metadata (camelCase, as the
//! records have always been stored). While the primary store is in use it is
//! only a mirror; without a primary store it is the library itself.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use serde_json::Value;
use shelf_model::BookMetadata;
use shelf_storage::BackendHandle;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// Slot holding the JSON array of books.
pub const BOOKS_KEY: &str = "books";
/// Slot holding the time of the last backup export (RFC 3339).
pub const LAST_SYNC_KEY: &str = "lastSync";

/// The `"books"` slot of a [`SlotBackend`](shelf_storage::SlotBackend).
#[derive(Clone)]
pub struct FallbackStore {
    backend: BackendHandle,
}

impl FallbackStore {
    pub fn new(backend: BackendHandle) -> Self {
        Self { backend }
    }

    async fn read(&self) -> Result<Option<String>> {
        self.backend.read(BOOKS_KEY).await.or_raise(|| ErrorKind::Fallback)
    }

    /// Read the slot as untyped records.
    ///
    /// Each record can then be decoded on its own, so one malformed entry
    /// doesn't hide the others. Returns `None` if the slot is empty.
    pub async fn load_raw(&self) -> Result<Option<Vec<Value>>> {
        let Some(json) = self.read().await? else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_str(&json).or_raise(|| ErrorKind::Corrupt)?))
    }

    /// Read and decode every book in the slot. Returns `None` if the slot is
    /// empty.
    pub async fn load(&self) -> Result<Option<Vec<BookMetadata>>> {
        let Some(json) = self.read().await? else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_str(&json).or_raise(|| ErrorKind::Corrupt)?))
    }

    /// Replace the slot with the given books.
    pub async fn store(&self, books: &[BookMetadata]) -> Result<()> {
        let json = serde_json::to_string(books).or_raise(|| ErrorKind::Corrupt)?;
        self.backend.write(BOOKS_KEY, &json).await.or_raise(|| ErrorKind::Fallback)
    }

    /// Record when the library was last exported.
    pub async fn record_sync(&self, at: OffsetDateTime) -> Result<()> {
        let at = at.format(&Rfc3339).or_raise(|| ErrorKind::Backup)?;
        self.backend.write(LAST_SYNC_KEY, &at).await.or_raise(|| ErrorKind::Fallback)
    }

    pub async fn last_sync(&self) -> Result<Option<String>> {
        self.backend.read(LAST_SYNC_KEY).await.or_raise(|| ErrorKind::Fallback)
    }
}
