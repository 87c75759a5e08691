//! Moving legacy records out of the fallback slot.
//!
//! Before the primary store existed, every book lived in the `"books"` slot
//! with its content embedded in `fileUrl`. Migration copies those records
//! into the primary store, splitting the content into its own partition.

use crate::Library;
use crate::library::Store;
use serde_json::Value;
use shelf_model::BookMetadata;
use std::sync::atomic::Ordering;
use tracing::instrument;

/// What happened to the records handed to a migration or backup import.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    /// Stored with their embedded content split out.
    pub with_content: usize,
    /// Stored without content (external or missing `fileUrl`).
    pub without_content: usize,
    /// Already present in the store and left alone.
    pub skipped: usize,
    /// Undecodable, invalid or failed to store. Each one is logged.
    pub failed: usize,
    /// This library instance had already migrated; nothing was read.
    pub already_ran: bool,
}

impl MigrationReport {
    /// Number of records stored.
    pub fn stored(&self) -> usize {
        self.with_content + self.without_content
    }

    /// Number of records looked at.
    pub fn total(&self) -> usize {
        self.stored() + self.skipped + self.failed
    }
}

impl Library {
    /// Move the books in the fallback slot into the primary store.
    ///
    /// Content embedded in a record is split out and stored alongside it.
    /// Records whose id is already in the primary store are skipped, which
    /// makes running the migration again harmless. A record that can't be
    /// migrated is logged and counted and the rest carry on. An unreadable
    /// slot is logged and migrates nothing. The mirror is refreshed once at
    /// the end.
    ///
    /// Runs at most once per library; later calls return a report with
    /// [`already_ran`](MigrationReport::already_ran) set. Does nothing when
    /// the library runs on the fallback slot alone.
    #[instrument(skip_all)]
    pub async fn migrate_from_fallback(&self) -> MigrationReport {
        if matches!(self.store, Store::Fallback) {
            return MigrationReport::default();
        }
        if self.migrated.swap(true, Ordering::SeqCst) {
            return MigrationReport { already_ran: true, ..MigrationReport::default() };
        }
        let records = match self.fallback.load_raw().await {
            Ok(Some(records)) => records,
            Ok(None) => return MigrationReport::default(),
            Err(e) => {
                tracing::warn!(error = ?e, "Could not read fallback slot; nothing migrated");
                return MigrationReport::default();
            },
        };
        let report = self.ingest(records).await;
        tracing::info!(
            stored = report.stored(),
            skipped = report.skipped,
            failed = report.failed,
            "Migration complete"
        );
        report
    }

    /// Store every record not already present, then refresh the mirror.
    pub(crate) async fn ingest(&self, records: Vec<Value>) -> MigrationReport {
        let mut report = MigrationReport::default();
        for (index, record) in records.into_iter().enumerate() {
            self.ingest_one(index, record, &mut report).await;
        }
        if report.stored() > 0 {
            self.refresh_mirror().await;
        }
        report
    }

    async fn ingest_one(&self, index: usize, record: Value, report: &mut MigrationReport) {
        let mut metadata = match serde_json::from_value::<BookMetadata>(record) {
            Ok(metadata) => metadata,
            Err(e) => {
                tracing::warn!(index, error = %e, "Skipping undecodable record");
                report.failed += 1;
                return;
            },
        };
        if let Err(e) = metadata.validate() {
            tracing::warn!(index, id = %metadata.id, error = ?e, "Skipping invalid record");
            report.failed += 1;
            return;
        }
        match self.contains(&metadata.id).await {
            Ok(true) => {
                tracing::debug!(id = %metadata.id, "Already stored; skipping");
                report.skipped += 1;
                return;
            },
            Ok(false) => (),
            Err(e) => {
                tracing::warn!(id = %metadata.id, error = ?e, "Could not check for existing record");
                report.failed += 1;
                return;
            },
        }
        let content = metadata.take_embedded_content();
        let content = content.as_ref().map(|content| content.content.as_str());
        match self.write_book(&metadata, content).await {
            Ok(()) if content.is_some() => report.with_content += 1,
            Ok(()) => report.without_content += 1,
            Err(e) => {
                tracing::warn!(id = %metadata.id, error = ?e, "Failed to store record");
                report.failed += 1;
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::tests::{PDF, fallback_only, mirror, primary, primary_with};
    use shelf_model::{BookId, Category};
    use shelf_storage::SlotBackend;
    use shelf_storage::backend::MockBackend;

    const LEGACY: &str = r#"[
        {"id":"1","title":"A","author":"B","fileUrl":"data:application/pdf;base64,XXXX"},
        {"id":"2","title":"Use of Weapons","author":"Iain M. Banks","category":"Fiction","progress":30,"fileUrl":"https://example.com/weapons.pdf"},
        {"id":"3","title":"Inversions","author":"Iain M. Banks","coverUrl":"inversions.jpg"}
    ]"#;

    #[tokio::test]
    async fn test_legacy_record_is_split() {
        let (backend, library) =
            primary_with(MockBackend::with_slots([("books", r#"[{"id":"1","title":"A","author":"B","fileUrl":"data:application/pdf;base64,XXXX"}]"#)])).await;
        let report = library.migrate_from_fallback().await;
        assert_eq!(report, MigrationReport { with_content: 1, ..MigrationReport::default() });
        assert_eq!(library.get_all_books().await.unwrap(), vec![BookMetadata::new("1", "A", "B")]);
        assert_eq!(
            library.get_book_content(&BookId::from("1")).await.unwrap().as_deref(),
            Some("data:application/pdf;base64,XXXX")
        );
        // The mirror no longer carries the content.
        assert_eq!(
            backend.read("books").await.unwrap().as_deref(),
            Some(r#"[{"id":"1","title":"A","author":"B","coverUrl":"","category":"other","progress":0}]"#)
        );
    }

    #[tokio::test]
    async fn test_no_embedded_content_after_migration() {
        let (_, library) = primary_with(MockBackend::with_slots([("books", LEGACY)])).await;
        let report = library.migrate_from_fallback().await;
        assert_eq!(report.with_content, 1);
        assert_eq!(report.without_content, 2);
        let books = library.get_all_books().await.unwrap();
        assert_eq!(books.len(), 3);
        assert!(books.iter().all(|book| !book.has_embedded_content()));
        // External references are kept as they were.
        assert_eq!(books[1].file_url.as_deref(), Some("https://example.com/weapons.pdf"));
        assert_eq!(books[1].category, Category::Fiction);
        assert_eq!(library.get_book_content(&BookId::from("2")).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_migrating_twice_changes_nothing() {
        let backend = MockBackend::with_slots([("books", LEGACY)]);
        let (backend, first) = primary_with(backend).await;
        first.migrate_from_fallback().await;
        let once = first.get_all_books().await.unwrap();

        let again = first.migrate_from_fallback().await;
        assert!(again.already_ran);

        // A new library over the same store reads the (now mirrored) slot.
        let Store::Primary { db, .. } = &first.store else { unreachable!() };
        let second = Library::primary(db.clone(), backend.clone());
        let report = second.migrate_from_fallback().await;
        assert_eq!(report.skipped, 3);
        assert_eq!(report.stored(), 0);
        assert_eq!(second.get_all_books().await.unwrap(), once);
        assert_eq!(second.get_book_content(&BookId::from("1")).await.unwrap().as_deref(), Some("data:application/pdf;base64,XXXX"));
    }

    #[tokio::test]
    async fn test_existing_books_are_not_overwritten() {
        let (_, library) = primary_with(MockBackend::with_slots([("books", LEGACY)])).await;
        let mut current = BookMetadata::new("3", "Inversions", "Iain M. Banks");
        current.progress = 90;
        library.write_book(&current, Some(PDF)).await.unwrap();
        let report = library.migrate_from_fallback().await;
        assert_eq!(report.skipped, 1);
        let found = library.get_book(&BookId::from("3")).await.unwrap().unwrap();
        assert_eq!(found.metadata.progress, 90);
        assert_eq!(found.content.as_deref(), Some(PDF));
    }

    #[tokio::test]
    async fn test_bad_records_are_counted_not_fatal() {
        let slot = r#"[
            {"id":"1","title":"A","author":"B"},
            {"title":"no id"},
            {"id":"3","title":"","author":"B"},
            42
        ]"#;
        let (backend, library) = primary_with(MockBackend::with_slots([("books", slot)])).await;
        let report = library.migrate_from_fallback().await;
        assert_eq!(report.without_content, 1);
        assert_eq!(report.failed, 3);
        assert_eq!(report.total(), 4);
        assert_eq!(mirror(&backend).await, vec![BookMetadata::new("1", "A", "B")]);
    }

    #[tokio::test]
    async fn test_undecodable_slot_migrates_nothing() {
        let (backend, library) = primary_with(MockBackend::with_slots([("books", "not json")])).await;
        assert_eq!(library.migrate_from_fallback().await, MigrationReport::default());
        assert!(library.get_all_books().await.unwrap().is_empty());
        // The slot is left for someone to look at.
        assert_eq!(backend.read("books").await.unwrap().as_deref(), Some("not json"));
    }

    #[tokio::test]
    async fn test_empty_slot() {
        let (_, library) = primary().await;
        assert_eq!(library.migrate_from_fallback().await, MigrationReport::default());
    }

    #[tokio::test]
    async fn test_fallback_only_is_a_noop() {
        let (backend, library) = fallback_only(&[("books", LEGACY)]);
        assert_eq!(library.migrate_from_fallback().await, MigrationReport::default());
        assert_eq!(backend.read("books").await.unwrap().as_deref(), Some(LEGACY));
    }
}
