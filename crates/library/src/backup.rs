//! Exporting and importing the library as JSON.

use crate::Library;
use crate::error::{ErrorKind, Result};
use crate::migrate::MigrationReport;
use exn::ResultExt;
use serde_json::Value;
use time::OffsetDateTime;
use tracing::instrument;

impl Library {
    /// Every book's metadata as a pretty-printed JSON array. Content is
    /// left out.
    ///
    /// The time of the export is recorded in the `lastSync` slot; failing to
    /// record it is logged and doesn't fail the export.
    #[instrument(skip_all)]
    pub async fn export_backup(&self) -> Result<String> {
        let mut books = self.get_all_books().await?;
        for book in &mut books {
            book.take_embedded_content();
        }
        let json = serde_json::to_string_pretty(&books).or_raise(|| ErrorKind::Backup)?;
        if let Err(e) = self.fallback.record_sync(OffsetDateTime::now_utc()).await {
            tracing::warn!(error = ?e, "Could not record export time");
        }
        tracing::info!(books = books.len(), "Exported backup");
        Ok(json)
    }

    /// Add the books in a JSON backup to the library.
    ///
    /// Records may be in the legacy combined shape: embedded content is split
    /// out as during migration. Books already in the library are skipped and
    /// bad records are counted; only a backup that isn't a JSON array fails.
    #[instrument(skip_all)]
    pub async fn import_backup(&self, json: &str) -> Result<MigrationReport> {
        let records: Vec<Value> = serde_json::from_str(json).or_raise(|| ErrorKind::Backup)?;
        let report = self.ingest(records).await;
        tracing::info!(stored = report.stored(), skipped = report.skipped, failed = report.failed, "Imported backup");
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::tests::{PDF, fallback_only, mirror, primary};
    use shelf_model::{BookId, BookMetadata};

    #[tokio::test]
    async fn test_export_leaves_out_content() {
        let (backend, library) = primary().await;
        library.save_book(&BookMetadata::new("1", "A", "B"), Some(PDF)).await.unwrap();
        let json = library.export_backup().await.unwrap();
        assert!(!json.contains("data:"));
        let books: Vec<BookMetadata> = serde_json::from_str(&json).unwrap();
        assert_eq!(books, vec![BookMetadata::new("1", "A", "B")]);
        assert!(library.fallback().last_sync().await.unwrap().is_some());
        assert_eq!(mirror(&backend).await, books);
    }

    #[tokio::test]
    async fn test_export_from_fallback_strips_embedded_content() {
        let (_, library) =
            fallback_only(&[("books", r#"[{"id":"1","title":"A","author":"B","fileUrl":"data:application/pdf;base64,XXXX"}]"#)]);
        let json = library.export_backup().await.unwrap();
        assert!(!json.contains("fileUrl"));
    }

    #[tokio::test]
    async fn test_import_into_primary() {
        let (_, library) = primary().await;
        library.save_book(&BookMetadata::new("1", "Kept", "B"), None).await.unwrap();
        let backup = r#"[
            {"id":"1","title":"Replaced?","author":"B"},
            {"id":"2","title":"C","author":"D","fileUrl":"data:application/pdf;base64,XXXX"},
            {"id":"3"}
        ]"#;
        let report = library.import_backup(backup).await.unwrap();
        assert_eq!(report.skipped, 1);
        assert_eq!(report.with_content, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(library.get_book(&BookId::from("1")).await.unwrap().unwrap().metadata.title, "Kept");
        assert_eq!(
            library.get_book_content(&BookId::from("2")).await.unwrap().as_deref(),
            Some("data:application/pdf;base64,XXXX")
        );
    }

    #[tokio::test]
    async fn test_import_into_fallback_embeds_content() {
        let (backend, library) = fallback_only(&[]);
        let backup = r#"[{"id":"2","title":"C","author":"D","fileUrl":"data:application/pdf;base64,XXXX"}]"#;
        library.import_backup(backup).await.unwrap();
        let stored = mirror(&backend).await;
        assert_eq!(stored[0].file_url.as_deref(), Some("data:application/pdf;base64,XXXX"));
    }

    #[tokio::test]
    async fn test_import_rejects_non_array() {
        let (_, library) = primary().await;
        let err = library.import_backup(r#"{"books":[]}"#).await.unwrap_err();
        assert_eq!(*err, ErrorKind::Backup);
    }

    #[tokio::test]
    async fn test_round_trip_between_libraries() {
        let (_, source) = primary().await;
        source.save_book(&BookMetadata::new("1", "A", "B"), None).await.unwrap();
        source.save_book(&BookMetadata::new("2", "C", "D"), None).await.unwrap();
        let json = source.export_backup().await.unwrap();
        let (_, target) = primary().await;
        target.import_backup(&json).await.unwrap();
        assert_eq!(target.get_all_books().await.unwrap(), source.get_all_books().await.unwrap());
    }
}
