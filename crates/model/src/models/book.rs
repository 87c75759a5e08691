use serde::{Deserialize, Deserializer, Serialize};
use time::OffsetDateTime;

use super::{BookContent, BookId, Category, is_embedded_content};
use crate::error::{ErrorKind, Result};

/// Highest reading progress, in percent.
const PROGRESS_MAX: u8 = 100;

/// Descriptive fields of a book, excluding the file payload.
///
/// Serialized with the camelCase field names used by the fallback slot, so
/// records written by older versions decode unchanged. Fields missing from
/// older records fall back to their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookMetadata {
    pub id: BookId,
    pub title: String,
    pub author: String,
    /// Cover image reference. Empty means "use a placeholder".
    #[serde(default)]
    pub cover_url: String,
    /// Original uploaded file name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(default)]
    pub category: Category,
    /// Reading progress in percent (0-100).
    #[serde(default, deserialize_with = "deserialize_progress")]
    pub progress: u8,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "time::serde::rfc3339::option")]
    pub last_read: Option<OffsetDateTime>,
    /// Legacy combined-content field. Holds the whole file as a `data:`
    /// reference on records that have not been migrated yet.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
}

impl BookMetadata {
    pub fn new(id: impl Into<BookId>, title: impl Into<String>, author: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            author: author.into(),
            cover_url: String::new(),
            file_name: None,
            category: Category::default(),
            progress: 0,
            last_read: None,
            file_url: None,
        }
    }

    pub fn with_category(mut self, category: Category) -> Self {
        self.category = category;
        self
    }

    pub fn with_cover_url(mut self, cover_url: impl Into<String>) -> Self {
        self.cover_url = cover_url.into();
        self
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    pub fn with_file_url(mut self, file_url: impl Into<String>) -> Self {
        self.file_url = Some(file_url.into());
        self
    }

    /// Check the shape of the record before it is persisted.
    pub fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            exn::bail!(ErrorKind::InvalidField("id"));
        }
        if self.title.trim().is_empty() {
            exn::bail!(ErrorKind::InvalidField("title"));
        }
        if self.author.trim().is_empty() {
            exn::bail!(ErrorKind::InvalidField("author"));
        }
        if self.progress > PROGRESS_MAX {
            exn::bail!(ErrorKind::InvalidField("progress"));
        }
        Ok(())
    }

    /// Whether the legacy `fileUrl` field still carries the file itself.
    pub fn has_embedded_content(&self) -> bool {
        self.file_url.as_deref().is_some_and(is_embedded_content)
    }

    /// Split embedded content off a legacy combined record.
    ///
    /// Returns `None`, and leaves the record untouched, when `fileUrl` is
    /// absent or only holds an external reference.
    pub fn take_embedded_content(&mut self) -> Option<BookContent> {
        if !self.has_embedded_content() {
            return None;
        }
        let content = self.file_url.take()?;
        Some(BookContent::new(self.id.clone(), content))
    }

    /// Record reading activity: progress is clamped to 100%.
    pub fn record_progress(&mut self, percent: u8, at: OffsetDateTime) {
        self.progress = percent.min(PROGRESS_MAX);
        self.last_read = Some(at);
    }
}

/// Progress is written by browsers as a JSON number, which may be
/// fractional, negative or null. Anything unusable becomes `0`.
fn deserialize_progress<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<u8, D::Error> {
    let value = Option::<f64>::deserialize(deserializer)?;
    Ok(value
        .filter(|v| v.is_finite())
        .map(|v| v.round().clamp(0.0, f64::from(PROGRESS_MAX)) as u8)
        .unwrap_or(0))
}

/// A book's metadata together with its content, if any was stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Book {
    pub metadata: BookMetadata,
    pub content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use time::macros::datetime;

    #[test]
    fn test_legacy_record_decodes_with_defaults() {
        let json = r#"{"id":"1","title":"A","author":"B","fileUrl":"data:application/pdf;base64,XXXX"}"#;
        let book: BookMetadata = serde_json::from_str(json).unwrap();
        assert_eq!(book, BookMetadata::new("1", "A", "B").with_file_url("data:application/pdf;base64,XXXX"));
    }

    #[test]
    fn test_serializes_camel_case_and_skips_absent_fields() {
        let book = BookMetadata::new("1", "A", "B").with_file_name("a.pdf");
        let json = serde_json::to_string(&book).unwrap();
        assert_eq!(
            json,
            r#"{"id":"1","title":"A","author":"B","coverUrl":"","fileName":"a.pdf","category":"other","progress":0}"#
        );
    }

    #[test]
    fn test_last_read_is_iso8601() {
        let json = r#"{"id":"1","title":"A","author":"B","lastRead":"2024-03-01T10:30:00.000Z"}"#;
        let book: BookMetadata = serde_json::from_str(json).unwrap();
        assert_eq!(book.last_read, Some(datetime!(2024-03-01 10:30:00 UTC)));
    }

    #[rstest]
    #[case("42", 42)]
    #[case("42.6", 43)]
    #[case("-5", 0)]
    #[case("250", 100)]
    #[case("null", 0)]
    fn test_progress_is_clamped(#[case] progress: &str, #[case] expected: u8) {
        let json = format!(r#"{{"id":"1","title":"A","author":"B","progress":{progress}}}"#);
        let book: BookMetadata = serde_json::from_str(&json).unwrap();
        assert_eq!(book.progress, expected);
    }

    #[rstest]
    #[case(BookMetadata::new("", "A", "B"), "id")]
    #[case(BookMetadata::new("1", " ", "B"), "title")]
    #[case(BookMetadata::new("1", "A", ""), "author")]
    fn test_validate_rejects(#[case] book: BookMetadata, #[case] field: &'static str) {
        let err = book.validate().unwrap_err();
        assert_eq!(*err, ErrorKind::InvalidField(field));
    }

    #[test]
    fn test_take_embedded_content() {
        let mut book = BookMetadata::new("1", "A", "B").with_file_url("data:application/pdf;base64,XXXX");
        let content = book.take_embedded_content().unwrap();
        assert_eq!(content, BookContent::new("1", "data:application/pdf;base64,XXXX"));
        assert_eq!(book.file_url, None);
        assert!(book.take_embedded_content().is_none());
    }

    #[test]
    fn test_external_reference_is_kept() {
        let mut book = BookMetadata::new("1", "A", "B").with_file_url("https://example.com/a.pdf");
        assert!(book.take_embedded_content().is_none());
        assert_eq!(book.file_url.as_deref(), Some("https://example.com/a.pdf"));
    }

    #[test]
    fn test_record_progress() {
        let mut book = BookMetadata::new("1", "A", "B");
        let at = datetime!(2024-03-01 10:30:00 UTC);
        book.record_progress(180, at);
        assert_eq!(book.progress, 100);
        assert_eq!(book.last_read, Some(at));
    }
}
