//! Searching, browsing and reading activity.

use crate::Library;
use crate::error::{ErrorKind, Result};
use crate::library::Store;
use exn::ResultExt;
use shelf_model::{BookId, BookMetadata, Category};
use std::collections::BTreeMap;
use time::OffsetDateTime;
use tracing::instrument;

/// Filter over the library listing. An empty query matches every book.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BookQuery {
    /// Case-insensitive substring of the title or the author.
    pub search: Option<String>,
    pub category: Option<Category>,
}

impl BookQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        let search = search.into();
        let search = search.trim();
        self.search = (!search.is_empty()).then(|| search.to_lowercase());
        self
    }

    pub fn with_category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    pub fn matches(&self, book: &BookMetadata) -> bool {
        if let Some(category) = self.category
            && book.category != category
        {
            return false;
        }
        match &self.search {
            None => true,
            Some(needle) => {
                book.title.to_lowercase().contains(needle.as_str())
                    || book.author.to_lowercase().contains(needle.as_str())
            },
        }
    }
}

/// Everything needed to add a freshly uploaded book.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBook {
    pub title: String,
    pub author: String,
    pub category: Category,
    pub cover_url: String,
    pub file_name: Option<String>,
    /// The uploaded file as a `data:` URL.
    pub content: Option<String>,
}

impl NewBook {
    pub fn new(title: impl Into<String>, author: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            author: author.into(),
            category: Category::default(),
            cover_url: String::new(),
            file_name: None,
            content: None,
        }
    }
}

impl Library {
    /// Books matching `query`, in the order they were added.
    pub async fn search(&self, query: &BookQuery) -> Result<Vec<BookMetadata>> {
        let mut books = self.get_all_books().await?;
        books.retain(|book| query.matches(book));
        Ok(books)
    }

    /// The `limit` most recently added books, newest first.
    pub async fn recent(&self, limit: usize) -> Result<Vec<BookMetadata>> {
        Ok(self.get_all_books().await?.into_iter().rev().take(limit).collect())
    }

    /// Number of books in every category, including empty ones.
    pub async fn category_stats(&self) -> Result<BTreeMap<Category, u64>> {
        let mut stats: BTreeMap<Category, u64> = Category::ALL.into_iter().map(|category| (category, 0)).collect();
        let counts = match &self.store {
            Store::Primary { repo, .. } => repo.count_by_category().await.or_raise(|| ErrorKind::Transaction)?,
            Store::Fallback => {
                let mut counts = BTreeMap::new();
                for book in self.get_all_books().await? {
                    *counts.entry(book.category).or_insert(0) += 1;
                }
                counts.into_iter().collect()
            },
        };
        stats.extend(counts);
        Ok(stats)
    }

    /// Store reading progress for a book and mark it as read just now.
    ///
    /// Returns the updated metadata, or `None` for an unknown book.
    #[instrument(skip(self))]
    pub async fn record_progress(&self, id: &BookId, percent: u8) -> Result<Option<BookMetadata>> {
        let Some(mut metadata) = self.get_metadata(id).await? else {
            return Ok(None);
        };
        metadata.record_progress(percent, OffsetDateTime::now_utc());
        self.update_book(&metadata).await?;
        Ok(Some(metadata))
    }

    /// Add a newly uploaded book under a freshly generated id.
    pub async fn add_book(&self, book: NewBook) -> Result<BookMetadata> {
        let mut metadata = BookMetadata::new(BookId::generate(), book.title, book.author)
            .with_category(book.category)
            .with_cover_url(book.cover_url);
        metadata.file_name = book.file_name;
        self.save_book(&metadata, book.content.as_deref()).await?;
        Ok(metadata)
    }
}
