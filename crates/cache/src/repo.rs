//! Combined repository for book metadata and content.
//!
//! They're tightly coupled: content can't exist without the metadata it
//! belongs to, and removing a book removes both.

use crate::Database;
use crate::error::{ErrorKind, Result};
use crate::models::{BookRow, ContentRow};
use exn::ResultExt;
use shelf_model::{BookContent, BookId, BookMetadata, Category};
use sqlx::SqlitePool;
use sqlx::SqliteConnection;
use tracing::instrument;

/// Repository for managing books in the primary store.
///
/// # Relationships
///
/// - Every book has exactly one metadata row, keyed by its id.
/// - A book has at most one content row, keyed by the same id.
/// - Deleting a book deletes its content row too.
/// - Metadata rows are listed in insertion order. Re-saving an existing book
///   updates it in place and keeps its position.
#[derive(Debug, Clone)]
pub struct Repository {
    pool: SqlitePool,
}
impl From<&Database> for Repository {
    fn from(db: &Database) -> Self {
        Self { pool: db.pool().clone() }
    }
}
impl Repository {
    async fn write_metadata(conn: &mut SqliteConnection, row: BookRow) -> Result<()> {
        sqlx::query(include_str!("../queries/upsert_book.sql"))
            .bind(row.id)
            .bind(row.title)
            .bind(row.author)
            .bind(row.cover_url)
            .bind(row.file_name)
            .bind(row.category)
            .bind(row.progress)
            .bind(row.last_read)
            .bind(row.file_url)
            .execute(conn)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(())
    }

    // =========================================================================
    // Insert
    // =========================================================================

    /// Insert or replace a book's metadata and, when supplied, its content.
    ///
    /// Both rows are written in a single transaction: either both are stored
    /// or neither is. Without `content` any previously stored content for the
    /// book is left as it was.
    ///
    /// Returns [`ErrorKind::InvalidData`] if the content belongs to a
    /// different book.
    #[instrument(skip_all, fields(id = %metadata.id))]
    pub async fn upsert(&self, metadata: &BookMetadata, content: Option<&BookContent>) -> Result<()> {
        if let Some(content) = content
            && content.id != metadata.id
        {
            exn::bail!(ErrorKind::InvalidData("content id"));
        }
        let row = BookRow::try_from(metadata)?;
        let mut tx = self.pool.begin().await.or_raise(|| ErrorKind::Database)?;
        Self::write_metadata(&mut *tx, row).await?;
        if let Some(content) = content {
            sqlx::query(include_str!("../queries/upsert_content.sql"))
                .bind(content.id.as_str())
                .bind(content.content.as_str())
                .execute(&mut *tx)
                .await
                .or_raise(|| ErrorKind::Database)?;
        }
        tx.commit().await.or_raise(|| ErrorKind::Database)?;
        tracing::debug!(with_content = content.is_some(), "Stored book");
        Ok(())
    }

    // =========================================================================
    // Get/Fetch
    // =========================================================================

    /// Get a book's metadata by id.
    pub async fn get(&self, id: &BookId) -> Result<Option<BookMetadata>> {
        let row: Option<BookRow> = sqlx::query_as(include_str!("../queries/get_book.sql"))
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        row.map(BookMetadata::try_from).transpose()
    }

    /// Get a book's content by id.
    ///
    /// Returns `None` both for unknown books and for books stored without
    /// content.
    pub async fn get_content(&self, id: &BookId) -> Result<Option<BookContent>> {
        let row: Option<ContentRow> = sqlx::query_as(include_str!("../queries/get_content.sql"))
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(row.map(BookContent::from))
    }

    /// Check whether metadata for the given id is stored.
    pub async fn exists(&self, id: &BookId) -> Result<bool> {
        sqlx::query_scalar(include_str!("../queries/book_exists.sql"))
            .bind(id.as_str())
            .fetch_one(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)
    }

    // =========================================================================
    // Listing
    // =========================================================================

    /// List the metadata of every book, in insertion order.
    pub async fn list(&self) -> Result<Vec<BookMetadata>> {
        let rows: Vec<BookRow> = sqlx::query_as(include_str!("../queries/list_books.sql"))
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        rows.into_iter().map(BookMetadata::try_from).collect()
    }

    /// Count the total number of books.
    pub async fn count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar(include_str!("../queries/count_books.sql"))
            .fetch_one(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        u64::try_from(count).or_raise(|| ErrorKind::InvalidData("count"))
    }

    /// Count the books filed under each category. Categories without books
    /// are left out.
    pub async fn count_by_category(&self) -> Result<Vec<(Category, u64)>> {
        let rows: Vec<(String, i64)> = sqlx::query_as(include_str!("../queries/count_by_category.sql"))
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        rows.into_iter()
            .map(|(category, count)| {
                Ok((
                    category.parse::<Category>().or_raise(|| ErrorKind::InvalidData("category"))?,
                    u64::try_from(count).or_raise(|| ErrorKind::InvalidData("count"))?,
                ))
            })
            .collect()
    }

    // =========================================================================
    // Update
    // =========================================================================

    /// Overwrite a book's metadata, leaving its content untouched.
    ///
    /// Updating an unknown id stores it as a new book (put semantics).
    /// Returns `true` if an existing book was updated, `false` if one was
    /// inserted.
    #[instrument(skip_all, fields(id = %metadata.id))]
    pub async fn update_metadata(&self, metadata: &BookMetadata) -> Result<bool> {
        let row = BookRow::try_from(metadata)?;
        let mut tx = self.pool.begin().await.or_raise(|| ErrorKind::Database)?;
        let result = sqlx::query(include_str!("../queries/update_book.sql"))
            .bind(&row.title)
            .bind(&row.author)
            .bind(&row.cover_url)
            .bind(&row.file_name)
            .bind(&row.category)
            .bind(row.progress)
            .bind(&row.last_read)
            .bind(&row.file_url)
            .bind(&row.id)
            .execute(&mut *tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let updated = result.rows_affected() > 0;
        if !updated {
            Self::write_metadata(&mut *tx, row).await?;
        }
        tx.commit().await.or_raise(|| ErrorKind::Database)?;
        Ok(updated)
    }

    // =========================================================================
    // Delete
    // =========================================================================

    /// Delete a book's metadata and content.
    ///
    /// Both rows are removed in a single transaction. Returns `true` if a
    /// book was deleted, `false` if the id was not found.
    #[instrument(skip_all, fields(id = %id))]
    pub async fn delete(&self, id: &BookId) -> Result<bool> {
        let mut tx = self.pool.begin().await.or_raise(|| ErrorKind::Database)?;
        sqlx::query(include_str!("../queries/delete_content.sql"))
            .bind(id.as_str())
            .execute(&mut *tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let result = sqlx::query(include_str!("../queries/delete_book.sql"))
            .bind(id.as_str())
            .execute(&mut *tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        tx.commit().await.or_raise(|| ErrorKind::Database)?;
        Ok(result.rows_affected() > 0)
    }
}
