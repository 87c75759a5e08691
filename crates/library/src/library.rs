//! The storage facade.

use crate::error::{ErrorKind, Result};
use crate::fallback::FallbackStore;
use exn::ResultExt;
use shelf_cache::{Database, Repository};
use shelf_config::{Config, PrimaryConfig};
use shelf_model::{Book, BookContent, BookId, BookMetadata};
use shelf_storage::BackendHandle;
use shelf_storage::backend::ReadOnlyBackend;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use tracing::instrument;

/// Which store a [`Library`] reads from and writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// The transactional store, mirrored into the fallback slot after every
    /// change.
    Primary,
    /// The fallback slot alone. Content is embedded in each book's `fileUrl`.
    Fallback,
}

pub(crate) enum Store {
    Primary { db: Database, repo: Repository },
    Fallback,
}

/// Book library over a primary store and a fallback slot.
///
/// The store is selected once, when the library is constructed, and never
/// changes afterwards. With the primary store selected, the fallback slot
/// holds a mirror of every book's metadata which is refreshed after each
/// change; failing to refresh it is logged and otherwise ignored.
///
/// There is no locking per book: two concurrent saves of the same book both
/// succeed and the one committed last wins.
pub struct Library {
    pub(crate) store: Store,
    pub(crate) fallback: FallbackStore,
    pub(crate) migrated: AtomicBool,
    /// The library runs on a slot it must not write to.
    read_only: bool,
}

impl Library {
    /// Whether the primary store can be used with the given configuration.
    ///
    /// Checks that the store is enabled and that its database file could be
    /// created: either it's in memory, or the nearest existing ancestor of its
    /// location is a directory. Touches nothing on disk.
    pub fn is_supported(config: &Config) -> bool {
        let primary = &config.primary;
        if !primary.enabled {
            return false;
        }
        if primary.is_in_memory() {
            return true;
        }
        if primary.path.is_dir() {
            return false;
        }
        primary
            .path
            .parent()
            .and_then(|parent| parent.ancestors().find(|ancestor| ancestor.exists()))
            .is_some_and(|ancestor| ancestor.is_dir())
    }

    /// Open the library described by `config`, storing the fallback slot in
    /// `fallback`.
    ///
    /// Never fails: when the primary store is unsupported or can't be
    /// connected to, the library runs on the fallback slot alone and the
    /// reason is logged.
    ///
    /// A read-only fallback slot keeps the primary store's mirror from being
    /// written. Without a primary store the slot is the library, so every
    /// write fails with [`ErrorKind::Unsupported`] instead.
    pub async fn open(config: &Config, fallback: BackendHandle) -> Self {
        let read_only = config.fallback.read_only;
        let db = if Self::is_supported(config) {
            match Self::connect(&config.primary).await {
                Ok(db) => Some(db),
                Err(e) => {
                    tracing::warn!(error = ?e, "Could not open primary store; using fallback slot");
                    None
                },
            }
        } else {
            tracing::info!(
                enabled = config.primary.enabled,
                path = %config.primary.path.display(),
                "Primary store unavailable; using fallback slot"
            );
            None
        };
        match db {
            Some(db) if read_only => Self::primary(db, Arc::new(ReadOnlyBackend::new(fallback))),
            Some(db) => Self::primary(db, fallback),
            None => Self { read_only, ..Self::fallback_only(fallback) },
        }
    }

    async fn connect(config: &PrimaryConfig) -> Result<Database> {
        if config.is_in_memory() {
            return Database::connect_in_memory().await.or_raise(|| ErrorKind::Unsupported);
        }
        if let Some(parent) = config.path.parent() {
            tokio::fs::create_dir_all(parent).await.or_raise(|| ErrorKind::Unsupported)?;
        }
        Database::connect(&config.path).await.or_raise(|| ErrorKind::Unsupported)
    }

    /// Library on an already connected primary store.
    pub fn primary(db: Database, fallback: BackendHandle) -> Self {
        let repo = Repository::from(&db);
        Self::new(Store::Primary { db, repo }, fallback)
    }

    /// Library on the fallback slot alone.
    pub fn fallback_only(fallback: BackendHandle) -> Self {
        Self::new(Store::Fallback, fallback)
    }

    fn new(store: Store, fallback: BackendHandle) -> Self {
        Self {
            store,
            fallback: FallbackStore::new(fallback),
            migrated: AtomicBool::new(false),
            read_only: false,
        }
    }

    pub fn backend(&self) -> Backend {
        match self.store {
            Store::Primary { .. } => Backend::Primary,
            Store::Fallback => Backend::Fallback,
        }
    }

    pub fn fallback(&self) -> &FallbackStore {
        &self.fallback
    }

    /// Close the primary store, if any. The library must not be used
    /// afterwards.
    pub async fn close(&self) {
        if let Store::Primary { db, .. } = &self.store {
            db.close().await;
        }
    }

    // =========================================================================
    // Fallback slot helpers
    // =========================================================================

    async fn slot_books(&self) -> Result<Vec<BookMetadata>> {
        Ok(self.fallback.load().await?.unwrap_or_default())
    }

    fn ensure_slot_writable(&self) -> Result<()> {
        if self.read_only {
            exn::bail!(ErrorKind::Unsupported);
        }
        Ok(())
    }

    async fn slot_find(&self, id: &BookId) -> Result<Option<BookMetadata>> {
        Ok(self.slot_books().await?.into_iter().find(|book| &book.id == id))
    }

    /// Insert or replace a record in the slot, keeping its position. A
    /// record without `fileUrl` keeps the content already embedded in the
    /// record it replaces.
    async fn slot_put(&self, mut metadata: BookMetadata) -> Result<()> {
        self.ensure_slot_writable()?;
        let mut books = self.slot_books().await?;
        match books.iter_mut().find(|book| book.id == metadata.id) {
            Some(existing) => {
                if metadata.file_url.is_none() && existing.has_embedded_content() {
                    metadata.file_url = existing.file_url.take();
                }
                *existing = metadata;
            },
            None => books.push(metadata),
        }
        self.fallback.store(&books).await
    }

    // =========================================================================
    // Mirror
    // =========================================================================

    /// Overwrite the fallback slot with the metadata of every book in the
    /// primary store. Does nothing when running on the fallback slot alone.
    #[instrument(skip_all)]
    pub async fn sync_mirror(&self) -> Result<()> {
        let Store::Primary { repo, .. } = &self.store else {
            return Ok(());
        };
        let books = repo.list().await.or_raise(|| ErrorKind::Transaction)?;
        self.fallback.store(&books).await?;
        tracing::debug!(books = books.len(), "Refreshed fallback mirror");
        Ok(())
    }

    /// [`sync_mirror`](Self::sync_mirror), logging failures instead of
    /// returning them.
    pub(crate) async fn refresh_mirror(&self) {
        if let Err(e) = self.sync_mirror().await {
            tracing::warn!(error = ?e, "Failed to refresh fallback mirror");
        }
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Store a book without validating it or refreshing the mirror.
    pub(crate) async fn write_book(&self, metadata: &BookMetadata, content: Option<&str>) -> Result<()> {
        // An empty payload is no payload.
        let content = content.filter(|content| !content.is_empty());
        match &self.store {
            Store::Primary { repo, .. } => {
                // Embedded content moves to the content partition so it never
                // reaches the mirror. Explicit content takes precedence.
                let mut metadata = metadata.clone();
                let embedded = metadata.take_embedded_content();
                let content = match content {
                    Some(content) => Some(BookContent::new(metadata.id.clone(), content)),
                    None => embedded,
                };
                repo.upsert(&metadata, content.as_ref()).await.or_raise(|| ErrorKind::Transaction)
            },
            Store::Fallback => {
                let mut metadata = metadata.clone();
                if let Some(content) = content {
                    metadata.file_url = Some(content.to_string());
                }
                self.slot_put(metadata).await
            },
        }
    }

    /// Whether a book with the given id is stored.
    pub async fn contains(&self, id: &BookId) -> Result<bool> {
        match &self.store {
            Store::Primary { repo, .. } => repo.exists(id).await.or_raise(|| ErrorKind::Transaction),
            Store::Fallback => Ok(self.slot_find(id).await?.is_some()),
        }
    }

    /// Store a book's metadata and, when given, its content.
    ///
    /// With the primary store both are written in one transaction. Without
    /// it the content is embedded in the record's `fileUrl`. Saving without
    /// content keeps whatever content the book already had.
    #[instrument(skip_all, fields(id = %metadata.id))]
    pub async fn save_book(&self, metadata: &BookMetadata, content: Option<&str>) -> Result<()> {
        metadata.validate().or_raise(|| ErrorKind::Invalid)?;
        self.write_book(metadata, content).await?;
        tracing::info!(title = %metadata.title, with_content = content.is_some(), "Saved book");
        self.refresh_mirror().await;
        Ok(())
    }

    /// The metadata of every book, in the order they were added.
    ///
    /// If the primary store can't be read, the fallback mirror is returned
    /// instead.
    pub async fn get_all_books(&self) -> Result<Vec<BookMetadata>> {
        match &self.store {
            Store::Primary { repo, .. } => match repo.list().await {
                Ok(books) => Ok(books),
                Err(e) => {
                    tracing::warn!(error = ?e, "Failed to list primary store; reading fallback mirror");
                    self.slot_books().await
                },
            },
            Store::Fallback => self.slot_books().await,
        }
    }

    /// Metadata of a single book, exactly as stored.
    pub(crate) async fn get_metadata(&self, id: &BookId) -> Result<Option<BookMetadata>> {
        match &self.store {
            Store::Primary { repo, .. } => repo.get(id).await.or_raise(|| ErrorKind::Transaction),
            Store::Fallback => self.slot_find(id).await,
        }
    }

    /// A book's content, or `None` for unknown books and books without
    /// content.
    pub async fn get_book_content(&self, id: &BookId) -> Result<Option<String>> {
        match &self.store {
            Store::Primary { repo, .. } => Ok(repo
                .get_content(id)
                .await
                .or_raise(|| ErrorKind::Transaction)?
                .map(|content| content.content)),
            Store::Fallback => Ok(self
                .slot_find(id)
                .await?
                .and_then(|mut book| book.take_embedded_content())
                .map(|content| content.content)),
        }
    }

    /// A book's metadata together with its content.
    ///
    /// Returns `None` for unknown books. Content embedded in the record is
    /// split out, so `metadata.file_url` never holds it.
    pub async fn get_book(&self, id: &BookId) -> Result<Option<Book>> {
        let Some(mut metadata) = self.get_metadata(id).await? else {
            return Ok(None);
        };
        let content = match &self.store {
            Store::Primary { .. } => self.get_book_content(id).await?,
            Store::Fallback => metadata.take_embedded_content().map(|content| content.content),
        };
        Ok(Some(Book { metadata, content }))
    }

    /// Delete a book and its content. Deleting an unknown book succeeds and
    /// changes nothing.
    #[instrument(skip_all, fields(id = %id))]
    pub async fn delete_book(&self, id: &BookId) -> Result<()> {
        let deleted = match &self.store {
            Store::Primary { repo, .. } => {
                let deleted = repo.delete(id).await.or_raise(|| ErrorKind::Transaction)?;
                self.refresh_mirror().await;
                deleted
            },
            Store::Fallback => {
                self.ensure_slot_writable()?;
                let mut books = self.slot_books().await?;
                let before = books.len();
                books.retain(|book| &book.id != id);
                let deleted = books.len() != before;
                if deleted {
                    self.fallback.store(&books).await?;
                }
                deleted
            },
        };
        if deleted {
            tracing::info!("Deleted book");
        }
        Ok(())
    }

    /// Overwrite a book's metadata. Its content is left untouched, unless
    /// `fileUrl` embeds new content: with the primary store that content
    /// replaces the stored one.
    #[instrument(skip_all, fields(id = %metadata.id))]
    pub async fn update_book(&self, metadata: &BookMetadata) -> Result<()> {
        metadata.validate().or_raise(|| ErrorKind::Invalid)?;
        match &self.store {
            Store::Primary { repo, .. } => {
                let mut metadata = metadata.clone();
                match metadata.take_embedded_content() {
                    Some(content) => {
                        repo.upsert(&metadata, Some(&content)).await.or_raise(|| ErrorKind::Transaction)?;
                    },
                    None => {
                        if !repo.update_metadata(&metadata).await.or_raise(|| ErrorKind::Transaction)? {
                            tracing::debug!("Updated unknown book; stored as new");
                        }
                    },
                }
                self.refresh_mirror().await;
            },
            Store::Fallback => self.slot_put(metadata.clone()).await?,
        }
        Ok(())
    }
}
