//! Database connection and pool management.

use exn::ResultExt;
use sqlx::SqliteConnection;
use sqlx::pool::PoolConnectionMetadata;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteSynchronous};
use std::path::Path;
use tracing::instrument;

use crate::error::{ErrorKind, Result};

/// Embedded migrations that are run automatically on connect. They create
/// both partitions when missing, so opening an existing store is a no-op.
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");
// Reads (listing, search) can overlap; writes serialize on the WAL lock.
const MAX_CONNECTIONS: u32 = 4;

/// Database connection pool for the primary store.
///
/// This is the main entry point for interacting with the primary store. It
/// manages the SQLite connection pool and hands it to [`Repository`](crate::Repository).
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    async fn new(options: SqliteConnectOptions, max: Option<u32>) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            // Query-based PRAGMAs only affect the connection they run on, so
            // they have to be applied to every connection the pool opens.
            .after_connect(|conn, meta| Box::pin(async move {
                Self::apply_pragmas(conn, meta).await
            }))
            .max_connections(max.unwrap_or(MAX_CONNECTIONS))
            .connect_with(options)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// Connect to the primary store at the given path.
    ///
    /// Creates the database file if it doesn't exist and runs migrations. The
    /// parent directory must already exist.
    #[instrument("connecting to primary store", skip_all, fields(path = %path.as_ref().display()))]
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let options = Self::base_options().filename(path).create_if_missing(true);
        Self::new(options, None).await
    }

    /// Connect to an in-memory database.
    ///
    /// Note:
    /// - In-memory databases are destroyed when the connection closes.
    /// - Do NOT apply `#[cfg(test)]` so that other crates can also use this in their tests.
    pub async fn connect_in_memory() -> Result<Self> {
        let options = Self::base_options().filename(":memory:");
        // Every connection to ":memory:" opens a separate, empty database
        // unless the cache is shared, so keep to a single connection.
        Self::new(options, Some(1)).await
    }

    /// Base connection options shared between file and in-memory databases.
    fn base_options() -> SqliteConnectOptions {
        SqliteConnectOptions::new()
            // WAL lets the listing run while a save is being committed.
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            // Required for book_content rows to cascade with their books.
            .foreign_keys(true)
            .synchronous(SqliteSynchronous::Normal)
            // Concurrent saves to the same store wait this long for the write
            // lock before failing with SQLITE_BUSY.
            .busy_timeout(std::time::Duration::from_millis(1500))
            // Lets `close` hand pages freed by deleted content back to the
            // filesystem. SQLite only honours this for a file created with it
            // set; an older file keeps its mode until a full VACUUM.
            .auto_vacuum(sqlx::sqlite::SqliteAutoVacuum::Incremental)
    }

    /// Apply additional PRAGMA settings that aren't exposed via SqliteConnectOptions.
    async fn apply_pragmas(conn: &mut SqliteConnection, _meta: PoolConnectionMetadata) -> sqlx::Result<()> {
        sqlx::query(
            r#"
                PRAGMA wal_autocheckpoint = 1000;
                PRAGMA cache_size = -4096;
                PRAGMA temp_store = MEMORY;
                PRAGMA analysis_limit = 400;
            "#,
        )
        .execute(conn)
        .await?;
        Ok(())
    }

    /// Run database migrations.
    ///
    /// This is called automatically by `connect` and `connect_in_memory`.
    #[instrument("performing database migrations", skip_all)]
    async fn migrate(&self) -> Result<()> {
        MIGRATOR.run(&self.pool).await.or_raise(|| ErrorKind::Migration)
    }

    /// Get a reference to the underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the database connection pool.
    ///
    /// This waits for all connections to be returned to the pool and then
    /// closes them. After calling this, the Database instance should not
    /// be used.
    pub async fn close(&self) {
        // Let SQLite update query planner statistics, then hand back the
        // pages freed by deleted content.
        _ = sqlx::query("PRAGMA optimize").execute(&self.pool).await;
        _ = sqlx::query("PRAGMA incremental_vacuum").execute(&self.pool).await;
        self.pool.close().await;
    }
}
