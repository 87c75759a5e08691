//! Slot backend trait and implementations.
//!
//! This module defines the `SlotBackend` trait, which provides a unified
//! interface for whole-value key/value storage across different backends
//! (local directory, in-memory, read-only decorator).

mod local;
#[cfg(feature = "mock")]
mod mock;
mod ro;

pub use self::local::LocalBackend;
#[cfg(feature = "mock")]
pub use self::mock::MockBackend;
pub use self::ro::ReadOnlyBackend;
use crate::error::Result;
use async_trait::async_trait;

/// Unified interface for slot backends.
///
/// Every value is read and written as a whole; there are no partial
/// updates and no transactions. Callers that need to change part of a
/// value read-modify-write it.
///
/// # Keys
/// All keys must pass [`validate_key`](crate::validate_key).
/// Implementations should enforce this validation.
///
/// # Examples
///
/// ```
/// use shelf_storage::{backend::SlotBackend, error::Result};
///
/// async fn bump_counter(backend: &dyn SlotBackend) -> Result<u64> {
///     let current = backend.read("counter").await?.and_then(|v| v.parse::<u64>().ok()).unwrap_or(0);
///     backend.write("counter", &(current + 1).to_string()).await?;
///     Ok(current + 1)
/// }
/// ```
#[async_trait]
pub trait SlotBackend: Send + Sync {
    /// Name of the configured backend. Used for logging only.
    fn name(&self) -> &str;

    /// Read the value stored under `key`.
    ///
    /// Returns `Ok(None)` if nothing is stored under the key; a missing key
    /// is not an error.
    async fn read(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// Returns [`QuotaExceeded`](crate::error::ErrorKind::QuotaExceeded)
    /// when the backend has no room for the value. The previous value must
    /// survive a failed write.
    async fn write(&self, key: &str, value: &str) -> Result<()>;
}
