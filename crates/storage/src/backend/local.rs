//! Local filesystem slot backend.
//!
//! This module provides a slot backend implementation for the local filesystem.
//! Each key is stored as one file in a configured directory and accessed using
//! `tokio::fs` for async I/O.

use crate::error::{ErrorKind, Result};
use crate::{SlotBackend, validate_key};
use async_trait::async_trait;
use std::fs::create_dir_all as sync_create_dir;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Suffix of the temporary file a value is written to before it replaces
/// the previous value.
const TEMP_SUFFIX: &str = ".tmp";

/// Local filesystem slot backend.
///
/// Stores one file per key in a directory on the local filesystem. Writes
/// go to a hidden temporary file first and are renamed into place, so a
/// failed write never leaves a truncated value behind.
///
/// # Examples
///
/// ```no_run
/// use shelf_storage::backend::LocalBackend;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = LocalBackend::new("local", "/path/to/slots")?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct LocalBackend {
    name: String,
    /// Directory holding one file per key
    root: PathBuf,
}
impl LocalBackend {
    /// Create a new local filesystem backend.
    ///
    /// # Arguments
    /// * `root` - Absolute path to the slot directory
    ///
    /// # Errors
    ///
    /// Returns an error if the path is not absolute, or exists and is not a
    /// directory.
    pub fn new(name: impl Into<String>, root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_absolute() {
            exn::bail!(ErrorKind::BackendError(format!("`{}` is not an absolute path", root.display())));
        }
        if root.exists() {
            if !root.is_dir() {
                exn::bail!(ErrorKind::BackendError(format!("`{}` is not a directory", root.display())));
            }
        } else {
            // Use non-async here; it'll only happen once on startup and it's
            // not worth the hassle of making the constructor async.
            sync_create_dir(&root).map_err(|e| Self::map_io_error(e, &root))?;
        }
        Ok(Self { name: name.into(), root })
    }

    fn slot_path(&self, key: &str) -> Result<PathBuf> {
        Ok(self.root.join(validate_key(key)?))
    }

    fn temp_path(&self, key: &str) -> PathBuf {
        self.root.join(format!(".{key}{TEMP_SUFFIX}"))
    }

    fn map_io_error(e: std::io::Error, path: &Path) -> ErrorKind {
        match e.kind() {
            std::io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied(path.to_path_buf()),
            std::io::ErrorKind::StorageFull | std::io::ErrorKind::QuotaExceeded => {
                ErrorKind::QuotaExceeded(path.display().to_string())
            },
            _ => ErrorKind::Io(e),
        }
    }
}

#[async_trait]
impl SlotBackend for LocalBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn read(&self, key: &str) -> Result<Option<String>> {
        let path = self.slot_path(key)?;
        match fs::read_to_string(&path).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Self::map_io_error(e, &path).into()),
        }
    }

    async fn write(&self, key: &str, value: &str) -> Result<()> {
        let path = self.slot_path(key)?;
        let temp = self.temp_path(key);
        if let Err(e) = fs::write(&temp, value).await {
            // Best-effort cleanup; the previous value is still intact.
            _ = fs::remove_file(&temp).await;
            return Err(Self::map_io_error(e, &path).into());
        }
        Ok(fs::rename(&temp, &path).await.map_err(|e| Self::map_io_error(e, &path))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_requires_absolute_path() {
        let temp_dir = tempfile::tempdir().unwrap();
        assert!(LocalBackend::new("name", temp_dir.path()).is_ok());
        assert!(LocalBackend::new("name", "relative/path").is_err());
        assert!(LocalBackend::new("name", "./relative").is_err());
    }

    #[test]
    fn test_new_creates_missing_directory() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path().join("nested/slots");
        LocalBackend::new("name", &root).unwrap();
        assert!(root.is_dir());
    }

    #[test]
    fn test_new_rejects_file_root() {
        let temp_dir = tempfile::tempdir().unwrap();
        let file = temp_dir.path().join("file");
        std::fs::write(&file, b"not a directory").unwrap();
        assert!(LocalBackend::new("name", &file).is_err());
    }

    #[tokio::test]
    async fn test_write_and_read() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("name", temp_dir.path()).unwrap();
        backend.write("books", "[]").await.unwrap();
        assert_eq!(backend.read("books").await.unwrap().as_deref(), Some("[]"));
        assert_eq!(std::fs::read_to_string(temp_dir.path().join("books")).unwrap(), "[]");
    }

    #[tokio::test]
    async fn test_write_replaces_and_leaves_no_temp_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("name", temp_dir.path()).unwrap();
        backend.write("books", "first").await.unwrap();
        backend.write("books", "second").await.unwrap();
        assert_eq!(backend.read("books").await.unwrap().as_deref(), Some("second"));
        assert!(!temp_dir.path().join(".books.tmp").exists());
    }

    #[tokio::test]
    async fn test_read_missing_is_none() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("name", temp_dir.path()).unwrap();
        assert_eq!(backend.read("books").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_keys_are_separate_files() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("name", temp_dir.path()).unwrap();
        backend.write("books", "[]").await.unwrap();
        backend.write("lastSync", "2024-01-01T00:00:00Z").await.unwrap();
        assert_eq!(backend.read("books").await.unwrap().as_deref(), Some("[]"));
        assert!(temp_dir.path().join("lastSync").is_file());
    }

    #[tokio::test]
    async fn test_key_traversal_rejected() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("name", temp_dir.path()).unwrap();
        assert!(backend.read("../etc/passwd").await.is_err());
        assert!(backend.write("../escape", "bad").await.is_err());
    }
}
