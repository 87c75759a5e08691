//! Library Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction. Errors from the primary store, the
//! slot backends and the record model are raised into one of these kinds;
//! the original error stays in the tree.

use derive_more::{Display, Error};

/// A library error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Classifies the origin of a library failure.
///
/// ### Operational Errors
/// - [`ErrorKind::Invalid`]
/// - [`ErrorKind::Backup`]
/// - [`ErrorKind::Unsupported`]
///
/// ### Dependency Errors
/// - [`ErrorKind::Transaction`]
/// - [`ErrorKind::Fallback`]
/// - [`ErrorKind::Corrupt`]
#[derive(Debug, Display, Error, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The primary store is disabled or its location can't be used, or the
    /// library runs on a read-only fallback slot and was asked to write.
    #[display("storage is not available for this operation")]
    Unsupported,
    /// A primary store transaction failed; nothing it wrote was committed.
    #[display("primary store transaction failed")]
    Transaction,
    /// Reading or writing the fallback slot failed.
    #[display("fallback slot storage failed")]
    Fallback,
    /// The fallback slot holds something that isn't a list of books.
    #[display("fallback slot holds undecodable data")]
    Corrupt,
    /// A book failed validation and was not stored.
    #[display("invalid book")]
    Invalid,
    /// A backup could not be decoded or produced.
    #[display("invalid backup")]
    Backup,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        // Busy databases and full disks can clear up on their own.
        matches!(self, Self::Transaction | Self::Fallback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_retryable() {
        assert!(ErrorKind::Transaction.is_retryable());
        assert!(ErrorKind::Fallback.is_retryable());
        assert!(!ErrorKind::Corrupt.is_retryable());
        assert!(!ErrorKind::Invalid.is_retryable());
        assert!(!ErrorKind::Unsupported.is_retryable());
    }
}
