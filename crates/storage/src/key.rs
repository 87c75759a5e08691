//! Key validation.
//!
//! Keys double as file names for the local backend, so anything that could
//! escape the storage root or collide with temporary files is rejected.

use crate::error::{ErrorKind, Result};

/// Validates a slot key.
///
/// A valid key is non-empty, contains no path separators or null bytes,
/// and does not start with a `.` (reserved for in-flight writes).
///
/// # Examples
///
/// ```
/// use shelf_storage::validate_key;
/// assert!(validate_key("books").is_ok());
/// assert!(validate_key("notes_1700000000000").is_ok());
/// assert!(validate_key("").is_err());
/// assert!(validate_key("../books").is_err());
/// assert!(validate_key("a/b").is_err());
/// assert!(validate_key(".books.tmp").is_err());
/// ```
pub fn validate(key: &str) -> Result<&str> {
    let invalid = key.trim().is_empty()
        || key.starts_with('.')
        || key.contains(['/', '\\', '\0'])
        || key.len() > 255;
    match invalid {
        true => exn::bail!(ErrorKind::InvalidKey(key.to_string())),
        false => Ok(key),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("books")]
    #[case("lastSync")]
    #[case("notes_1700000000000")]
    #[case("readingPositions")]
    fn test_valid_keys(#[case] key: &str) {
        assert_eq!(validate(key).unwrap(), key);
    }

    #[rstest]
    #[case("")]
    #[case("   ")]
    #[case(".")]
    #[case("..")]
    #[case("../etc/passwd")]
    #[case("a/b")]
    #[case("a\\b")]
    #[case("a\0b")]
    fn test_invalid_keys(#[case] key: &str) {
        let err = validate(key).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidKey(_)));
    }

    #[test]
    fn test_overlong_key() {
        assert!(validate(&"k".repeat(256)).is_err());
        assert!(validate(&"k".repeat(255)).is_ok());
    }
}
