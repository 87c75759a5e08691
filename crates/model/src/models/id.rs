use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::sync::atomic::{AtomicI64, Ordering};
use time::UtcDateTime;

/// Last identifier handed out by [`BookId::generate`], in milliseconds.
static LAST_GENERATED: AtomicI64 = AtomicI64::new(0);

/// Opaque, immutable book identifier. Primary key of both the metadata and
/// the content record of a book.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookId(String);

impl BookId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a new identifier from the current time in milliseconds since
    /// the Unix epoch.
    ///
    /// Two calls within the same millisecond still return distinct ids: the
    /// second one is bumped past the last id handed out by this process.
    pub fn generate() -> Self {
        let now = i64::try_from(UtcDateTime::now().unix_timestamp_nanos() / 1_000_000).unwrap_or(i64::MAX);
        let previous = LAST_GENERATED
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| Some(now.max(last.saturating_add(1))))
            // The closure always returns Some.
            .unwrap_or_else(|last| last);
        Self(now.max(previous.saturating_add(1)).to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}
impl Display for BookId {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.0)
    }
}
impl AsRef<str> for BookId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
impl From<&str> for BookId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}
impl From<String> for BookId {
    fn from(id: String) -> Self {
        Self(id)
    }
}
