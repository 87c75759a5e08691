//! Book library storage.
//!
//! [`Library`] is the single entry point for storing and reading books. It
//! prefers the transactional primary store (`shelf-cache`) and falls back to
//! a flat slot store (`shelf-storage`) when the primary store can't be used.
//!
//! # Architecture
//! - **Primary store**: book metadata and content in separate partitions,
//!   written together in one transaction.
//! - **Fallback slot**: a JSON array of book metadata under the `"books"`
//!   key. A mirror of the primary store while it is in use; the whole
//!   library (content embedded in `fileUrl`) when it isn't.
//! - **Migration**: moves legacy records out of the slot into the primary
//!   store, once.

pub mod error;
pub mod fallback;
mod backup;
mod library;
pub mod migrate;
pub mod query;

pub use crate::library::{Backend, Library};
pub use crate::migrate::MigrationReport;
pub use crate::query::{BookQuery, NewBook};
