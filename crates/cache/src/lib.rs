//! SQLite primary store for book metadata and content.
//!
//! This crate provides the transactional store the library prefers whenever
//! it is available. It is the source of truth while in use; the flat slot
//! mirror kept by `shelf-library` is only ever a copy of it.
//!
//! # Architecture
//! The store keeps two partitions keyed by the same book id:
//! - **books**: one row of [`BookMetadata`](shelf_model::BookMetadata) per
//!   book, listed in insertion order.
//! - **book_content**: at most one [`BookContent`](shelf_model::BookContent)
//!   row per book, removed together with its metadata.

mod db;
pub mod error;
mod models;
mod repo;

pub use crate::db::Database;
pub use crate::repo::Repository;
