//! Book records for the shelf library.
//!
//! A book is stored as two records sharing the same [`BookId`]:
//! - **Metadata** ([`BookMetadata`]): everything needed to list, search and
//!   display a book. Small, read often.
//! - **Content** ([`BookContent`]): the uploaded file as an embeddable
//!   `data:` reference. Large, read only when the book is opened.
//!
//! Older data stored both in a single record, with the content sitting in
//! the metadata's legacy `fileUrl` field. [`BookMetadata::take_embedded_content`]
//! splits such a record back into its two halves.

pub mod error;
pub mod models;

pub use crate::models::{Book, BookContent, BookId, BookMetadata, Category};
pub use crate::models::{data_url, decode_data_url, is_embedded_content};
