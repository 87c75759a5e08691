//! Flat key/value slot storage.
//!
//! A slot store holds whole string values under short keys, with no partial
//! updates: callers read a value, modify it, and write the whole value back.
//! It is the storage of last resort for the library, used when the primary
//! database is unavailable and as a metadata mirror when it is.

pub mod backend;
pub mod error;
mod key;

pub use crate::backend::SlotBackend;
pub use crate::key::validate as validate_key;
use std::sync::Arc;

pub type BackendHandle = Arc<dyn SlotBackend + Send + Sync>;
