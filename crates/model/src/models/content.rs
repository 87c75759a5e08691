use base64::{Engine, engine::general_purpose::STANDARD};
use exn::{OptionExt, ResultExt};

use super::BookId;
use crate::error::{ErrorKind, Result};

const DATA_URL_SCHEME: &str = "data:";
const BASE64_MARKER: &str = ";base64";

/// Whether a legacy `fileUrl` value carries the file itself rather than
/// pointing somewhere else.
///
/// Only `data:` references count as embedded content. Anything else (an
/// `https://` link, a relative path, an object URL) is treated as an
/// external reference and left on the metadata record.
pub fn is_embedded_content(value: &str) -> bool {
    value.get(..DATA_URL_SCHEME.len()).is_some_and(|scheme| scheme.eq_ignore_ascii_case(DATA_URL_SCHEME))
}

/// Encode raw file bytes as a base64 `data:` URL.
pub fn data_url(mime: &str, bytes: &[u8]) -> String {
    format!("{DATA_URL_SCHEME}{mime}{BASE64_MARKER},{}", STANDARD.encode(bytes))
}

/// Split a `data:` URL into its media type and decoded bytes.
///
/// Non-base64 payloads are returned as their raw (still percent-encoded)
/// bytes.
pub fn decode_data_url(value: &str) -> Result<(String, Vec<u8>)> {
    if !is_embedded_content(value) {
        exn::bail!(ErrorKind::Parse {
            field: "content",
            value: "not a data: reference".to_string(),
        });
    }
    let (header, payload) = value[DATA_URL_SCHEME.len()..]
        .split_once(',')
        .ok_or_raise(|| ErrorKind::Parse { field: "content", value: "missing payload separator".to_string() })?;
    let (mime, is_base64) = match header.strip_suffix(BASE64_MARKER) {
        Some(mime) => (mime, true),
        None => (header, false),
    };
    let bytes = match is_base64 {
        true => STANDARD
            .decode(payload.trim())
            .or_raise(|| ErrorKind::Parse { field: "content", value: "invalid base64 payload".to_string() })?,
        false => payload.as_bytes().to_vec(),
    };
    Ok((mime.to_string(), bytes))
}

/// The stored file payload of a book, addressed by the book's id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookContent {
    pub id: BookId,
    /// Encoded payload, usually a `data:` URL.
    pub content: String,
}
impl BookContent {
    pub fn new(id: impl Into<BookId>, content: impl Into<String>) -> Self {
        Self { id: id.into(), content: content.into() }
    }
}
