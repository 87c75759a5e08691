mod book;
mod category;
mod content;
mod id;

pub use self::book::{Book, BookMetadata};
pub use self::category::Category;
pub use self::content::{BookContent, data_url, decode_data_url, is_embedded_content};
pub use self::id::BookId;

fn sanitize(s: impl AsRef<str>) -> String {
    s.as_ref().trim().to_lowercase().replace('-', "").replace('_', "").replace(' ', "")
}
