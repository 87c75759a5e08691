use crate::error::{Error, ErrorKind};
use exn::ResultExt;
use shelf_model::{BookId, BookMetadata, Category};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

#[derive(sqlx::FromRow)]
pub(crate) struct BookRow {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) author: String,
    pub(crate) cover_url: String,
    #[sqlx(default)]
    pub(crate) file_name: Option<String>,
    pub(crate) category: String,
    pub(crate) progress: i64,
    #[sqlx(default)]
    pub(crate) last_read: Option<String>,
    #[sqlx(default)]
    pub(crate) file_url: Option<String>,
}
impl TryFrom<&BookMetadata> for BookRow {
    type Error = Error;
    fn try_from(book: &BookMetadata) -> Result<Self, Self::Error> {
        Ok(Self {
            id: book.id.as_str().to_string(),
            title: book.title.clone(),
            author: book.author.clone(),
            cover_url: book.cover_url.clone(),
            file_name: book.file_name.clone(),
            category: book.category.as_str().to_string(),
            progress: i64::from(book.progress),
            last_read: book
                .last_read
                .map(|at| at.format(&Rfc3339).or_raise(|| ErrorKind::InvalidData("last read")))
                .transpose()?,
            file_url: book.file_url.clone(),
        })
    }
}
impl TryFrom<BookRow> for BookMetadata {
    type Error = Error;
    fn try_from(row: BookRow) -> Result<Self, Self::Error> {
        let progress = u8::try_from(row.progress).or_raise(|| ErrorKind::InvalidData("progress"))?;
        if progress > 100 {
            exn::bail!(ErrorKind::InvalidData("progress"));
        }
        Ok(Self {
            id: BookId::from(row.id),
            title: row.title,
            author: row.author,
            cover_url: row.cover_url,
            file_name: row.file_name,
            category: row.category.parse::<Category>().or_raise(|| ErrorKind::InvalidData("category"))?,
            progress,
            last_read: row
                .last_read
                .map(|s| OffsetDateTime::parse(&s, &Rfc3339).or_raise(|| ErrorKind::InvalidData("last read")))
                .transpose()?,
            file_url: row.file_url,
        })
    }
}
