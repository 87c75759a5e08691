use shelf_model::{BookContent, BookId};

#[derive(sqlx::FromRow)]
pub(crate) struct ContentRow {
    pub(crate) id: String,
    pub(crate) content: String,
}
impl From<ContentRow> for BookContent {
    fn from(row: ContentRow) -> Self {
        BookContent::new(BookId::from(row.id), row.content)
    }
}
