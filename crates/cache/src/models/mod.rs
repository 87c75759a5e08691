mod book;
mod content;

pub(crate) use self::book::BookRow;
pub(crate) use self::content::ContentRow;
