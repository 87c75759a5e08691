use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    str::FromStr,
};

use super::sanitize;
use crate::error::{Error, ErrorKind};

/// Shelf a book is filed under.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    Fiction,
    NonFiction,
    Technical,
    Business,
    Science,
    History,
    #[default]
    Other,
}
impl Category {
    pub const ALL: [Category; 7] = [
        Category::Fiction,
        Category::NonFiction,
        Category::Technical,
        Category::Business,
        Category::Science,
        Category::History,
        Category::Other,
    ];

    /// Returns the stored (and serialized) form of the category.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Fiction => "fiction",
            Category::NonFiction => "non-fiction",
            Category::Technical => "technical",
            Category::Business => "business",
            Category::Science => "science",
            Category::History => "history",
            Category::Other => "other",
        }
    }

    /// Lenient parse used when reading stored records: anything unknown (or
    /// missing) is filed under [`Category::Other`].
    pub fn parse_lenient(s: Option<&str>) -> Self {
        s.and_then(|s| s.parse().ok()).unwrap_or_default()
    }
}
impl FromStr for Category {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match sanitize(s).as_str() {
            "fiction" => Self::Fiction,
            "nonfiction" => Self::NonFiction,
            "technical" | "tech" => Self::Technical,
            "business" => Self::Business,
            "science" => Self::Science,
            "history" => Self::History,
            "other" => Self::Other,
            _ => exn::bail!(ErrorKind::Parse {
                field: "category",
                value: s.to_string(),
            }),
        })
    }
}
impl Display for Category {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}
impl Serialize for Category {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}
impl<'de> Deserialize<'de> for Category {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Option::<String>::deserialize(deserializer)?;
        Ok(Self::parse_lenient(value.as_deref()))
    }
}
