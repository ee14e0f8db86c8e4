use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier assigned by the source corpus.
///
/// Corpora use either integer or string ids; integers are kept as integers so
/// the metadata file round-trips them without quoting.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    Int(i64),
    Text(String),
}

impl RecordId {
    /// Parse a raw cell: integers stay integers, everything else is text.
    ///
    /// Returns `None` for an empty (or whitespace-only) cell.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(match trimmed.parse::<i64>() {
            Ok(n) => Self::Int(n),
            Err(_) => Self::Text(trimmed.to_string()),
        })
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for RecordId {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

/// One corpus entry.
///
/// Text fields are never absent: loaders normalize missing values to `""`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    pub title: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub summary: String,
}

impl Record {
    pub fn new(
        id: impl Into<RecordId>,
        title: impl Into<String>,
        abstract_text: impl Into<String>,
        summary: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            abstract_text: abstract_text.into(),
            summary: summary.into(),
        }
    }

    /// The text handed to the embedding provider.
    pub fn embedding_text(&self) -> &str {
        &self.abstract_text
    }
}

/// Ordinal position of a record; the join key between vectors and metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position(pub usize);

impl Position {
    pub fn get(self) -> usize {
        self.0
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
