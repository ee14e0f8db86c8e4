//! Per-record descriptive fields, aligned by position to the vector index.

use crate::types::{Position, Record};
use crate::vector::VectorError;

/// Ordered records; position `i` describes vector `i`.
///
/// There is no API to reorder or remove entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataStore {
    records: Vec<Record>,
}

impl MetadataStore {
    pub fn new(records: Vec<Record>) -> Self {
        Self { records }
    }

    /// Record at `position`, failing outside `[0, len)`.
    pub fn get(&self, position: Position) -> Result<&Record, VectorError> {
        self.records
            .get(position.get())
            .ok_or(VectorError::PositionOutOfRange {
                position: position.get(),
                len: self.records.len(),
            })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.records.iter()
    }

    pub fn as_slice(&self) -> &[Record] {
        &self.records
    }
}
