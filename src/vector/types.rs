//! Type-safe wrappers and error types for vector operations.

use thiserror::Error;

/// Type-safe wrapper for vector dimensions.
///
/// Every vector of an index has exactly this many components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VectorDimension(usize);

impl VectorDimension {
    /// Creates a new `VectorDimension` with validation.
    ///
    /// Returns an error if the dimension is zero.
    pub fn new(dim: usize) -> Result<Self, VectorError> {
        if dim == 0 {
            return Err(VectorError::InvalidDimension {
                dimension: 0,
                reason: "Vector dimension cannot be zero",
            });
        }
        Ok(Self(dim))
    }

    /// Returns the underlying dimension value.
    #[must_use]
    pub const fn get(&self) -> usize {
        self.0
    }

    /// Validates that a vector has the expected dimension.
    pub fn validate_vector(&self, vector: &[f32]) -> Result<(), VectorError> {
        if vector.len() != self.0 {
            return Err(VectorError::DimensionMismatch {
                expected: self.0,
                actual: vector.len(),
            });
        }
        Ok(())
    }
}

impl std::fmt::Display for VectorDimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Errors that can occur during vector operations.
///
/// All error messages include actionable suggestions for resolution.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum VectorError {
    #[error(
        "Vector dimension mismatch: expected {expected}, got {actual}\nSuggestion: Ensure all vectors use the same embedding model"
    )]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Invalid vector dimension: {dimension}\nReason: {reason}")]
    InvalidDimension {
        dimension: usize,
        reason: &'static str,
    },

    #[error("Cannot build an index from zero vectors\nSuggestion: Check that the corpus has rows")]
    EmptyIndex,

    #[error("Invalid result count k={k}\nSuggestion: Request at least one result")]
    InvalidK { k: usize },

    #[error(
        "Non-finite value at vector {position}, component {component}\nSuggestion: The embedding provider produced NaN or infinity"
    )]
    NonFinite { position: usize, component: usize },

    #[error("Position {position} is out of range for {len} entries")]
    PositionOutOfRange { position: usize, len: usize },
}
