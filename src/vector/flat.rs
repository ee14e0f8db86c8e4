//! Exact nearest-neighbor index over a flat, row-major vector array.
//!
//! Every query scans all `N` vectors and ranks them by squared Euclidean
//! distance, so results never lose recall. Ordering is fully deterministic:
//! ascending distance, ties broken by ascending position.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::types::Position;
use crate::vector::types::{VectorDimension, VectorError};

/// A single query hit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub position: Position,
    /// Squared L2 distance to the query vector.
    pub distance: f32,
}

impl Eq for Neighbor {}

impl Ord for Neighbor {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then_with(|| self.position.cmp(&other.position))
    }
}

impl PartialOrd for Neighbor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Squared Euclidean distance between two equally sized slices.
#[inline]
pub fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

/// Append-only during construction, immutable afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatIndex {
    dimension: VectorDimension,
    /// `len * dimension` floats, row-major.
    data: Vec<f32>,
}

impl FlatIndex {
    /// Builds an index; the first vector fixes the dimension.
    ///
    /// Fails on an empty input, on any vector whose length differs from the
    /// first one, and on NaN or infinite components.
    pub fn build<V: AsRef<[f32]>>(vectors: &[V]) -> Result<Self, VectorError> {
        let first = vectors.first().ok_or(VectorError::EmptyIndex)?;
        let dimension = VectorDimension::new(first.as_ref().len())?;

        let mut data = Vec::with_capacity(vectors.len() * dimension.get());
        for (position, vector) in vectors.iter().enumerate() {
            let vector = vector.as_ref();
            dimension.validate_vector(vector)?;
            check_finite(position, vector)?;
            data.extend_from_slice(vector);
        }

        Ok(Self { dimension, data })
    }

    /// Rebuilds an index from a row-major buffer, as read back from disk.
    pub fn from_raw(dimension: VectorDimension, data: Vec<f32>) -> Result<Self, VectorError> {
        if data.is_empty() {
            return Err(VectorError::EmptyIndex);
        }
        let dim = dimension.get();
        if data.len() % dim != 0 {
            return Err(VectorError::DimensionMismatch {
                expected: dim,
                actual: data.len() % dim,
            });
        }
        for (position, row) in data.chunks_exact(dim).enumerate() {
            check_finite(position, row)?;
        }
        Ok(Self { dimension, data })
    }

    /// Returns the `k` closest vectors, ascending by distance.
    ///
    /// `k` larger than the index returns every entry.
    pub fn query(&self, vector: &[f32], k: usize) -> Result<Vec<Neighbor>, VectorError> {
        if k == 0 {
            return Err(VectorError::InvalidK { k });
        }
        self.dimension.validate_vector(vector)?;
        check_finite(0, vector)?;

        let k = k.min(self.len());
        // Max-heap of the best k so far; the worst kept candidate sits on top.
        let mut best: BinaryHeap<Neighbor> = BinaryHeap::with_capacity(k + 1);
        for (i, row) in self.rows().enumerate() {
            let candidate = Neighbor {
                position: Position(i),
                distance: squared_l2(vector, row),
            };
            if best.len() < k {
                best.push(candidate);
            } else if best.peek().is_some_and(|worst| candidate < *worst) {
                best.pop();
                best.push(candidate);
            }
        }

        Ok(best.into_sorted_vec())
    }

    /// Number of stored vectors.
    pub fn len(&self) -> usize {
        self.data.len() / self.dimension.get()
    }

    /// Always false for a built index; present for API symmetry.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn dimension(&self) -> VectorDimension {
        self.dimension
    }

    /// Vector stored at `position`.
    pub fn vector(&self, position: Position) -> Result<&[f32], VectorError> {
        let dim = self.dimension.get();
        let start = position.get() * dim;
        self.data
            .get(start..start + dim)
            .ok_or(VectorError::PositionOutOfRange {
                position: position.get(),
                len: self.len(),
            })
    }

    /// Iterates vectors in position order.
    pub fn rows(&self) -> impl ExactSizeIterator<Item = &[f32]> {
        self.data.chunks_exact(self.dimension.get())
    }

    /// The row-major backing buffer.
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }
}

fn check_finite(position: usize, vector: &[f32]) -> Result<(), VectorError> {
    match vector.iter().position(|v| !v.is_finite()) {
        Some(component) => Err(VectorError::NonFinite {
            position,
            component,
        }),
        None => Ok(()),
    }
}
