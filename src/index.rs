//! # Flat inner-product index
//!
//! A brute-force similarity index over fixed-dimension `f32` vectors. Vectors
//! are stored contiguously in insertion order and ranked by dot product, so
//! with L2-normalized embeddings the score is cosine similarity.
//!
//! The index is deliberately minimal: append-only insertion, exact top-k
//! search, and reconstruction of any stored vector by position. Removal is the
//! caller's problem — [`crate::vector_store::VectorStore`] handles deletion by
//! reconstructing the survivors into a fresh index.
//!
//! Result ordering is deterministic: descending score, and on equal scores the
//! earlier-inserted vector wins.
//!
//! ```rust
//! use sitechat::index::FlatIndex;
//!
//! let mut index = FlatIndex::new(3);
//! index.push(&[1.0, 0.0, 0.0]);
//! index.push(&[0.0, 1.0, 0.0]);
//!
//! let hits = index.search(&[0.9, 0.1, 0.0], 1);
//! assert_eq!(hits[0].0, 0);
//! ```

use serde::{Deserialize, Serialize};

/// Exact inner-product index with positional storage.
///
/// Positions run from `0` to `len() - 1` in insertion order. The index knows
/// nothing about ids or metadata; callers keep their own position↔id mapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlatIndex {
    /// Dimensionality every stored vector must have.
    dimension: usize,
    /// Row-major storage: vector `p` occupies `vectors[p * dimension..(p + 1) * dimension]`.
    vectors: Vec<f32>,
}

impl FlatIndex {
    /// Create an empty index for vectors of the given dimension.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            vectors: Vec::new(),
        }
    }

    /// Rebuild an index from row-major vector data, e.g. a persisted snapshot.
    ///
    /// Returns `None` if `vectors` is not a whole number of rows.
    pub fn from_rows(dimension: usize, vectors: Vec<f32>) -> Option<Self> {
        if dimension == 0 || vectors.len() % dimension != 0 {
            return None;
        }
        Some(Self { dimension, vectors })
    }

    /// The dimension this index was constructed with.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of stored vectors.
    pub fn len(&self) -> usize {
        self.vectors.len() / self.dimension
    }

    /// `true` if no vectors are stored.
    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// The raw row-major vector data, for snapshotting.
    pub fn rows(&self) -> &[f32] {
        &self.vectors
    }

    /// Append a vector and return its position.
    ///
    /// Callers must pass a slice of exactly `dimension` elements; the store
    /// validates dimensions before any insertion reaches the index.
    pub fn push(&mut self, vector: &[f32]) -> usize {
        debug_assert_eq!(vector.len(), self.dimension);
        let position = self.len();
        self.vectors.extend_from_slice(vector);
        position
    }

    /// The vector stored at `position`, or `None` past the end.
    pub fn reconstruct(&self, position: usize) -> Option<&[f32]> {
        let start = position.checked_mul(self.dimension)?;
        self.vectors.get(start..start + self.dimension)
    }

    /// Exact top-k search by inner product.
    ///
    /// Scores every stored vector against `query` and returns up to `k`
    /// `(position, score)` pairs, best first. Ties break toward the lower
    /// position so identical inputs always rank identically.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<(usize, f32)> {
        debug_assert_eq!(query.len(), self.dimension);
        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .chunks_exact(self.dimension)
            .enumerate()
            .map(|(position, row)| (position, dot(query, row)))
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        scored.truncate(k);
        scored
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranks_by_descending_inner_product() {
        let mut index = FlatIndex::new(2);
        index.push(&[0.0, 1.0]);
        index.push(&[1.0, 0.0]);
        index.push(&[0.7, 0.7]);

        let hits = index.search(&[1.0, 0.0], 3);
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].0, 1);
        assert_eq!(hits[1].0, 2);
        assert_eq!(hits[2].0, 0);
        assert!(hits[0].1 >= hits[1].1 && hits[1].1 >= hits[2].1);
    }

    #[test]
    fn equal_scores_prefer_earlier_position() {
        let mut index = FlatIndex::new(2);
        index.push(&[1.0, 0.0]);
        index.push(&[1.0, 0.0]);

        let hits = index.search(&[1.0, 0.0], 2);
        assert_eq!(hits[0].0, 0);
        assert_eq!(hits[1].0, 1);
    }

    #[test]
    fn truncates_to_available_vectors() {
        let mut index = FlatIndex::new(2);
        index.push(&[1.0, 0.0]);

        assert_eq!(index.search(&[1.0, 0.0], 5).len(), 1);
        assert!(FlatIndex::new(2).search(&[1.0, 0.0], 5).is_empty());
    }

    #[test]
    fn reconstructs_stored_vectors() {
        let mut index = FlatIndex::new(3);
        index.push(&[1.0, 2.0, 3.0]);
        index.push(&[4.0, 5.0, 6.0]);

        assert_eq!(index.reconstruct(1), Some(&[4.0, 5.0, 6.0][..]));
        assert_eq!(index.reconstruct(2), None);
    }

    #[test]
    fn from_rows_rejects_ragged_data() {
        assert!(FlatIndex::from_rows(3, vec![1.0, 2.0, 3.0, 4.0]).is_none());
        assert!(FlatIndex::from_rows(0, Vec::new()).is_none());

        let index = FlatIndex::from_rows(2, vec![1.0, 0.0, 0.0, 1.0]).unwrap();
        assert_eq!(index.len(), 2);
    }
}
