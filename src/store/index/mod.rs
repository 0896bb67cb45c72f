#[cfg(test)]
mod tests;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fs;
use std::path::Path;

use crate::{KbError, Result};

/// Exact nearest-neighbor index over fixed-dimension embedding vectors.
///
/// Brute-force cosine similarity. Rows are addressed by insertion order,
/// so callers can keep side tables in lockstep with the vector ordering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlatIndex {
    dimension: usize,
    vectors: Vec<Vec<f32>>,
}

impl FlatIndex {
    /// An empty index of a known dimension.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            vectors: Vec::new(),
        }
    }

    /// Initialize from the first batch of a fresh build; the dimension is
    /// taken from the batch itself.
    pub fn from_batch(vectors: Vec<Vec<f32>>) -> Result<Self> {
        let Some(first) = vectors.first() else {
            return Err(KbError::CorruptStore(
                "cannot initialize an index from an empty batch".to_string(),
            ));
        };
        let mut index = Self::new(first.len());
        index.append(vectors)?;
        Ok(index)
    }

    /// Append a batch; every later batch of the same build or a later
    /// extension goes through here.
    pub fn append(&mut self, vectors: Vec<Vec<f32>>) -> Result<()> {
        for vector in &vectors {
            if vector.len() != self.dimension {
                return Err(KbError::DimensionMismatch {
                    expected: self.dimension,
                    actual: vector.len(),
                });
            }
        }
        self.vectors.extend(vectors);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// K nearest rows by cosine similarity, `(row, score)` sorted by score
    /// descending.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(usize, f32)>> {
        if query.len() != self.dimension {
            return Err(KbError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }

        let mut scores: Vec<(usize, f32)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(row, vector)| (row, cosine_similarity(query, vector)))
            .collect();

        scores.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        scores.truncate(k);

        Ok(scores)
    }

    /// Persist the index structure as the binary artifact at `path`.
    pub fn write_to(&self, path: &Path) -> Result<()> {
        let bytes = bincode::serialize(self).context("failed to serialize index")?;
        fs::write(path, bytes)?;
        Ok(())
    }

    /// Reload an index persisted with [`FlatIndex::write_to`].
    pub fn read_from(path: &Path) -> Result<Self> {
        let bytes = fs::read(path)?;
        let index = bincode::deserialize(&bytes)
            .with_context(|| format!("failed to deserialize index at {}", path.display()))?;
        Ok(index)
    }
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}
