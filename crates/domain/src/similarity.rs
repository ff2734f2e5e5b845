use thiserror::Error;

use crate::embedding::Embedding;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SimilarityError {
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Cosine similarity between two embeddings.
///
/// An empty vector on either side yields 0 — an article without a usable
/// embedding is simply not similar to anything, not an error. A length
/// mismatch is different: all embeddings come out of one ingestion pipeline
/// with a fixed dimensionality, so mismatched lengths mean a caller bug and
/// fail loudly. A zero-magnitude vector also yields 0 rather than dividing
/// by zero; NaN must never escape to callers.
pub fn cosine_similarity(a: &Embedding, b: &Embedding) -> Result<f32, SimilarityError> {
    if a.is_empty() || b.is_empty() {
        return Ok(0.0);
    }
    if a.len() != b.len() {
        return Err(SimilarityError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }

    let dot = dot_product(a.as_slice(), b.as_slice());
    let norm_a = l2_norm(a.as_slice());
    let norm_b = l2_norm(b.as_slice());

    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }

    Ok(dot / (norm_a * norm_b))
}

/// Reusable one-against-many comparator. Precomputes the reference norm
/// once so that scoring a whole corpus does not recompute it per candidate.
///
/// `compare` agrees with `cosine_similarity(reference, candidate)` call for
/// call: an empty reference makes every comparison 0, and a mismatched
/// candidate fails that single call without affecting any other.
pub struct Comparator {
    reference: Embedding,
    norm: f32,
}

impl Comparator {
    pub fn new(reference: Embedding) -> Self {
        let norm = l2_norm(reference.as_slice());
        Self { reference, norm }
    }

    pub fn compare(&self, candidate: &Embedding) -> Result<f32, SimilarityError> {
        if self.reference.is_empty() || candidate.is_empty() {
            return Ok(0.0);
        }
        if candidate.len() != self.reference.len() {
            return Err(SimilarityError::DimensionMismatch {
                expected: self.reference.len(),
                actual: candidate.len(),
            });
        }

        let candidate_norm = l2_norm(candidate.as_slice());
        if self.norm == 0.0 || candidate_norm == 0.0 {
            return Ok(0.0);
        }

        let dot = dot_product(self.reference.as_slice(), candidate.as_slice());
        Ok(dot / (self.norm * candidate_norm))
    }
}

fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}
