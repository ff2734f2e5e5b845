use async_trait::async_trait;
use kindred_domain::embedding::Embedding;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Index query failed: {0}")]
    QueryError(String),
}

/// One hit from a nearest-neighbor query, before metadata enrichment.
#[derive(Clone, Debug, PartialEq)]
pub struct ScoredId {
    pub id: Uuid,
    pub score: f32,
}

/// An indexed nearest-neighbor backend. May be absent entirely (the service
/// runs fallback-only) and may fail at call time; either way the caller
/// degrades to the brute-force path rather than surfacing the failure.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Returns up to `limit` hits ordered by descending similarity.
    /// `num_candidates` bounds how much of the index an approximate backend
    /// examines; exact backends are free to ignore it.
    async fn search(
        &self,
        query: &Embedding,
        num_candidates: usize,
        limit: usize,
    ) -> Result<Vec<ScoredId>, IndexError>;
}
