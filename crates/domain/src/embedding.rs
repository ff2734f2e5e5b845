use serde::{Deserialize, Serialize};

/// A fixed-length semantic embedding vector produced by the ingestion
/// pipeline. Opaque to this service: it is only ever read and compared.
///
/// An absent embedding is modelled as `Option<Embedding>` on the owning
/// article, which is a different state from an all-zero vector.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Embedding(Vec<f32>);

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self(values)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<f32>> for Embedding {
    fn from(values: Vec<f32>) -> Self {
        Self(values)
    }
}
