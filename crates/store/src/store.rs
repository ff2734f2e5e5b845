pub mod error;
pub mod index;

pub use async_trait::async_trait;
pub use error::StoreError;
pub use index::{IndexError, ScoredId, VectorIndex};

use std::collections::HashSet;

use kindred_domain::{
    article::{Article, CreateArticle},
    embedding::Embedding,
};
use uuid::Uuid;

/// The content store as the recommendation service sees it: article CRUD,
/// embedding updates pushed by the ingestion pipeline, and the bounded
/// corpus scan the fallback search path runs over.
#[async_trait]
pub trait ArticleStore: Send + Sync {
    async fn create_article(&self, input: CreateArticle) -> Result<Article, StoreError>;

    async fn get_article(&self, article_id: Uuid) -> Result<Article, StoreError>;

    /// Batch metadata fetch used to enrich a ranked id list. Ids that no
    /// longer resolve are skipped, not errors.
    async fn get_articles_by_ids(&self, article_ids: &[Uuid]) -> Result<Vec<Article>, StoreError>;

    async fn list_articles(&self) -> Result<Vec<Article>, StoreError>;

    /// All candidates carrying a non-empty embedding, minus `exclude`,
    /// capped at `max` entries in the store's scan order.
    async fn list_embedded(
        &self,
        exclude: &HashSet<Uuid>,
        max: usize,
    ) -> Result<Vec<(Uuid, Embedding)>, StoreError>;

    async fn update_article_embedding(
        &self,
        article_id: Uuid,
        embedding: Embedding,
    ) -> Result<(), StoreError>;

    async fn delete_article(&self, article_id: Uuid) -> Result<(), StoreError>;
}
