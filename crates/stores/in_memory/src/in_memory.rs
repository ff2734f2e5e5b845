use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use kindred_domain::{
    article::{Article, CreateArticle},
    embedding::Embedding,
    similarity::Comparator,
};
use kindred_store::{ArticleStore, IndexError, ScoredId, StoreError, VectorIndex};
use tokio::sync::Mutex;
use uuid::Uuid;

/// Map-backed store for development and tests. Also serves as an exact
/// vector index over its own contents, so an in-memory deployment exercises
/// the indexed search path without any external backend.
#[derive(Clone)]
pub struct InMemoryStore {
    articles: Arc<Mutex<HashMap<Uuid, Article>>>,
    insertion_order: Arc<Mutex<Vec<Uuid>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            articles: Arc::new(Mutex::new(HashMap::new())),
            insertion_order: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl ArticleStore for InMemoryStore {
    async fn create_article(&self, input: CreateArticle) -> Result<Article, StoreError> {
        let article = input.into_article();
        let mut articles = self.articles.lock().await;
        articles.insert(article.id(), article.clone());
        self.insertion_order.lock().await.push(article.id());
        Ok(article)
    }

    async fn get_article(&self, article_id: Uuid) -> Result<Article, StoreError> {
        let articles = self.articles.lock().await;
        articles.get(&article_id).cloned().ok_or(StoreError::NotFound)
    }

    async fn get_articles_by_ids(&self, article_ids: &[Uuid]) -> Result<Vec<Article>, StoreError> {
        let articles = self.articles.lock().await;
        Ok(article_ids
            .iter()
            .filter_map(|id| articles.get(id).cloned())
            .collect())
    }

    async fn list_articles(&self) -> Result<Vec<Article>, StoreError> {
        let articles = self.articles.lock().await;
        let order = self.insertion_order.lock().await;
        Ok(order
            .iter()
            .filter_map(|id| articles.get(id).cloned())
            .collect())
    }

    async fn list_embedded(
        &self,
        exclude: &HashSet<Uuid>,
        max: usize,
    ) -> Result<Vec<(Uuid, Embedding)>, StoreError> {
        let articles = self.articles.lock().await;
        let order = self.insertion_order.lock().await;
        Ok(order
            .iter()
            .filter(|id| !exclude.contains(id))
            .filter_map(|id| {
                let article = articles.get(id)?;
                article
                    .embedding
                    .as_ref()
                    .filter(|e| !e.is_empty())
                    .map(|e| (*id, e.clone()))
            })
            .take(max)
            .collect())
    }

    async fn update_article_embedding(
        &self,
        article_id: Uuid,
        embedding: Embedding,
    ) -> Result<(), StoreError> {
        let mut articles = self.articles.lock().await;
        if let Some(article) = articles.get_mut(&article_id) {
            article.set_embedding(embedding);
            Ok(())
        } else {
            Err(StoreError::NotFound)
        }
    }

    async fn delete_article(&self, article_id: Uuid) -> Result<(), StoreError> {
        let mut articles = self.articles.lock().await;
        if articles.remove(&article_id).is_none() {
            return Err(StoreError::NotFound);
        }
        self.insertion_order.lock().await.retain(|id| *id != article_id);
        Ok(())
    }
}

#[async_trait::async_trait]
impl VectorIndex for InMemoryStore {
    async fn search(
        &self,
        query: &Embedding,
        _num_candidates: usize,
        limit: usize,
    ) -> Result<Vec<ScoredId>, IndexError> {
        // Exact scan: num_candidates only matters to approximate backends.
        let articles = self.articles.lock().await;
        let order = self.insertion_order.lock().await;

        let comparator = Comparator::new(query.clone());
        let mut hits = Vec::new();
        for id in order.iter() {
            let Some(article) = articles.get(id) else {
                continue;
            };
            let Some(embedding) = article.embedding.as_ref().filter(|e| !e.is_empty()) else {
                continue;
            };
            let score = comparator
                .compare(embedding)
                .map_err(|e| IndexError::QueryError(e.to_string()))?;
            hits.push(ScoredId { id: *id, score });
        }

        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(limit);
        Ok(hits)
    }
}
