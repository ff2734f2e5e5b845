use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
    time::Duration,
};

use kindred_domain::{
    article::Article,
    embedding::Embedding,
    recommendation::{Recommendation, Strategy},
    similarity::{Comparator, SimilarityError},
};
use kindred_store::{ArticleStore, IndexError, ScoredId, StoreError, VectorIndex};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum RecommendError {
    #[error("article {0} not found")]
    NotFound(Uuid),
    #[error("article {0} has no embedding")]
    NoEmbedding(Uuid),
    #[error("limit must be positive")]
    InvalidLimit,
    #[error(transparent)]
    Similarity(#[from] SimilarityError),
    #[error("recommendations unavailable: {0}")]
    Unavailable(String),
}

#[derive(Clone, Debug)]
pub struct RecommenderConfig {
    /// How long to wait on the indexed backend before degrading to the
    /// fallback scan.
    pub index_timeout: Duration,
    /// Over-fetch multiplier for the indexed path, leaving room to drop
    /// excluded ids without a second round trip.
    pub overfetch: usize,
    /// Upper bound on how many stored vectors one fallback scan considers.
    /// The scan caps at this sample rather than failing on a large corpus.
    pub max_fallback_candidates: usize,
}

impl Default for RecommenderConfig {
    fn default() -> Self {
        Self {
            index_timeout: Duration::from_secs(2),
            overfetch: 3,
            max_fallback_candidates: 10_000,
        }
    }
}

/// Ranks articles by embedding similarity to a source article.
///
/// Two mutually exclusive paths serve each request: the configured vector
/// index when it answers in time with usable hits, otherwise a brute-force
/// cosine scan over the stored corpus. Index failures are recovered here
/// and only logged; the caller sees an error only when the fallback cannot
/// run either. Holds no state across calls beyond the shared handles, so
/// any number of requests may run concurrently.
pub struct Recommender {
    store: Arc<dyn ArticleStore>,
    index: Option<Arc<dyn VectorIndex>>,
    config: RecommenderConfig,
}

impl Recommender {
    pub fn new(
        store: Arc<dyn ArticleStore>,
        index: Option<Arc<dyn VectorIndex>>,
        config: RecommenderConfig,
    ) -> Self {
        Self {
            store,
            index,
            config,
        }
    }

    /// Top `limit` articles most similar to `article_id`, excluding the
    /// source itself and everything in `exclude`.
    pub async fn recommend(
        &self,
        article_id: Uuid,
        limit: usize,
        exclude: &[Uuid],
    ) -> Result<Vec<Recommendation>, RecommendError> {
        if limit == 0 {
            return Err(RecommendError::InvalidLimit);
        }

        let article = match self.store.get_article(article_id).await {
            Ok(article) => article,
            Err(StoreError::NotFound) => return Err(RecommendError::NotFound(article_id)),
            Err(e) => return Err(RecommendError::Unavailable(e.to_string())),
        };
        let Some(embedding) = article.embedding.filter(|e| !e.is_empty()) else {
            return Err(RecommendError::NoEmbedding(article_id));
        };

        // The source article is always excluded: it is maximally similar
        // to itself and never a useful recommendation.
        let mut excluded: HashSet<Uuid> = exclude.iter().copied().collect();
        excluded.insert(article_id);

        if let Some(index) = &self.index {
            match self.indexed_path(index, &embedding, limit, &excluded).await {
                Ok(hits) if !hits.is_empty() => {
                    tracing::debug!(%article_id, results = hits.len(), "served via indexed search");
                    return self.enrich(hits, Strategy::Indexed).await;
                }
                Ok(_) => {
                    tracing::debug!(%article_id, "indexed search returned nothing, falling back");
                }
                Err(e) => {
                    tracing::warn!(%article_id, error = %e, "indexed search failed, falling back");
                }
            }
        } else {
            tracing::debug!(%article_id, "no vector index configured, using fallback");
        }

        let hits = self.fallback_path(&embedding, limit, &excluded).await?;
        tracing::debug!(%article_id, results = hits.len(), "served via fallback scan");
        self.enrich(hits, Strategy::Fallback).await
    }

    async fn indexed_path(
        &self,
        index: &Arc<dyn VectorIndex>,
        query: &Embedding,
        limit: usize,
        excluded: &HashSet<Uuid>,
    ) -> Result<Vec<ScoredId>, IndexError> {
        // Saturating: callers may legitimately ask for an enormous limit,
        // which must not wrap the over-fetch arithmetic.
        let fetch = limit.saturating_mul(self.config.overfetch);
        let num_candidates = fetch.saturating_mul(10);

        let hits = tokio::time::timeout(
            self.config.index_timeout,
            index.search(query, num_candidates, fetch),
        )
        .await
        .map_err(|_| {
            IndexError::QueryError(format!(
                "timed out after {:?}",
                self.config.index_timeout
            ))
        })??;

        let mut hits: Vec<ScoredId> = hits
            .into_iter()
            .filter(|hit| !excluded.contains(&hit.id))
            .collect();
        hits.truncate(limit);
        Ok(hits)
    }

    async fn fallback_path(
        &self,
        query: &Embedding,
        limit: usize,
        excluded: &HashSet<Uuid>,
    ) -> Result<Vec<ScoredId>, RecommendError> {
        // A scan that fails is a total failure, never a silently partial
        // result claiming completeness.
        let corpus = self
            .store
            .list_embedded(excluded, self.config.max_fallback_candidates)
            .await
            .map_err(|e| {
                RecommendError::Unavailable(format!("fallback corpus scan failed: {e}"))
            })?;

        let comparator = Comparator::new(query.clone());
        let mut scored = Vec::with_capacity(corpus.len());
        for (id, embedding) in &corpus {
            // A mismatched corpus vector is an ingestion bug, not a
            // condition to recover from.
            let score = comparator.compare(embedding)?;
            scored.push(ScoredId { id: *id, score });
        }

        // Stable sort: ties keep the store's scan order.
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(limit);
        Ok(scored)
    }

    async fn enrich(
        &self,
        hits: Vec<ScoredId>,
        strategy: Strategy,
    ) -> Result<Vec<Recommendation>, RecommendError> {
        if hits.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = hits.iter().map(|hit| hit.id).collect();
        let articles = self
            .store
            .get_articles_by_ids(&ids)
            .await
            .map_err(|e| RecommendError::Unavailable(format!("metadata fetch failed: {e}")))?;
        let by_id: HashMap<Uuid, Article> =
            articles.into_iter().map(|a| (a.id(), a)).collect();

        // Articles deleted between ranking and the join are dropped.
        Ok(hits
            .iter()
            .filter_map(|hit| {
                by_id
                    .get(&hit.id)
                    .map(|article| Recommendation::from_article(article, hit.score, strategy))
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;
    use kindred_domain::{article::CreateArticle, similarity::cosine_similarity};
    use kindred_in_memory_store::InMemoryStore;

    struct FailingIndex;

    #[async_trait]
    impl VectorIndex for FailingIndex {
        async fn search(
            &self,
            _query: &Embedding,
            _num_candidates: usize,
            _limit: usize,
        ) -> Result<Vec<ScoredId>, IndexError> {
            Err(IndexError::QueryError("connection refused".to_owned()))
        }
    }

    struct EmptyIndex;

    #[async_trait]
    impl VectorIndex for EmptyIndex {
        async fn search(
            &self,
            _query: &Embedding,
            _num_candidates: usize,
            _limit: usize,
        ) -> Result<Vec<ScoredId>, IndexError> {
            Ok(Vec::new())
        }
    }

    struct SlowIndex;

    #[async_trait]
    impl VectorIndex for SlowIndex {
        async fn search(
            &self,
            _query: &Embedding,
            _num_candidates: usize,
            _limit: usize,
        ) -> Result<Vec<ScoredId>, IndexError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(Vec::new())
        }
    }

    struct BrokenStore;

    #[async_trait]
    impl ArticleStore for BrokenStore {
        async fn create_article(&self, _input: CreateArticle) -> Result<Article, StoreError> {
            Err(StoreError::QueryError("disk on fire".to_owned()))
        }

        async fn get_article(&self, article_id: Uuid) -> Result<Article, StoreError> {
            let mut article = CreateArticle {
                title: "stranded".to_owned(),
                author: "nobody".to_owned(),
                cover_image: None,
                tags: Vec::new(),
                embedding: Some(Embedding::from(vec![1.0, 0.0])),
            }
            .into_article();
            article.id = article_id;
            Ok(article)
        }

        async fn get_articles_by_ids(
            &self,
            _article_ids: &[Uuid],
        ) -> Result<Vec<Article>, StoreError> {
            Err(StoreError::QueryError("disk on fire".to_owned()))
        }

        async fn list_articles(&self) -> Result<Vec<Article>, StoreError> {
            Err(StoreError::QueryError("disk on fire".to_owned()))
        }

        async fn list_embedded(
            &self,
            _exclude: &HashSet<Uuid>,
            _max: usize,
        ) -> Result<Vec<(Uuid, Embedding)>, StoreError> {
            Err(StoreError::QueryError("disk on fire".to_owned()))
        }

        async fn update_article_embedding(
            &self,
            _article_id: Uuid,
            _embedding: Embedding,
        ) -> Result<(), StoreError> {
            Err(StoreError::QueryError("disk on fire".to_owned()))
        }

        async fn delete_article(&self, _article_id: Uuid) -> Result<(), StoreError> {
            Err(StoreError::QueryError("disk on fire".to_owned()))
        }
    }

    async fn seed(store: &InMemoryStore, title: &str, embedding: Option<Vec<f32>>) -> Article {
        store
            .create_article(CreateArticle {
                title: title.to_owned(),
                author: "tester".to_owned(),
                cover_image: None,
                tags: Vec::new(),
                embedding: embedding.map(Embedding::from),
            })
            .await
            .unwrap()
    }

    fn fallback_only(store: Arc<InMemoryStore>) -> Recommender {
        Recommender::new(store, None, RecommenderConfig::default())
    }

    #[tokio::test]
    async fn invalid_limit_is_rejected() {
        let store = Arc::new(InMemoryStore::new());
        let article = seed(&store, "a", Some(vec![1.0, 0.0])).await;

        let result = fallback_only(store).recommend(article.id(), 0, &[]).await;
        assert!(matches!(result, Err(RecommendError::InvalidLimit)));
    }

    #[tokio::test]
    async fn missing_article_is_not_found() {
        let store = Arc::new(InMemoryStore::new());
        let result = fallback_only(store).recommend(Uuid::new_v4(), 5, &[]).await;
        assert!(matches!(result, Err(RecommendError::NotFound(_))));
    }

    #[tokio::test]
    async fn article_without_embedding_is_reported_distinctly() {
        let store = Arc::new(InMemoryStore::new());
        let article = seed(&store, "unembedded", None).await;

        let result = fallback_only(store).recommend(article.id(), 5, &[]).await;
        assert!(matches!(result, Err(RecommendError::NoEmbedding(_))));
    }

    #[tokio::test]
    async fn exact_match_ranks_first() {
        // Corpus = {A: [1,0], B: [1,0], C: [0,1]}, source = A.
        let store = Arc::new(InMemoryStore::new());
        let a = seed(&store, "a", Some(vec![1.0, 0.0])).await;
        let b = seed(&store, "b", Some(vec![1.0, 0.0])).await;
        seed(&store, "c", Some(vec![0.0, 1.0])).await;

        let results = fallback_only(store)
            .recommend(a.id(), 1, &[a.id()])
            .await
            .unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, b.id());
        assert!((results[0].score - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn source_and_explicit_exclusions_never_appear() {
        let store = Arc::new(InMemoryStore::new());
        let a = seed(&store, "a", Some(vec![1.0, 0.0])).await;
        let b = seed(&store, "b", Some(vec![1.0, 0.1])).await;
        let c = seed(&store, "c", Some(vec![1.0, 0.2])).await;

        // Indexed path, via the store's own exact index.
        let indexed = Recommender::new(
            store.clone(),
            Some(store.clone()),
            RecommenderConfig::default(),
        );
        let results = indexed.recommend(a.id(), 10, &[b.id()]).await.unwrap();
        assert!(results.iter().all(|r| r.id != a.id() && r.id != b.id()));
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, c.id());

        // Fallback path, same exclusions.
        let results = fallback_only(store)
            .recommend(a.id(), 10, &[b.id()])
            .await
            .unwrap();
        assert!(results.iter().all(|r| r.id != a.id() && r.id != b.id()));
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, c.id());
    }

    #[tokio::test]
    async fn indexed_path_tags_results_indexed() {
        let store = Arc::new(InMemoryStore::new());
        let a = seed(&store, "a", Some(vec![1.0, 0.0])).await;
        seed(&store, "b", Some(vec![0.9, 0.1])).await;
        seed(&store, "c", Some(vec![0.0, 1.0])).await;

        let recommender = Recommender::new(
            store.clone(),
            Some(store.clone()),
            RecommenderConfig::default(),
        );
        let results = recommender.recommend(a.id(), 2, &[]).await.unwrap();

        assert!(!results.is_empty());
        assert!(results.iter().all(|r| r.strategy == Strategy::Indexed));
    }

    #[tokio::test]
    async fn index_failure_degrades_to_fallback() {
        let store = Arc::new(InMemoryStore::new());
        let a = seed(&store, "a", Some(vec![1.0, 0.0])).await;
        let b = seed(&store, "b", Some(vec![0.8, 0.2])).await;

        let recommender = Recommender::new(
            store,
            Some(Arc::new(FailingIndex)),
            RecommenderConfig::default(),
        );
        let results = recommender.recommend(a.id(), 5, &[]).await.unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, b.id());
        assert!(results.iter().all(|r| r.strategy == Strategy::Fallback));
    }

    #[tokio::test]
    async fn empty_index_response_degrades_to_fallback() {
        let store = Arc::new(InMemoryStore::new());
        let a = seed(&store, "a", Some(vec![1.0, 0.0])).await;
        seed(&store, "b", Some(vec![0.8, 0.2])).await;

        let recommender = Recommender::new(
            store,
            Some(Arc::new(EmptyIndex)),
            RecommenderConfig::default(),
        );
        let results = recommender.recommend(a.id(), 5, &[]).await.unwrap();

        assert_eq!(results.len(), 1);
        assert!(results.iter().all(|r| r.strategy == Strategy::Fallback));
    }

    #[tokio::test]
    async fn index_timeout_degrades_to_fallback() {
        let store = Arc::new(InMemoryStore::new());
        let a = seed(&store, "a", Some(vec![1.0, 0.0])).await;
        seed(&store, "b", Some(vec![0.5, 0.5])).await;

        let recommender = Recommender::new(
            store,
            Some(Arc::new(SlowIndex)),
            RecommenderConfig {
                index_timeout: Duration::from_millis(50),
                ..RecommenderConfig::default()
            },
        );
        let results = recommender.recommend(a.id(), 5, &[]).await.unwrap();

        assert_eq!(results.len(), 1);
        assert!(results.iter().all(|r| r.strategy == Strategy::Fallback));
    }

    #[tokio::test]
    async fn empty_corpus_is_a_successful_empty_result() {
        let store = Arc::new(InMemoryStore::new());
        let a = seed(&store, "alone", Some(vec![1.0, 0.0])).await;

        let results = fallback_only(store).recommend(a.id(), 5, &[]).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn fallback_ranking_is_monotonically_non_increasing() {
        let store = Arc::new(InMemoryStore::new());
        let source = seed(&store, "source", Some(vec![1.0, 0.0, 0.0])).await;
        for i in 0..8 {
            let angle = i as f32 * 0.3;
            seed(
                &store,
                &format!("a{i}"),
                Some(vec![angle.cos(), angle.sin(), 0.1 * i as f32]),
            )
            .await;
        }

        let results = fallback_only(store)
            .recommend(source.id(), 8, &[])
            .await
            .unwrap();
        for pair in results.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[tokio::test]
    async fn enormous_limit_does_not_overflow_overfetch() {
        let store = Arc::new(InMemoryStore::new());
        let a = seed(&store, "a", Some(vec![1.0, 0.0])).await;
        let b = seed(&store, "b", Some(vec![0.9, 0.1])).await;

        let recommender = Recommender::new(
            store.clone(),
            Some(store.clone()),
            RecommenderConfig::default(),
        );
        let results = recommender.recommend(a.id(), usize::MAX, &[]).await.unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, b.id());
    }

    #[tokio::test]
    async fn fallback_ties_keep_store_scan_order() {
        let store = Arc::new(InMemoryStore::new());
        let source = seed(&store, "source", Some(vec![1.0, 0.0])).await;
        let twin = seed(&store, "twin", Some(vec![1.0, 0.0])).await;
        // Identical vectors score identically; the stable sort must keep
        // them in the store's scan order.
        let tied_a = seed(&store, "tied a", Some(vec![0.6, 0.8])).await;
        let tied_b = seed(&store, "tied b", Some(vec![0.6, 0.8])).await;
        let tied_c = seed(&store, "tied c", Some(vec![0.6, 0.8])).await;

        let results = fallback_only(store)
            .recommend(source.id(), 4, &[])
            .await
            .unwrap();

        let ids: Vec<Uuid> = results.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![twin.id(), tied_a.id(), tied_b.id(), tied_c.id()]);
        assert_eq!(results[1].score, results[2].score);
        assert_eq!(results[2].score, results[3].score);
    }

    #[tokio::test]
    async fn fallback_matches_brute_force_reference() {
        let store = Arc::new(InMemoryStore::new());
        let source_vec = vec![0.3, -0.2, 0.9];
        let source = seed(&store, "source", Some(source_vec.clone())).await;

        let corpus: Vec<Vec<f32>> = vec![
            vec![0.3, -0.2, 0.9],
            vec![-1.0, 0.4, 0.0],
            vec![0.0, 0.0, 1.0],
            vec![0.5, 0.5, 0.5],
            vec![0.31, -0.19, 0.88],
        ];
        let mut seeded = Vec::new();
        for (i, v) in corpus.iter().enumerate() {
            seeded.push(seed(&store, &format!("c{i}"), Some(v.clone())).await);
        }

        // Reference ranking computed directly.
        let source_embedding = Embedding::from(source_vec);
        let mut reference: Vec<(Uuid, f32)> = seeded
            .iter()
            .zip(corpus.iter())
            .map(|(article, v)| {
                (
                    article.id(),
                    cosine_similarity(&source_embedding, &Embedding::from(v.clone())).unwrap(),
                )
            })
            .collect();
        reference.sort_by(|a, b| b.1.total_cmp(&a.1));
        let expected: Vec<Uuid> = reference.iter().take(3).map(|(id, _)| *id).collect();

        let recommender = Recommender::new(
            store,
            Some(Arc::new(FailingIndex)),
            RecommenderConfig::default(),
        );
        let results = recommender.recommend(source.id(), 3, &[]).await.unwrap();
        let got: Vec<Uuid> = results.iter().map(|r| r.id).collect();
        assert_eq!(got, expected);
    }

    #[tokio::test]
    async fn fallback_scan_honors_corpus_cap() {
        let store = Arc::new(InMemoryStore::new());
        let source = seed(&store, "source", Some(vec![1.0, 0.0])).await;
        for i in 0..10 {
            seed(&store, &format!("a{i}"), Some(vec![1.0, i as f32 * 0.01])).await;
        }

        let recommender = Recommender::new(
            store,
            None,
            RecommenderConfig {
                max_fallback_candidates: 4,
                ..RecommenderConfig::default()
            },
        );
        let results = recommender.recommend(source.id(), 10, &[]).await.unwrap();
        assert_eq!(results.len(), 4);
    }

    #[tokio::test]
    async fn both_paths_failing_is_unavailable() {
        let recommender = Recommender::new(
            Arc::new(BrokenStore),
            Some(Arc::new(FailingIndex)),
            RecommenderConfig::default(),
        );
        let result = recommender.recommend(Uuid::new_v4(), 5, &[]).await;
        assert!(matches!(result, Err(RecommendError::Unavailable(_))));
    }
}
