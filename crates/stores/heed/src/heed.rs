mod heed_ids;

use std::{
    collections::HashSet,
    path::Path,
    sync::Arc,
};

use heed::{
    types::{SerdeJson, Unit},
    Database, EnvOpenOptions,
};
use heed_ids::{HeedTimestampUuid, HeedUuid};
use kindred_domain::{
    article::{Article, CreateArticle},
    embedding::Embedding,
};
use kindred_store::{ArticleStore, StoreError};
use uuid::Uuid;

/// LMDB-backed article store. Embeddings live in their own database so that
/// the fallback corpus scan touches only (id, vector) pairs, and a
/// creation-time keyed database gives ordered listing and a stable scan
/// order. Carries no vector index of its own; deployments on this store
/// pair it with an external index or run fallback-only.
pub struct HeedStore {
    env: Arc<heed::Env>,
    articles_db: Database<HeedUuid, SerdeJson<Article>>,
    embeddings_db: Database<HeedUuid, SerdeJson<Embedding>>,
    creation_time_db: Database<HeedTimestampUuid, Unit>,
}

impl HeedStore {
    pub fn new(path: &Path, create_databases: bool) -> Result<Self, StoreError> {
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(10 * 1024 * 1024 * 1024) // 10 GB
                .max_dbs(3)
                .open(path)
                .map_err(|e| StoreError::OperationFailed(e.to_string()))?
        };
        let env = Arc::new(env);

        let mut wtxn = env
            .write_txn()
            .map_err(|e| StoreError::OperationFailed(e.to_string()))?;
        let articles_db = Self::open_database(&env, &mut wtxn, "articles", create_databases)?;
        let embeddings_db = Self::open_database(&env, &mut wtxn, "embeddings", create_databases)?;
        let creation_time_db =
            Self::open_database(&env, &mut wtxn, "creation_time", create_databases)?;
        wtxn.commit()
            .map_err(|e| StoreError::OperationFailed(e.to_string()))?;

        Ok(Self {
            env,
            articles_db,
            embeddings_db,
            creation_time_db,
        })
    }

    fn open_database<K: 'static, V: 'static>(
        env: &heed::Env,
        wtxn: &mut heed::RwTxn,
        name: &str,
        create: bool,
    ) -> Result<Database<K, V>, StoreError> {
        if create {
            env.create_database(wtxn, Some(name))
                .map_err(|e| StoreError::OperationFailed(e.to_string()))
        } else {
            env.open_database(wtxn, Some(name))
                .map_err(|e| StoreError::OperationFailed(e.to_string()))?
                .ok_or_else(|| StoreError::OperationFailed(format!("{name} database not found")))
        }
    }

    fn get_article_with_embedding(
        &self,
        rtxn: &heed::RoTxn,
        id: &Uuid,
    ) -> Result<Option<Article>, StoreError> {
        let mut article = self
            .articles_db
            .get(rtxn, &id.to_owned().into())
            .map_err(|e| StoreError::QueryError(e.to_string()))?;
        if let Some(ref mut article) = article {
            if let Some(embedding) = self
                .embeddings_db
                .get(rtxn, &id.to_owned().into())
                .map_err(|e| StoreError::QueryError(e.to_string()))?
            {
                article.embedding = Some(embedding);
            }
        }
        Ok(article)
    }

    /// Ids in creation order, oldest first. This is the scan order behind
    /// both listing and the fallback corpus scan.
    fn ordered_ids(&self, rtxn: &heed::RoTxn) -> Result<Vec<Uuid>, StoreError> {
        Ok(self
            .creation_time_db
            .iter(rtxn)
            .map_err(|e| StoreError::QueryError(e.to_string()))?
            .flatten()
            .map(|(HeedTimestampUuid((_, id)), _)| id)
            .collect())
    }
}

#[async_trait::async_trait]
impl ArticleStore for HeedStore {
    async fn create_article(&self, input: CreateArticle) -> Result<Article, StoreError> {
        let article = input.into_article();
        let mut wtxn = self
            .env
            .write_txn()
            .map_err(|e| StoreError::OperationFailed(e.to_string()))?;

        // The vector is stored apart from the metadata record.
        let embedding = article.embedding.clone();
        let mut record = article.clone();
        record.embedding = None;

        self.articles_db
            .put(&mut wtxn, &article.id().into(), &record)
            .map_err(|e| StoreError::OperationFailed(e.to_string()))?;
        if let Some(embedding) = embedding {
            self.embeddings_db
                .put(&mut wtxn, &article.id().into(), &embedding)
                .map_err(|e| StoreError::OperationFailed(e.to_string()))?;
        }
        let timestamp = article.created_at().timestamp_millis() as u64;
        self.creation_time_db
            .put(&mut wtxn, &(timestamp, article.id()).into(), &())
            .map_err(|e| StoreError::OperationFailed(e.to_string()))?;

        wtxn.commit()
            .map_err(|e| StoreError::OperationFailed(e.to_string()))?;
        Ok(article)
    }

    async fn get_article(&self, article_id: Uuid) -> Result<Article, StoreError> {
        let rtxn = self
            .env
            .read_txn()
            .map_err(|e| StoreError::QueryError(e.to_string()))?;
        self.get_article_with_embedding(&rtxn, &article_id)?
            .ok_or(StoreError::NotFound)
    }

    async fn get_articles_by_ids(&self, article_ids: &[Uuid]) -> Result<Vec<Article>, StoreError> {
        let rtxn = self
            .env
            .read_txn()
            .map_err(|e| StoreError::QueryError(e.to_string()))?;
        article_ids
            .iter()
            .filter_map(|id| self.get_article_with_embedding(&rtxn, id).transpose())
            .collect()
    }

    async fn list_articles(&self) -> Result<Vec<Article>, StoreError> {
        let rtxn = self
            .env
            .read_txn()
            .map_err(|e| StoreError::QueryError(e.to_string()))?;
        self.ordered_ids(&rtxn)?
            .iter()
            .filter_map(|id| self.get_article_with_embedding(&rtxn, id).transpose())
            .collect()
    }

    async fn list_embedded(
        &self,
        exclude: &HashSet<Uuid>,
        max: usize,
    ) -> Result<Vec<(Uuid, Embedding)>, StoreError> {
        let rtxn = self
            .env
            .read_txn()
            .map_err(|e| StoreError::QueryError(e.to_string()))?;

        let mut embedded = Vec::new();
        for id in self.ordered_ids(&rtxn)? {
            if embedded.len() >= max {
                break;
            }
            if exclude.contains(&id) {
                continue;
            }
            if let Some(embedding) = self
                .embeddings_db
                .get(&rtxn, &id.into())
                .map_err(|e| StoreError::QueryError(e.to_string()))?
            {
                if !embedding.is_empty() {
                    embedded.push((id, embedding));
                }
            }
        }
        Ok(embedded)
    }

    async fn update_article_embedding(
        &self,
        article_id: Uuid,
        embedding: Embedding,
    ) -> Result<(), StoreError> {
        let mut wtxn = self
            .env
            .write_txn()
            .map_err(|e| StoreError::OperationFailed(e.to_string()))?;

        if self
            .articles_db
            .get(&wtxn, &article_id.into())
            .map_err(|e| StoreError::QueryError(e.to_string()))?
            .is_none()
        {
            return Err(StoreError::NotFound);
        }

        self.embeddings_db
            .put(&mut wtxn, &article_id.into(), &embedding)
            .map_err(|e| StoreError::OperationFailed(e.to_string()))?;
        wtxn.commit()
            .map_err(|e| StoreError::OperationFailed(e.to_string()))?;
        Ok(())
    }

    async fn delete_article(&self, article_id: Uuid) -> Result<(), StoreError> {
        let mut wtxn = self
            .env
            .write_txn()
            .map_err(|e| StoreError::OperationFailed(e.to_string()))?;

        let Some(article) = self
            .articles_db
            .get(&wtxn, &article_id.into())
            .map_err(|e| StoreError::QueryError(e.to_string()))?
        else {
            return Err(StoreError::NotFound);
        };

        self.articles_db
            .delete(&mut wtxn, &article_id.into())
            .map_err(|e| StoreError::OperationFailed(e.to_string()))?;
        self.embeddings_db
            .delete(&mut wtxn, &article_id.into())
            .map_err(|e| StoreError::OperationFailed(e.to_string()))?;
        let timestamp = article.created_at().timestamp_millis() as u64;
        self.creation_time_db
            .delete(&mut wtxn, &(timestamp, article_id).into())
            .map_err(|e| StoreError::OperationFailed(e.to_string()))?;

        wtxn.commit()
            .map_err(|e| StoreError::OperationFailed(e.to_string()))?;
        Ok(())
    }
}
