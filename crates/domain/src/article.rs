use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::embedding::Embedding;

/// An article's metadata as the recommendation service sees it. The body
/// itself lives in object storage and never passes through this service.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Article {
    pub id: Uuid,
    pub title: String,
    pub author: String,
    pub cover_image: Option<String>,
    pub tags: Vec<String>,
    pub embedding: Option<Embedding>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

impl Article {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn set_embedding(&mut self, embedding: Embedding) {
        self.embedding = Some(embedding);
    }

    /// True when the article carries a usable embedding. An empty vector
    /// counts as absent: nothing meaningful can be compared against it.
    pub fn has_embedding(&self) -> bool {
        self.embedding.as_ref().is_some_and(|e| !e.is_empty())
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateArticle {
    pub title: String,
    pub author: String,
    #[serde(default)]
    pub cover_image: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub embedding: Option<Embedding>,
}

impl CreateArticle {
    pub fn into_article(self) -> Article {
        Article {
            id: Uuid::new_v4(),
            title: self.title,
            author: self.author,
            cover_image: self.cover_image,
            tags: self.tags,
            embedding: self.embedding,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateEmbedding {
    pub embedding: Embedding,
}
