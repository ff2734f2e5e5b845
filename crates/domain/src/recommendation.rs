use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::article::Article;

/// Which of the two search paths produced a recommendation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Indexed,
    Fallback,
}

/// One ranked recommendation, enriched with the metadata the caller needs
/// to render it. Built fresh per request, never persisted.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Recommendation {
    pub id: Uuid,
    pub title: String,
    pub author: String,
    pub cover_image: Option<String>,
    pub tags: Vec<String>,
    pub score: f32,
    pub strategy: Strategy,
}

impl Recommendation {
    pub fn from_article(article: &Article, score: f32, strategy: Strategy) -> Self {
        Self {
            id: article.id,
            title: article.title.clone(),
            author: article.author.clone(),
            cover_image: article.cover_image.clone(),
            tags: article.tags.clone(),
            score,
            strategy,
        }
    }
}
