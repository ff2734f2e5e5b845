use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use kindred_domain::{
    article::{Article, CreateArticle, UpdateEmbedding},
    recommendation::Recommendation,
};
use kindred_store::{ArticleStore, StoreError};
use serde::Deserialize;
use uuid::Uuid;

use crate::recommender::{RecommendError, Recommender};

const DEFAULT_LIMIT: usize = 5;

#[derive(Deserialize)]
pub struct RecommendationParams {
    limit: Option<usize>,
    /// Comma-separated article ids to omit from the results.
    exclude: Option<String>,
}

pub async fn create_article(
    State(store): State<Arc<dyn ArticleStore>>,
    Json(input): Json<CreateArticle>,
) -> Response {
    match store.create_article(input).await {
        Ok(article) => (StatusCode::CREATED, Json(article)).into_response(),
        Err(e) => {
            tracing::error!("failed to create article: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

pub async fn list_articles(
    State(store): State<Arc<dyn ArticleStore>>,
) -> Result<Json<Vec<Article>>, StatusCode> {
    match store.list_articles().await {
        Ok(articles) => Ok(Json(articles)),
        Err(e) => {
            tracing::error!("failed to list articles: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

pub async fn get_article(
    State(store): State<Arc<dyn ArticleStore>>,
    Path(article_id): Path<Uuid>,
) -> Result<Json<Article>, StatusCode> {
    match store.get_article(article_id).await {
        Ok(article) => Ok(Json(article)),
        Err(StoreError::NotFound) => Err(StatusCode::NOT_FOUND),
        Err(e) => {
            tracing::error!("failed to fetch article: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

pub async fn delete_article(
    State(store): State<Arc<dyn ArticleStore>>,
    Path(article_id): Path<Uuid>,
) -> StatusCode {
    match store.delete_article(article_id).await {
        Ok(()) => StatusCode::NO_CONTENT,
        Err(StoreError::NotFound) => StatusCode::NOT_FOUND,
        Err(e) => {
            tracing::error!("failed to delete article: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

pub async fn update_embedding(
    State(store): State<Arc<dyn ArticleStore>>,
    Path(article_id): Path<Uuid>,
    Json(input): Json<UpdateEmbedding>,
) -> StatusCode {
    match store.update_article_embedding(article_id, input.embedding).await {
        Ok(()) => StatusCode::NO_CONTENT,
        Err(StoreError::NotFound) => StatusCode::NOT_FOUND,
        Err(e) => {
            tracing::error!("failed to update embedding: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

pub async fn get_recommendations(
    State(recommender): State<Arc<Recommender>>,
    Path(article_id): Path<Uuid>,
    Query(params): Query<RecommendationParams>,
) -> Response {
    let exclude = match parse_exclude(params.exclude.as_deref()) {
        Ok(exclude) => exclude,
        Err(raw) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({ "error": format!("invalid exclude id: {raw}") })),
            )
                .into_response();
        }
    };
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT);

    match recommender.recommend(article_id, limit, &exclude).await {
        Ok(recommendations) => Json::<Vec<Recommendation>>(recommendations).into_response(),
        Err(e) => {
            let status = match &e {
                RecommendError::NotFound(_) => StatusCode::NOT_FOUND,
                RecommendError::NoEmbedding(_) => StatusCode::UNPROCESSABLE_ENTITY,
                RecommendError::InvalidLimit => StatusCode::BAD_REQUEST,
                RecommendError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                RecommendError::Similarity(_) => StatusCode::INTERNAL_SERVER_ERROR,
            };
            if status.is_server_error() {
                tracing::error!("recommendation request failed: {}", e);
            }
            (status, Json(serde_json::json!({ "error": e.to_string() }))).into_response()
        }
    }
}

fn parse_exclude(raw: Option<&str>) -> Result<Vec<Uuid>, String> {
    let Some(raw) = raw else {
        return Ok(Vec::new());
    };
    raw.split(',')
        .filter(|part| !part.is_empty())
        .map(|part| Uuid::parse_str(part.trim()).map_err(|_| part.to_owned()))
        .collect()
}
