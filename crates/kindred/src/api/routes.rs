use axum::{
    routing::{delete, get, post, put},
    Router,
};

use crate::{api::handlers, api_state::ApiState};

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/articles", post(handlers::create_article))
        .route("/articles", get(handlers::list_articles))
        .route("/articles/:id", get(handlers::get_article))
        .route("/articles/:id", delete(handlers::delete_article))
        .route("/articles/:id/embedding", put(handlers::update_embedding))
        .route(
            "/articles/:id/recommendations",
            get(handlers::get_recommendations),
        )
        .with_state(state)
}
