use std::sync::Arc;

use axum::extract::FromRef;
use kindred_store::ArticleStore;

use crate::recommender::Recommender;

#[derive(Clone)]
pub struct ApiState {
    pub store: Arc<dyn ArticleStore>,
    pub recommender: Arc<Recommender>,
}

impl FromRef<ApiState> for Arc<dyn ArticleStore> {
    fn from_ref(state: &ApiState) -> Arc<dyn ArticleStore> {
        state.store.clone()
    }
}

impl FromRef<ApiState> for Arc<Recommender> {
    fn from_ref(state: &ApiState) -> Arc<Recommender> {
        state.recommender.clone()
    }
}
