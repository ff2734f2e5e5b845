mod api;
mod api_state;
pub mod recommender;

pub use recommender::{RecommendError, Recommender, RecommenderConfig};

use std::{net::SocketAddr, sync::Arc};

use anyhow::Result;
use kindred_store::{ArticleStore, VectorIndex};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::api_state::ApiState;

pub struct Kindred {
    store: Arc<dyn ArticleStore>,
    index: Option<Arc<dyn VectorIndex>>,
    config: RecommenderConfig,
}

pub struct KindredBuilder {
    store: Option<Arc<dyn ArticleStore>>,
    index: Option<Arc<dyn VectorIndex>>,
    config: RecommenderConfig,
}

impl Kindred {
    pub fn builder() -> KindredBuilder {
        KindredBuilder {
            store: None,
            index: None,
            config: RecommenderConfig::default(),
        }
    }

    pub fn router(self) -> axum::Router {
        let recommender = Recommender::new(self.store.clone(), self.index, self.config);
        api::routes::router(ApiState {
            store: self.store,
            recommender: Arc::new(recommender),
        })
    }

    pub async fn listen(self, addr: SocketAddr) -> Result<()> {
        let listener = TcpListener::bind(addr).await?;
        tracing::debug!("listening on {}", listener.local_addr()?);
        axum::serve(listener, self.router().layer(TraceLayer::new_for_http())).await?;

        Ok(())
    }
}

impl KindredBuilder {
    pub fn with_store(mut self, store: Arc<dyn ArticleStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_index(mut self, index: Arc<dyn VectorIndex>) -> Self {
        self.index = Some(index);
        self
    }

    pub fn with_config(mut self, config: RecommenderConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Kindred {
        Kindred {
            store: self.store.expect("store is required"),
            index: self.index,
            config: self.config,
        }
    }
}
