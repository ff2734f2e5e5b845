use std::{net::SocketAddr, path::PathBuf, sync::Arc, time::Duration};

use anyhow::Result;
use clap::{Parser, Subcommand};
use kindred::{Kindred, RecommenderConfig};
use kindred_heed_store::HeedStore;
use kindred_in_memory_store::InMemoryStore;
use kindred_store::VectorIndex;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
struct Cli {
    #[clap(long, default_value = "0.0.0.0")]
    host: String,
    #[clap(long, default_value = "3000")]
    port: u16,
    /// How long to wait on the indexed backend before degrading to the
    /// fallback scan.
    #[clap(long, default_value = "2000")]
    index_timeout_ms: u64,
    /// Cap on how many stored vectors one fallback scan considers.
    #[clap(long, default_value = "10000")]
    max_fallback_candidates: usize,
    #[clap(subcommand)]
    store: Store,
}

#[derive(Default, Subcommand)]
enum Store {
    Heed {
        #[clap(long)]
        path: PathBuf,
    },
    #[default]
    InMemory,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "{}=debug,kindred=debug,tower_http=debug",
                    env!("CARGO_CRATE_NAME")
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = RecommenderConfig {
        index_timeout: Duration::from_millis(cli.index_timeout_ms),
        max_fallback_candidates: cli.max_fallback_candidates,
        ..RecommenderConfig::default()
    };

    let mut builder = Kindred::builder().with_config(config);
    builder = match cli.store {
        Store::Heed { path } => {
            // No vector index rides along with LMDB; every request takes
            // the fallback scan.
            builder.with_store(Arc::new(HeedStore::new(&path, true)?))
        }
        Store::InMemory => {
            // The in-memory store answers indexed queries over its own
            // contents.
            let store = Arc::new(InMemoryStore::new());
            builder
                .with_store(store.clone())
                .with_index(store as Arc<dyn VectorIndex>)
        }
    };

    builder
        .build()
        .listen(SocketAddr::new(cli.host.parse()?, cli.port))
        .await
}
