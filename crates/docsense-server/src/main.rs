//! Server binary entry point.

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use docsense_core::{
    load_default_embedder, BlobStore, LifecycleController, SemanticIndex, INDEX_DIR_NAME,
};
use docsense_server::{config::ServerConfig, start_server, sweeper, ApiState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "docsense_server=info,docsense_core=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env();

    let store = BlobStore::with_partition_dirs(
        config.store_dir.clone(),
        config.bulk_dir.clone(),
        config.fresh_dir.clone(),
        config.viewer_dir.clone(),
    )?;
    let embedder = load_default_embedder();
    tracing::info!(backend = embedder.name(), dim = embedder.dim(), "embedder ready");

    let index = SemanticIndex::open(config.store_dir.join(INDEX_DIR_NAME), embedder)?;
    let controller = Arc::new(LifecycleController::new(store, index));

    let _sweeper = sweeper::spawn(&config);

    let state = ApiState::new(controller);
    start_server(&config.bind_addr(), state).await?;
    Ok(())
}
