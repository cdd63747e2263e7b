//! HTTP service for docsense.
//!
//! Exposes outline extraction, semantic ingest/query, storage lifecycle,
//! and file retrieval endpoints over axum. All handlers share one
//! `LifecycleController` injected through `ApiState`.

pub mod config;
pub mod handlers;
pub mod insights;
pub mod sweeper;
pub mod types;

use std::sync::Arc;

use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use docsense_core::LifecycleController;
use insights::{DisabledInsights, InsightProvider};

pub use config::ServerConfig;

/// State shared across handlers.
#[derive(Clone)]
pub struct ApiState {
    pub controller: Arc<LifecycleController>,
    pub insights: Arc<dyn InsightProvider>,
}

impl ApiState {
    /// State with no generative provider configured.
    pub fn new(controller: Arc<LifecycleController>) -> Self {
        Self {
            controller,
            insights: Arc::new(DisabledInsights),
        }
    }

    /// State with an explicit insight provider.
    pub fn with_insights(
        controller: Arc<LifecycleController>,
        insights: Arc<dyn InsightProvider>,
    ) -> Self {
        Self {
            controller,
            insights,
        }
    }
}

/// Build the API router with all endpoints.
pub fn build_router(state: ApiState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health))
        // Outline extraction
        .route("/outline", post(handlers::outline))
        // Semantic index
        .route("/search/ingest", post(handlers::search_ingest))
        .route("/search/query", post(handlers::search_query))
        .route("/search/force-reingest", post(handlers::force_reingest))
        // Storage lifecycle
        .route("/storage/status", get(handlers::storage_status))
        .route("/storage/files/{storage_type}", get(handlers::storage_files))
        .route("/storage/migrate", post(handlers::storage_migrate))
        .route("/storage/health", get(handlers::storage_health))
        .route("/storage/clear", post(handlers::storage_clear))
        .route("/storage/debug", get(handlers::storage_debug))
        // File retrieval and deletion
        .route(
            "/files/{doc_id}",
            get(handlers::serve_pdf).delete(handlers::delete_pdf),
        )
        .route("/files", delete(handlers::delete_pdfs))
        .route("/files/delete", post(handlers::delete_pdfs_post))
        // Capability-gated extras
        .route("/insights", post(handlers::insights))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the API server.
pub async fn start_server(addr: &str, state: ApiState) -> Result<(), std::io::Error> {
    tracing::info!("starting docsense API server on {}", addr);
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use docsense_core::{BlobStore, HashEmbedder, SemanticIndex, INDEX_DIR_NAME};

    fn state(tmp: &tempfile::TempDir) -> ApiState {
        let store = BlobStore::new(tmp.path()).unwrap();
        let index = SemanticIndex::open(
            tmp.path().join(INDEX_DIR_NAME),
            Arc::new(HashEmbedder::new()),
        )
        .unwrap();
        ApiState::new(Arc::new(LifecycleController::new(store, index)))
    }

    #[test]
    fn test_router_builds() {
        let tmp = tempfile::tempdir().unwrap();
        let _router = build_router(state(&tmp));
    }

    #[test]
    fn test_state_defaults_to_disabled_insights() {
        let tmp = tempfile::tempdir().unwrap();
        let state = state(&tmp);
        assert_eq!(state.insights.name(), "disabled");
        assert!(state.insights.insights("selection").is_none());
    }
}
