/// API server for agent-trail.
///
/// A thin routing layer over the pipeline, worker, and verifier. The
/// server:
/// - Runs automation goals and issues pending receipts
/// - Lists and fetches org-scoped execution records
/// - Queues anchor retries
/// - Answers public verification requests
pub mod auth;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::chain::ChainGateway;
use crate::engine::AutomationEngine;
use crate::state::RecordStore;
use crate::worker::AnchorWorker;

/// Shared application state available to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Execution records and org credentials.
    pub store: Arc<dyn RecordStore>,
    /// Automation engine boundary.
    pub engine: Arc<dyn AutomationEngine>,
    /// Chain read side, used by verification.
    pub gateway: Arc<dyn ChainGateway>,
    /// Anchor queue handle.
    pub worker: AnchorWorker,
}

/// Build the Axum application with all routes and middleware.
pub fn build_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(routes::health_routes())
        .merge(routes::execution_routes())
        .merge(routes::verify_routes())
        .with_state(Arc::new(state))
        .layer(CompressionLayer::new())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Start the API server.
pub async fn serve(state: AppState, addr: &str) -> crate::error::Result<()> {
    let app = build_app(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(crate::error::TrailError::Io)?;

    tracing::info!("agent-trail API server listening on {addr}");

    axum::serve(listener, app)
        .await
        .map_err(crate::error::TrailError::Io)?;

    Ok(())
}
