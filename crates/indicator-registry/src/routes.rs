//! Route configuration for the registry API.

use std::sync::Arc;

use axum::routing::{get, post, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers::{bulk_status, get_document, health_check, list_documents, register};
use crate::state::RegistryState;

/// Create the registry API router.
pub fn create_router(state: Arc<RegistryState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let v1_routes = Router::new()
        .route("/register", post(register))
        .route("/indicator-documents", get(list_documents))
        .route("/indicator-documents/{document_id}", get(get_document))
        .route(
            "/indicator-documents/{document_id}/bulk_status",
            post(bulk_status),
        );

    Router::new()
        .route("/health", get(health_check))
        .nest("/v1", v1_routes)
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
