//! HTTP request handlers for the registry API.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Serialize;

use crate::error::{RegistryError, RegistryResult};
use crate::state::RegistryState;
use crate::status_store::StatusEntry;
use crate::types::{DocumentView, HealthResponse, RegisterResponse};

/// Bulk status update response.
#[derive(Debug, Serialize)]
pub struct BulkStatusResponse {
    /// Number of statuses recorded.
    pub updated: usize,
}

/// Handle GET /health - liveness and document count.
pub async fn health_check(State(state): State<Arc<RegistryState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        documents: state.documents().len(),
    })
}

/// Handle POST /v1/register - register a YAML document.
///
/// Query parameters such as `?deployment=abc` fill metadata keys the
/// document does not set.
pub async fn register(
    State(state): State<Arc<RegistryState>>,
    Query(hints): Query<BTreeMap<String, String>>,
    body: Bytes,
) -> RegistryResult<Json<RegisterResponse>> {
    state.register(&body, &hints).map(Json)
}

/// Handle GET /v1/indicator-documents - list live documents with status.
pub async fn list_documents(State(state): State<Arc<RegistryState>>) -> Json<Vec<DocumentView>> {
    Json(state.document_views())
}

/// Handle GET /v1/indicator-documents/{document_id} - one live document.
pub async fn get_document(
    State(state): State<Arc<RegistryState>>,
    Path(document_id): Path<String>,
) -> RegistryResult<Json<DocumentView>> {
    state
        .document_view(&document_id)
        .map(Json)
        .ok_or_else(|| RegistryError::NotFound("document".to_string(), document_id))
}

/// Handle POST /v1/indicator-documents/{document_id}/bulk_status.
///
/// The body is a JSON array of `{"name", "status"}` objects.
pub async fn bulk_status(
    State(state): State<Arc<RegistryState>>,
    Path(document_id): Path<String>,
    body: Bytes,
) -> RegistryResult<Json<BulkStatusResponse>> {
    let entries: Vec<StatusEntry> = serde_json::from_slice(&body).map_err(|e| {
        RegistryError::invalid_request(format!(
            "body must be a JSON array of {{\"name\", \"status\"}} objects: {e}"
        ))
    })?;

    state.update_statuses(&document_id, &entries)?;
    Ok(Json(BulkStatusResponse {
        updated: entries.len(),
    }))
}
