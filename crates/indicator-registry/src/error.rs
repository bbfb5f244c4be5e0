//! Error types for the registry.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use indicator_core::DocumentError;
use serde::Serialize;
use thiserror::Error;

/// Result type alias for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// A rejected status update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StatusError {
    /// The indicator name was blank.
    #[error("indicator name is required")]
    MissingName,

    /// The status value was blank.
    #[error("status is required")]
    MissingStatus,
}

/// Errors surfaced by the registry service.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A submitted document could not be read or failed validation.
    #[error("invalid document: {}", errors.join(", "))]
    InvalidDocument {
        /// Every reason, in order.
        errors: Vec<String>,
    },

    /// A request body or parameter was malformed.
    #[error("invalid request: {}", errors.join(", "))]
    InvalidRequest {
        /// Every reason, in order.
        errors: Vec<String>,
    },

    /// Resource not found.
    #[error("{0} not found: {1}")]
    NotFound(String, String),

    /// Failed to bind to the specified address.
    #[error("failed to bind to {0}: {1}")]
    BindFailed(std::net::SocketAddr, std::io::Error),

    /// Configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl RegistryError {
    /// Creates an [`RegistryError::InvalidRequest`] with a single reason.
    pub fn invalid_request(reason: impl Into<String>) -> Self {
        Self::InvalidRequest {
            errors: vec![reason.into()],
        }
    }

    /// Messages reported to clients in the `errors` field.
    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        match self {
            Self::InvalidDocument { errors } | Self::InvalidRequest { errors } => errors.clone(),
            other => vec![other.to_string()],
        }
    }
}

impl From<DocumentError> for RegistryError {
    fn from(err: DocumentError) -> Self {
        Self::InvalidDocument {
            errors: err.messages(),
        }
    }
}

/// JSON error response body.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    errors: Vec<String>,
}

impl IntoResponse for RegistryError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::InvalidDocument { .. } | Self::InvalidRequest { .. } => StatusCode::BAD_REQUEST,
            Self::NotFound(_, _) => StatusCode::NOT_FOUND,
            Self::BindFailed(_, _) | Self::Config(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = ErrorResponse {
            errors: self.messages(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn invalid_document_lists_every_error() {
        let err = RegistryError::from(DocumentError::Invalid {
            errors: vec![
                "product name is required".to_string(),
                "indicators[0] promql is required".to_string(),
            ],
        });
        let response = err.into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["errors"][0], "product name is required");
        assert_eq!(json["errors"][1], "indicators[0] promql is required");
    }

    #[tokio::test]
    async fn structural_error_is_bad_request() {
        let err = RegistryError::from(DocumentError::Structural("could not parse document".into()));
        let response = err.into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["errors"][0], "could not parse document");
    }

    #[tokio::test]
    async fn not_found_response() {
        let err = RegistryError::NotFound("document".to_string(), "abc".to_string());
        let response = err.into_response();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let json = body_json(response).await;
        assert_eq!(json["errors"][0], "document not found: abc");
    }

    #[tokio::test]
    async fn internal_error_response() {
        let response = RegistryError::Internal("boom".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn error_display() {
        let err = RegistryError::invalid_request("body must be a JSON array");
        assert_eq!(err.to_string(), "invalid request: body must be a JSON array");

        assert_eq!(StatusError::MissingName.to_string(), "indicator name is required");
    }
}
