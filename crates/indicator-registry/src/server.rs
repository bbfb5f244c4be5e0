//! Registry server implementation.

use std::future::Future;
use std::sync::Arc;

use indicator_core::Patch;
use tokio::net::TcpListener;
use tracing::info;

use crate::config::RegistryConfig;
use crate::error::{RegistryError, RegistryResult};
use crate::routes::create_router;
use crate::state::RegistryState;

/// HTTP server for document registration and status reporting.
#[derive(Debug, Clone)]
pub struct RegistryServer {
    state: Arc<RegistryState>,
}

impl RegistryServer {
    /// Create a new registry server.
    #[must_use]
    pub fn new(config: RegistryConfig, patches: Vec<Patch>) -> Self {
        Self {
            state: Arc::new(RegistryState::new(config, patches)),
        }
    }

    /// Create a server around existing state.
    #[must_use]
    pub const fn with_state(state: Arc<RegistryState>) -> Self {
        Self { state }
    }

    /// Get the registry state for external access.
    #[must_use]
    pub fn state(&self) -> Arc<RegistryState> {
        Arc::clone(&self.state)
    }

    /// Start the server on the configured address.
    ///
    /// This method runs until the server encounters a fatal error.
    ///
    /// # Errors
    ///
    /// Returns an error if binding to the address fails.
    pub async fn serve(&self) -> RegistryResult<()> {
        self.serve_with_shutdown(std::future::pending()).await
    }

    /// Start the server with graceful shutdown support.
    ///
    /// The server will shut down when the provided future completes.
    ///
    /// # Errors
    ///
    /// Returns an error if binding to the address fails.
    pub async fn serve_with_shutdown<F>(&self, shutdown: F) -> RegistryResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.state.config().bind_addr;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| RegistryError::BindFailed(addr, e))?;

        self.serve_listener(listener, shutdown).await
    }

    /// Serve on an already bound listener until `shutdown` completes.
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails while running.
    pub async fn serve_listener<F>(&self, listener: TcpListener, shutdown: F) -> RegistryResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener
            .local_addr()
            .map_err(|e| RegistryError::Internal(e.to_string()))?;
        info!(
            addr = %addr,
            ttl_secs = self.state.config().document_ttl.as_secs(),
            patches = self.state.patches().len(),
            "Registry server listening"
        );

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| RegistryError::Internal(e.to_string()))?;

        info!("Registry server shut down");
        Ok(())
    }

    /// Create the router without starting the server.
    ///
    /// Useful for testing or embedding in another server.
    pub fn router(&self) -> axum::Router {
        create_router(Arc::clone(&self.state))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use std::net::SocketAddr;
    use tower::ServiceExt;

    #[tokio::test]
    async fn router_serves_health() {
        let server = RegistryServer::new(RegistryConfig::default(), Vec::new());

        let response = server
            .router()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn serve_reports_bind_failure() {
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr: SocketAddr = taken.local_addr().unwrap();
        let server = RegistryServer::new(RegistryConfig::new(addr), Vec::new());

        let err = server.serve_with_shutdown(async {}).await.unwrap_err();

        assert!(matches!(err, RegistryError::BindFailed(a, _) if a == addr));
    }

    #[tokio::test]
    async fn shuts_down_when_signalled() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let server = RegistryServer::new(RegistryConfig::default(), Vec::new());

        server.serve_listener(listener, async {}).await.unwrap();
    }

    #[test]
    fn state_is_shared() {
        let server = RegistryServer::new(RegistryConfig::default(), Vec::new());
        let other = RegistryServer::with_state(server.state());

        assert!(Arc::ptr_eq(&server.state(), &other.state()));
    }
}
