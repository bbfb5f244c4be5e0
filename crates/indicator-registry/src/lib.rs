//! # indicator-registry
//!
//! HTTP registry for indicator documents and their live alert status.
//!
//! Producers register YAML indicator documents; every registration is patched
//! with the configured patches, validated, and stored under a UID derived from
//! its product and metadata. Registrations expire after a configurable TTL.
//! Evaluators report per-indicator status in bulk, and readers list every live
//! document joined with its latest status.
//!
//! ## Example
//!
//! ```rust,no_run
//! use indicator_registry::{RegistryConfig, RegistryServer};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = RegistryConfig::default().with_patch_path("/etc/indicator-registry/patches");
//!     let patches = config.load_patches().unwrap();
//!
//!     let server = RegistryServer::new(config, patches);
//!     server.serve().await.unwrap();
//! }
//! ```
//!
//! ## API Endpoints
//!
//! | Endpoint | Method | Description |
//! |----------|--------|-------------|
//! | `/health` | GET | Liveness and live document count |
//! | `/v1/register` | POST | Register a YAML document; query parameters fill missing metadata |
//! | `/v1/indicator-documents` | GET | List live documents with indicator status |
//! | `/v1/indicator-documents/{uid}` | GET | One live document with status, 404 if absent |
//! | `/v1/indicator-documents/{uid}/bulk_status` | POST | Record statuses for one document |

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cli;
pub mod clock;
pub mod config;
pub mod document_store;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod server;
pub mod state;
pub mod status_store;
pub mod types;

// Re-export main types
pub use clock::{Clock, SystemClock};
pub use config::{RegistryConfig, DEFAULT_DOCUMENT_TTL};
pub use document_store::{DocumentStore, Upserted};
pub use error::{RegistryError, RegistryResult, StatusError};
pub use routes::create_router;
pub use server::RegistryServer;
pub use state::RegistryState;
pub use status_store::{IndicatorStatus, StatusEntry, StatusStore, UpdateRequest};
pub use types::{DocumentView, HealthResponse, IndicatorView, RegisterResponse, StatusView};
