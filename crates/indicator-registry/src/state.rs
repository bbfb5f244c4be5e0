//! Shared state for the registry server.

use std::collections::BTreeMap;
use std::sync::Arc;

use indicator_core::{process_document, Patch};
use tracing::{info, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::RegistryConfig;
use crate::document_store::DocumentStore;
use crate::error::{RegistryError, RegistryResult};
use crate::status_store::{StatusEntry, StatusStore};
use crate::types::{DocumentView, RegisterResponse};

/// Shared state for the registry server.
#[derive(Debug)]
pub struct RegistryState {
    /// Registry configuration.
    config: Arc<RegistryConfig>,
    /// Patches applied to every registration.
    patches: Vec<Patch>,
    /// Registered documents.
    documents: DocumentStore,
    /// Reported indicator statuses.
    statuses: StatusStore,
}

impl RegistryState {
    /// Create a new registry state backed by the system clock.
    #[must_use]
    pub fn new(config: RegistryConfig, patches: Vec<Patch>) -> Self {
        Self::with_clock(config, patches, Arc::new(SystemClock))
    }

    /// Create a new registry state with an explicit time source.
    #[must_use]
    pub fn with_clock(config: RegistryConfig, patches: Vec<Patch>, clock: Arc<dyn Clock>) -> Self {
        Self {
            documents: DocumentStore::new(config.document_ttl, Arc::clone(&clock)),
            statuses: StatusStore::new(clock),
            config: Arc::new(config),
            patches,
        }
    }

    /// Get the configuration.
    #[must_use]
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Get the patches applied on registration.
    #[must_use]
    pub fn patches(&self) -> &[Patch] {
        &self.patches
    }

    /// Get the document store.
    #[must_use]
    pub const fn documents(&self) -> &DocumentStore {
        &self.documents
    }

    /// Get the status store.
    #[must_use]
    pub const fn statuses(&self) -> &StatusStore {
        &self.statuses
    }

    /// Patches, validates and stores a raw document.
    ///
    /// `hints` fill metadata keys the document does not set itself.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::InvalidDocument`] if the document cannot be
    /// read or fails validation; nothing is stored in that case.
    pub fn register(&self, raw: &[u8], hints: &BTreeMap<String, String>) -> RegistryResult<RegisterResponse> {
        let processed = process_document(&self.patches, raw).inspect_err(|err| {
            warn!(error = %err, "rejected document registration");
        })?;

        let mut document = processed.document;
        for (key, value) in hints {
            document
                .metadata
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }

        for err in &processed.errors {
            warn!(product = %document.product.name, error = %err, "patch not applied");
        }

        let product = document.product.clone();
        let upserted = self.documents.upsert(document);
        self.statuses.forget_documents(&upserted.expired);
        let uid = upserted.uid;
        info!(
            uid = %uid,
            product = %product.name,
            version = %product.version,
            patch_errors = processed.errors.len(),
            "registered document"
        );

        Ok(RegisterResponse {
            uid,
            patch_errors: processed.errors,
        })
    }

    /// Lists every live document joined with its indicator statuses.
    #[must_use]
    pub fn document_views(&self) -> Vec<DocumentView> {
        self.documents
            .all_documents()
            .into_iter()
            .map(|document| {
                let statuses = self.statuses.document_statuses(&document.uid());
                DocumentView::new(document, |name| {
                    statuses.get(name).cloned().unwrap_or_default()
                })
            })
            .collect()
    }

    /// Returns one live document joined with its indicator statuses.
    #[must_use]
    pub fn document_view(&self, uid: &str) -> Option<DocumentView> {
        self.documents.document_for(uid).map(|document| {
            let statuses = self.statuses.document_statuses(uid);
            DocumentView::new(document, |name| {
                statuses.get(name).cloned().unwrap_or_default()
            })
        })
    }

    /// Records a bulk status report for one document.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::InvalidRequest`] listing every malformed
    /// entry; nothing is recorded in that case.
    pub fn update_statuses(&self, document_uid: &str, entries: &[StatusEntry]) -> RegistryResult<()> {
        self.statuses
            .update_statuses(document_uid, entries)
            .map_err(|errors| {
                warn!(uid = %document_uid, errors = errors.len(), "rejected status update");
                RegistryError::InvalidRequest { errors }
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::{TimeZone, Utc};
    use indicator_core::{ApiVersion, Match, PatchOperation};

    const V0_DOCUMENT: &str = r"---
apiVersion: v0

product:
  name: redis-tile
  version: 0.11

metadata:
  deployment: redis-abc-123

indicators:
- name: test_performance_indicator
  promql: prom
  thresholds:
  - level: warning
    gte: 50
";

    fn state(patches: Vec<Patch>) -> (RegistryState, ManualClock) {
        let clock = ManualClock::at(Utc.with_ymd_and_hms(2012, 12, 1, 16, 45, 19).unwrap());
        let state = RegistryState::with_clock(
            RegistryConfig::default(),
            patches,
            Arc::new(clock.clone()),
        );
        (state, clock)
    }

    #[test]
    fn register_stores_processed_document() {
        let (state, _) = state(Vec::new());
        let response = state.register(V0_DOCUMENT.as_bytes(), &BTreeMap::new()).unwrap();

        assert!(response.uid.starts_with("redis-tile-"));
        assert!(response.patch_errors.is_empty());
        assert_eq!(state.documents().len(), 1);
    }

    #[test]
    fn register_fills_missing_metadata_from_hints() {
        let (state, _) = state(Vec::new());
        let hints = BTreeMap::from([
            ("deployment".to_string(), "ignored".to_string()),
            ("az".to_string(), "z1".to_string()),
        ]);

        let response = state.register(V0_DOCUMENT.as_bytes(), &hints).unwrap();
        let stored = state.documents().document_for(&response.uid).unwrap();

        assert_eq!(stored.metadata["deployment"], "redis-abc-123");
        assert_eq!(stored.metadata["az"], "z1");
    }

    #[test]
    fn register_reports_patch_errors() {
        let patch = Patch::new(ApiVersion::V0, Match::default())
            .with_operation(PatchOperation::remove("/indicators/7"));
        let (state, _) = state(vec![patch]);

        let response = state.register(V0_DOCUMENT.as_bytes(), &BTreeMap::new()).unwrap();

        assert_eq!(response.patch_errors.len(), 1);
        assert_eq!(state.documents().len(), 1);
    }

    #[test]
    fn invalid_registration_stores_nothing() {
        let (state, _) = state(Vec::new());
        let err = state
            .register(b"apiVersion: v0\nindicators: []\n", &BTreeMap::new())
            .unwrap_err();

        assert!(matches!(err, RegistryError::InvalidDocument { .. }));
        assert!(state.documents().is_empty());
    }

    #[test]
    fn views_join_statuses() {
        let (state, _) = state(Vec::new());
        let uid = state
            .register(V0_DOCUMENT.as_bytes(), &BTreeMap::new())
            .unwrap()
            .uid;
        state
            .update_statuses(
                &uid,
                &[StatusEntry {
                    name: "test_performance_indicator".to_string(),
                    status: "critical".to_string(),
                }],
            )
            .unwrap();

        let views = state.document_views();
        let status = views[0].indicators[0].status.clone().unwrap();

        assert_eq!(status.value, "critical");
        assert_eq!(status.updated_at, "2012-12-01T16:45:19Z");
        assert_eq!(state.document_view(&uid).as_ref(), views.first());
    }

    #[test]
    fn expired_document_has_no_view() {
        let (state, clock) = state(Vec::new());
        let uid = state
            .register(V0_DOCUMENT.as_bytes(), &BTreeMap::new())
            .unwrap()
            .uid;

        clock.advance(chrono::Duration::hours(2));

        assert!(state.document_view(&uid).is_none());
        assert!(state.document_views().is_empty());
    }

    #[test]
    fn expired_documents_lose_their_statuses() {
        let (state, clock) = state(Vec::new());
        let report = [StatusEntry {
            name: "test_performance_indicator".to_string(),
            status: "critical".to_string(),
        }];
        let expired = state
            .register(V0_DOCUMENT.as_bytes(), &BTreeMap::new())
            .unwrap()
            .uid;
        let renewed = state
            .register(V0_DOCUMENT.replace("redis-tile", "mysql").as_bytes(), &BTreeMap::new())
            .unwrap()
            .uid;
        state.update_statuses(&expired, &report).unwrap();
        state.update_statuses(&renewed, &report).unwrap();
        state.update_statuses("not-yet-registered", &report).unwrap();

        clock.advance(chrono::Duration::hours(2));
        state
            .register(V0_DOCUMENT.replace("redis-tile", "mysql").as_bytes(), &BTreeMap::new())
            .unwrap();

        assert!(state.statuses().document_statuses(&expired).is_empty());
        assert!(!state.statuses().document_statuses(&renewed).is_empty());
        assert!(!state.statuses().document_statuses("not-yet-registered").is_empty());
        assert_eq!(state.statuses().len(), 2);
    }
}
