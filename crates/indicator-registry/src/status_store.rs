//! Latest alert status per indicator.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::clock::Clock;
use crate::error::StatusError;

/// A request to record one indicator's status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateRequest {
    /// UID of the document the indicator belongs to.
    pub document_uid: String,
    /// Indicator name within that document.
    pub indicator_name: String,
    /// New status, e.g. `critical`.
    pub status: String,
}

impl UpdateRequest {
    /// Creates an update request.
    pub fn new(
        document_uid: impl Into<String>,
        indicator_name: impl Into<String>,
        status: impl Into<String>,
    ) -> Self {
        Self {
            document_uid: document_uid.into(),
            indicator_name: indicator_name.into(),
            status: status.into(),
        }
    }

    fn validate(&self) -> Result<(), StatusError> {
        if self.indicator_name.trim().is_empty() {
            return Err(StatusError::MissingName);
        }
        if self.status.trim().is_empty() {
            return Err(StatusError::MissingStatus);
        }
        Ok(())
    }
}

/// One entry of a bulk status report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEntry {
    /// Indicator name.
    #[serde(default)]
    pub name: String,
    /// New status.
    #[serde(default)]
    pub status: String,
}

/// The recorded status of an indicator.
///
/// The default value (empty status, epoch timestamp) stands for "nothing
/// recorded yet".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndicatorStatus {
    /// Last reported status.
    pub status: String,
    /// When it was reported.
    pub updated_at: DateTime<Utc>,
}

impl IndicatorStatus {
    /// Whether a status has ever been recorded.
    #[must_use]
    pub fn is_recorded(&self) -> bool {
        !self.status.is_empty()
    }
}

/// Thread-safe map of document UID to the statuses of its indicators.
///
/// A bulk report is applied under a single write lock, so readers see either
/// none or all of it.
pub struct StatusStore {
    clock: Arc<dyn Clock>,
    statuses: RwLock<HashMap<String, HashMap<String, IndicatorStatus>>>,
}

impl std::fmt::Debug for StatusStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusStore")
            .field("documents", &self.statuses.read().len())
            .finish_non_exhaustive()
    }
}

impl StatusStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            statuses: RwLock::new(HashMap::new()),
        }
    }

    /// Records a status, replacing any earlier one for the same indicator.
    ///
    /// # Errors
    ///
    /// Returns [`StatusError::MissingName`] or [`StatusError::MissingStatus`]
    /// if the corresponding field is blank.
    pub fn update_status(&self, request: UpdateRequest) -> Result<(), StatusError> {
        request.validate()?;

        let record = IndicatorStatus {
            status: request.status,
            updated_at: self.clock.now(),
        };
        debug!(
            uid = %request.document_uid,
            indicator = %request.indicator_name,
            status = %record.status,
            "updated indicator status"
        );
        self.statuses
            .write()
            .entry(request.document_uid)
            .or_default()
            .insert(request.indicator_name, record);
        Ok(())
    }

    /// Records a batch of statuses for one document.
    ///
    /// The batch is validated first; if any entry is malformed nothing is
    /// recorded and one message per bad entry is returned.
    pub fn update_statuses(&self, document_uid: &str, entries: &[StatusEntry]) -> Result<(), Vec<String>> {
        let requests: Vec<UpdateRequest> = entries
            .iter()
            .map(|entry| UpdateRequest::new(document_uid, &entry.name, &entry.status))
            .collect();

        let errors: Vec<String> = requests
            .iter()
            .enumerate()
            .filter_map(|(idx, request)| {
                request
                    .validate()
                    .err()
                    .map(|err| format!("entries[{idx}]: {err}"))
            })
            .collect();
        if !errors.is_empty() {
            return Err(errors);
        }

        let now = self.clock.now();
        let mut statuses = self.statuses.write();
        let document = statuses.entry(document_uid.to_string()).or_default();
        for request in requests {
            document.insert(
                request.indicator_name,
                IndicatorStatus {
                    status: request.status,
                    updated_at: now,
                },
            );
        }
        drop(statuses);

        debug!(uid = %document_uid, count = entries.len(), "updated indicator statuses");
        Ok(())
    }

    /// Returns the recorded status, or the default value if there is none.
    #[must_use]
    pub fn status_for(&self, document_uid: &str, indicator_name: &str) -> IndicatorStatus {
        self.statuses
            .read()
            .get(document_uid)
            .and_then(|document| document.get(indicator_name))
            .cloned()
            .unwrap_or_default()
    }

    /// Returns every recorded status of one document, read in one step.
    #[must_use]
    pub fn document_statuses(&self, document_uid: &str) -> HashMap<String, IndicatorStatus> {
        self.statuses
            .read()
            .get(document_uid)
            .cloned()
            .unwrap_or_default()
    }

    /// Drops every status recorded for the given documents.
    ///
    /// Returns how many documents had statuses.
    pub fn forget_documents(&self, document_uids: &[String]) -> usize {
        if document_uids.is_empty() {
            return 0;
        }
        let mut statuses = self.statuses.write();
        let forgotten = document_uids
            .iter()
            .filter(|uid| statuses.remove(uid.as_str()).is_some())
            .count();
        drop(statuses);

        if forgotten > 0 {
            debug!(documents = forgotten, "dropped statuses of expired documents");
        }
        forgotten
    }

    /// Number of documents with at least one recorded status.
    #[must_use]
    pub fn len(&self) -> usize {
        self.statuses.read().len()
    }

    /// Whether no status has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.statuses.read().is_empty()
    }
}
