//! JSON shapes returned by the registry API.

use std::collections::BTreeMap;

use chrono::SecondsFormat;
use indicator_core::{Alert, Document, Indicator, Layout, Presentation, Product, Threshold};
use serde::{Deserialize, Serialize};

use crate::status_store::IndicatorStatus;

/// A registered document with live status, as listed by the API.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentView {
    /// Schema the document was registered in.
    pub api_version: String,
    /// Registry key.
    pub uid: String,
    /// Product identity.
    pub product: Product,
    /// Deployment identity and labels.
    pub metadata: BTreeMap<String, String>,
    /// Indicators joined with their status.
    pub indicators: Vec<IndicatorView>,
    /// Presentation grouping.
    pub layout: Layout,
}

/// An indicator joined with its latest status.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndicatorView {
    /// Indicator name.
    pub name: String,
    /// Query template.
    pub promql: String,
    /// Alert levels.
    pub thresholds: Vec<Threshold>,
    /// Alerting parameters.
    pub alert: Alert,
    /// Rendering hints; `null` when absent.
    pub presentation: Option<Presentation>,
    /// Free-form documentation fields.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub documentation: BTreeMap<String, String>,
    /// Latest status; `null` when none has been reported.
    pub status: Option<StatusView>,
}

/// A reported status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusView {
    /// Status value, e.g. `critical`.
    pub value: String,
    /// RFC 3339 UTC timestamp of the report.
    pub updated_at: String,
}

impl StatusView {
    /// Renders a recorded status; `None` if nothing was recorded.
    #[must_use]
    pub fn from_status(status: &IndicatorStatus) -> Option<Self> {
        status.is_recorded().then(|| Self {
            value: status.status.clone(),
            updated_at: status
                .updated_at
                .to_rfc3339_opts(SecondsFormat::Secs, true),
        })
    }
}

impl DocumentView {
    /// Joins a document with statuses looked up by indicator name.
    pub fn new<F>(document: Document, mut status_of: F) -> Self
    where
        F: FnMut(&str) -> IndicatorStatus,
    {
        let uid = document.uid();
        let indicators = document
            .indicators
            .into_iter()
            .map(|indicator| {
                let status = status_of(&indicator.name);
                IndicatorView::new(indicator, StatusView::from_status(&status))
            })
            .collect();

        Self {
            api_version: document.api_version.to_string(),
            uid,
            product: document.product,
            metadata: document.metadata,
            indicators,
            layout: document.layout,
        }
    }
}

impl IndicatorView {
    fn new(indicator: Indicator, status: Option<StatusView>) -> Self {
        Self {
            name: indicator.name,
            promql: indicator.promql,
            thresholds: indicator.thresholds,
            alert: indicator.alert,
            presentation: indicator.presentation,
            documentation: indicator.documentation,
            status,
        }
    }
}

/// Response to a successful registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    /// UID the document is stored under.
    pub uid: String,
    /// Patch operations that could not be applied.
    pub patch_errors: Vec<String>,
}

/// Response of the health endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always `ok`.
    pub status: String,
    /// Number of live documents.
    pub documents: usize,
}
