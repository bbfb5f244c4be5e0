//! Canonical indicator document model.
//!
//! Both wire schemas (`v0` and `indicatorprotocol.io/v1`) are normalized into
//! the types in this module:
//! - [`Document`]: a product's full set of indicators plus layout
//! - [`Indicator`]: a named `PromQL` query with thresholds and alerting parameters
//! - [`Threshold`] and [`ThresholdOperator`]: alert levels for an indicator
//! - [`Layout`] and [`Section`]: presentation grouping of indicators

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Default `for` and `step` durations applied to alerts that omit them.
pub const DEFAULT_ALERT_DURATION: &str = "1m";

/// Chart type used by the synthesized default presentation.
pub const DEFAULT_CHART_TYPE: &str = "step";

/// Title of the section synthesized when a document declares no layout.
pub const DEFAULT_SECTION_TITLE: &str = "Metrics";

/// The schema version a document was written in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ApiVersion {
    /// The legacy flat schema.
    #[serde(rename = "v0", alias = "v0/patch")]
    V0,
    /// The current nested schema.
    #[default]
    #[serde(rename = "indicatorprotocol.io/v1")]
    V1,
}

impl ApiVersion {
    /// Wire name of the legacy schema.
    pub const V0_NAME: &'static str = "v0";
    /// Wire name used by legacy patch files.
    pub const V0_PATCH_NAME: &'static str = "v0/patch";
    /// Wire name of the current schema.
    pub const V1_NAME: &'static str = "indicatorprotocol.io/v1";

    /// Selects the schema for a document's declared `apiVersion`.
    ///
    /// Anything other than `v0` is read with the current schema.
    #[must_use]
    pub fn for_document(declared: &str) -> Self {
        if declared == Self::V0_NAME {
            Self::V0
        } else {
            Self::V1
        }
    }

    /// Returns the wire name of this version.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::V0 => Self::V0_NAME,
            Self::V1 => Self::V1_NAME,
        }
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The product a document describes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    /// Product name.
    pub name: String,
    /// Product version.
    pub version: String,
}

impl Product {
    /// Creates a product identity.
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

/// Comparison operator of a threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ThresholdOperator {
    /// `>`
    #[serde(rename = "gt", alias = ">")]
    GreaterThan,
    /// `>=`
    #[serde(rename = "gte", alias = ">=")]
    GreaterThanOrEqualTo,
    /// `<`
    #[serde(rename = "lt", alias = "<")]
    LessThan,
    /// `<=`
    #[serde(rename = "lte", alias = "<=")]
    LessThanOrEqualTo,
    /// `==`
    #[serde(rename = "eq", alias = "==")]
    EqualTo,
    /// `!=`
    #[serde(rename = "neq", alias = "!=")]
    NotEqualTo,
}

impl ThresholdOperator {
    /// Every operator, in wire order.
    pub const ALL: [Self; 6] = [
        Self::GreaterThan,
        Self::GreaterThanOrEqualTo,
        Self::LessThan,
        Self::LessThanOrEqualTo,
        Self::EqualTo,
        Self::NotEqualTo,
    ];

    /// Returns the short wire name (`gt`, `gte`, ...).
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::GreaterThan => "gt",
            Self::GreaterThanOrEqualTo => "gte",
            Self::LessThan => "lt",
            Self::LessThanOrEqualTo => "lte",
            Self::EqualTo => "eq",
            Self::NotEqualTo => "neq",
        }
    }

    /// Returns the `PromQL` comparison symbol.
    #[must_use]
    pub const fn as_symbol(&self) -> &'static str {
        match self {
            Self::GreaterThan => ">",
            Self::GreaterThanOrEqualTo => ">=",
            Self::LessThan => "<",
            Self::LessThanOrEqualTo => "<=",
            Self::EqualTo => "==",
            Self::NotEqualTo => "!=",
        }
    }
}

impl FromStr for ThresholdOperator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|op| op.as_str() == s || op.as_symbol() == s)
            .ok_or_else(|| format!("unknown threshold operator '{s}'"))
    }
}

impl fmt::Display for ThresholdOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_symbol())
    }
}

/// An alert level for an indicator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Threshold {
    /// Free-form level, e.g. `warning` or `critical`.
    pub level: String,
    /// How the query result is compared to `value`.
    pub operator: ThresholdOperator,
    /// The threshold value.
    pub value: f64,
}

impl Threshold {
    /// Creates a threshold.
    pub fn new(level: impl Into<String>, operator: ThresholdOperator, value: f64) -> Self {
        Self {
            level: level.into(),
            operator,
            value,
        }
    }
}

/// Alerting parameters of an indicator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    /// How long a threshold must be breached before alerting.
    #[serde(rename = "for")]
    pub for_duration: String,
    /// Evaluation step.
    pub step: String,
}

impl Default for Alert {
    fn default() -> Self {
        Self {
            for_duration: DEFAULT_ALERT_DURATION.to_string(),
            step: DEFAULT_ALERT_DURATION.to_string(),
        }
    }
}

/// Presentation hints for rendering an indicator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Presentation {
    /// Chart style, e.g. `step`, `bar`, `status`.
    pub chart_type: String,
    /// Whether to show the current value alongside the chart.
    pub current_value: bool,
    /// Refresh frequency in seconds.
    pub frequency: u64,
    /// Labels to split the chart by.
    pub labels: Vec<String>,
    /// Unit of the query result.
    pub units: String,
}

impl Presentation {
    /// The presentation synthesized for legacy documents that omit one.
    #[must_use]
    pub fn step_chart() -> Self {
        Self {
            chart_type: DEFAULT_CHART_TYPE.to_string(),
            ..Self::default()
        }
    }
}

/// A named `PromQL` query with thresholds and alerting parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Indicator {
    /// Unique name within the document.
    pub name: String,
    /// Query template.
    pub promql: String,
    /// Alert levels, in declaration order.
    pub thresholds: Vec<Threshold>,
    /// Alerting parameters.
    pub alert: Alert,
    /// Rendering hints, if any.
    pub presentation: Option<Presentation>,
    /// Free-form documentation fields.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub documentation: BTreeMap<String, String>,
}

impl Indicator {
    /// Creates an indicator with default alerting and no thresholds.
    pub fn new(name: impl Into<String>, promql: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            promql: promql.into(),
            ..Self::default()
        }
    }
}

/// A titled group of indicators.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    /// Section heading.
    #[serde(default)]
    pub title: String,
    /// Section description.
    #[serde(default)]
    pub description: String,
    /// Names of the indicators in this section, in display order.
    #[serde(default)]
    pub indicators: Vec<String>,
}

/// Presentation grouping of a document's indicators.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Layout {
    /// Document title.
    #[serde(default)]
    pub title: String,
    /// Document description.
    #[serde(default)]
    pub description: String,
    /// Sections, in display order.
    #[serde(default)]
    pub sections: Vec<Section>,
    /// Owning team.
    #[serde(default)]
    pub owner: String,
}

impl Layout {
    /// Builds the single-section layout used when a document declares none.
    #[must_use]
    pub fn single_section(indicators: &[Indicator]) -> Self {
        Self {
            sections: vec![Section {
                title: DEFAULT_SECTION_TITLE.to_string(),
                description: String::new(),
                indicators: indicators.iter().map(|i| i.name.clone()).collect(),
            }],
            ..Self::default()
        }
    }
}

/// A canonical indicator document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// The schema the document was written in.
    pub api_version: ApiVersion,
    /// Product identity.
    pub product: Product,
    /// Deployment identity and arbitrary labels.
    pub metadata: BTreeMap<String, String>,
    /// Indicators, in declaration order.
    pub indicators: Vec<Indicator>,
    /// Presentation grouping.
    pub layout: Layout,
}

impl Document {
    /// Returns the registry identifier of this document.
    ///
    /// The identifier depends only on the product name, product version and
    /// metadata, so re-registering a document with different indicators
    /// yields the same identifier.
    #[must_use]
    pub fn uid(&self) -> String {
        // Every field is length-prefixed so no two field lists share an encoding.
        fn field(hasher: &mut blake3::Hasher, bytes: &[u8]) {
            hasher.update(&(bytes.len() as u64).to_le_bytes());
            hasher.update(bytes);
        }

        let mut hasher = blake3::Hasher::new();
        hasher.update(b"indicator_document_v2");
        field(&mut hasher, self.product.name.as_bytes());
        field(&mut hasher, self.product.version.as_bytes());
        hasher.update(&(self.metadata.len() as u64).to_le_bytes());
        for (key, value) in &self.metadata {
            field(&mut hasher, key.as_bytes());
            field(&mut hasher, value.as_bytes());
        }

        format!("{}-{}", self.product.name, hasher.finalize().to_hex())
    }

    /// Checks required fields, returning every failure in order.
    ///
    /// An empty result means the document is valid.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.product.name.trim().is_empty() {
            errors.push("product name is required".to_string());
        }
        if self.product.version.trim().is_empty() {
            errors.push("product version is required".to_string());
        }

        for (idx, indicator) in self.indicators.iter().enumerate() {
            if indicator.name.trim().is_empty() {
                errors.push(format!("indicators[{idx}] name is required"));
            }
            if indicator.promql.trim().is_empty() {
                errors.push(format!("indicators[{idx}] promql is required"));
            }
        }

        errors
    }

    /// Finds an indicator by name.
    #[must_use]
    pub fn indicator(&self, name: &str) -> Option<&Indicator> {
        self.indicators.iter().find(|i| i.name == name)
    }
}
