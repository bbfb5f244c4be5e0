//! Reading indicator documents from either wire schema.
//!
//! The `apiVersion` field picks the schema. Both schemas are normalized into
//! a [`Document`], default-filled, and then validated.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_yaml::Value;
use tracing::debug;

use crate::document::{
    Alert, ApiVersion, Document, Indicator, Layout, Presentation, Product, Threshold,
    ThresholdOperator, DEFAULT_ALERT_DURATION,
};
use crate::error::{DocumentError, Result};
use crate::yaml::{
    deserialize_resolved, deserialize_scalar, deserialize_scalar_map, member_string,
    parse_spelled, scalar_string,
};

#[derive(Debug, Default, Deserialize)]
struct WireProduct {
    #[serde(default, deserialize_with = "deserialize_scalar")]
    name: String,
    #[serde(default, deserialize_with = "deserialize_scalar")]
    version: String,
}

#[derive(Debug, Default, Deserialize)]
struct WireAlert {
    #[serde(default, rename = "for", deserialize_with = "deserialize_scalar")]
    for_duration: String,
    #[serde(default, deserialize_with = "deserialize_scalar")]
    step: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WirePresentation {
    #[serde(default)]
    chart_type: String,
    #[serde(default, deserialize_with = "deserialize_resolved")]
    current_value: bool,
    #[serde(default, deserialize_with = "deserialize_resolved")]
    frequency: u64,
    #[serde(default)]
    labels: Vec<String>,
    #[serde(default)]
    units: String,
}

#[derive(Debug, Deserialize)]
struct V0Document {
    #[serde(default)]
    product: WireProduct,
    #[serde(default, deserialize_with = "deserialize_scalar_map")]
    metadata: BTreeMap<String, String>,
    #[serde(default)]
    indicators: Vec<V0Indicator>,
    #[serde(default)]
    layout: Option<Layout>,
}

#[derive(Debug, Deserialize)]
struct V0Indicator {
    #[serde(default, deserialize_with = "deserialize_scalar")]
    name: String,
    #[serde(default, deserialize_with = "deserialize_scalar")]
    promql: String,
    #[serde(default)]
    thresholds: Vec<serde_yaml::Mapping>,
    #[serde(default)]
    alert: Option<WireAlert>,
    #[serde(default)]
    presentation: Option<WirePresentation>,
    #[serde(default, deserialize_with = "deserialize_scalar_map")]
    documentation: BTreeMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
struct V1Metadata {
    #[serde(default, deserialize_with = "deserialize_scalar_map")]
    labels: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct V1Document {
    #[serde(default)]
    metadata: V1Metadata,
    #[serde(default)]
    spec: V1Spec,
}

#[derive(Debug, Default, Deserialize)]
struct V1Spec {
    #[serde(default)]
    product: WireProduct,
    #[serde(default)]
    indicators: Vec<V1Indicator>,
    #[serde(default)]
    layout: Option<Layout>,
}

#[derive(Debug, Deserialize)]
struct V1Indicator {
    #[serde(default, deserialize_with = "deserialize_scalar")]
    name: String,
    #[serde(default, deserialize_with = "deserialize_scalar")]
    promql: String,
    #[serde(default)]
    thresholds: Vec<V1Threshold>,
    #[serde(default)]
    alert: Option<WireAlert>,
    #[serde(default)]
    presentation: Option<WirePresentation>,
    #[serde(default, deserialize_with = "deserialize_scalar_map")]
    documentation: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct V1Threshold {
    #[serde(deserialize_with = "deserialize_scalar")]
    level: String,
    operator: ThresholdOperator,
    #[serde(deserialize_with = "deserialize_resolved")]
    value: f64,
}

impl From<V1Threshold> for Threshold {
    fn from(t: V1Threshold) -> Self {
        Self::new(t.level, t.operator, t.value)
    }
}

impl From<WireProduct> for Product {
    fn from(p: WireProduct) -> Self {
        Self {
            name: p.name,
            version: p.version,
        }
    }
}

impl From<Option<WireAlert>> for Alert {
    fn from(alert: Option<WireAlert>) -> Self {
        let alert = alert.unwrap_or_default();
        let or_default = |s: String| {
            if s.is_empty() {
                DEFAULT_ALERT_DURATION.to_string()
            } else {
                s
            }
        };
        Self {
            for_duration: or_default(alert.for_duration),
            step: or_default(alert.step),
        }
    }
}

impl From<WirePresentation> for Presentation {
    fn from(p: WirePresentation) -> Self {
        Self {
            chart_type: p.chart_type,
            current_value: p.current_value,
            frequency: p.frequency,
            labels: p.labels,
            units: p.units,
        }
    }
}

/// Reads the declared `apiVersion` of a parsed YAML tree.
pub(crate) fn declared_api_version(tree: &Value) -> ApiVersion {
    ApiVersion::for_document(&member_string(tree, "apiVersion").unwrap_or_default())
}

/// Parses a YAML byte stream into a tree, requiring a top-level mapping.
///
/// Scalars keep their source spelling where resolution would change it, so a
/// `version: 1.10` reads as `"1.10"`.
pub(crate) fn parse_tree(bytes: &[u8]) -> Result<Value> {
    let tree = parse_spelled(bytes)
        .map_err(|e| DocumentError::Structural(format!("could not parse document: {e}")))?;

    if !tree.is_mapping() {
        return Err(DocumentError::Structural(
            "document must be a YAML mapping".to_string(),
        ));
    }

    Ok(tree)
}

/// Parses and validates an indicator document.
///
/// # Errors
///
/// Returns [`DocumentError::Structural`] if the bytes are not a document of
/// the declared schema, or [`DocumentError::Invalid`] with every validation
/// failure if required fields are missing.
pub fn document_from_yaml(bytes: &[u8]) -> Result<Document> {
    let tree = parse_tree(bytes)?;
    let document = document_from_tree(tree)?;

    let errors = document.validate();
    if !errors.is_empty() {
        debug!(errors = errors.len(), "document failed validation");
        return Err(DocumentError::Invalid { errors });
    }

    Ok(document)
}

/// Normalizes a parsed tree into a default-filled, unvalidated document.
pub(crate) fn document_from_tree(tree: Value) -> Result<Document> {
    match declared_api_version(&tree) {
        ApiVersion::V0 => {
            let wire: V0Document = serde_yaml::from_value(tree)
                .map_err(|e| DocumentError::Structural(format!("could not unmarshal document: {e}")))?;
            from_v0(wire)
        }
        ApiVersion::V1 => {
            let wire: V1Document = serde_yaml::from_value(tree)
                .map_err(|e| DocumentError::Structural(format!("could not unmarshal document: {e}")))?;
            Ok(from_v1(wire))
        }
    }
}

fn from_v0(wire: V0Document) -> Result<Document> {
    let indicators = wire
        .indicators
        .into_iter()
        .enumerate()
        .map(|(idx, indicator)| {
            let thresholds = indicator
                .thresholds
                .iter()
                .enumerate()
                .map(|(t_idx, threshold)| {
                    v0_threshold(threshold).map_err(|reason| {
                        DocumentError::Structural(format!(
                            "indicators[{idx}] thresholds[{t_idx}]: {reason}"
                        ))
                    })
                })
                .collect::<Result<Vec<_>>>()?;

            Ok(Indicator {
                name: indicator.name,
                promql: indicator.promql,
                thresholds,
                alert: indicator.alert.into(),
                presentation: Some(
                    indicator
                        .presentation
                        .map_or_else(Presentation::step_chart, Presentation::from),
                ),
                documentation: indicator.documentation,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let layout = wire
        .layout
        .unwrap_or_else(|| Layout::single_section(&indicators));

    Ok(Document {
        api_version: ApiVersion::V0,
        product: wire.product.into(),
        metadata: wire.metadata,
        indicators,
        layout,
    })
}

fn from_v1(wire: V1Document) -> Document {
    let indicators: Vec<Indicator> = wire
        .spec
        .indicators
        .into_iter()
        .map(|indicator| Indicator {
            name: indicator.name,
            promql: indicator.promql,
            thresholds: indicator.thresholds.into_iter().map(Threshold::from).collect(),
            alert: indicator.alert.into(),
            presentation: indicator.presentation.map(Presentation::from),
            documentation: indicator.documentation,
        })
        .collect();

    let layout = wire
        .spec
        .layout
        .unwrap_or_else(|| Layout::single_section(&indicators));

    Document {
        api_version: ApiVersion::V1,
        product: wire.spec.product.into(),
        metadata: wire.metadata.labels,
        indicators,
        layout,
    }
}

/// Reads a legacy threshold, where the operator is the key: `{level, gte: 50}`.
fn v0_threshold(mapping: &serde_yaml::Mapping) -> std::result::Result<Threshold, String> {
    let level = mapping
        .get("level")
        .and_then(scalar_string)
        .unwrap_or_default();

    let (operator, value) = ThresholdOperator::ALL
        .into_iter()
        .find_map(|op| mapping.get(op.as_str()).map(|v| (op, v)))
        .ok_or_else(|| "missing threshold operator".to_string())?;

    let value = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s
            .trim()
            .parse()
            .ok()
            .or_else(|| serde_yaml::from_str::<Value>(s).ok()?.as_f64()),
        _ => None,
    }
    .ok_or_else(|| format!("threshold value for '{}' must be numeric", operator.as_str()))?;

    Ok(Threshold::new(level, operator, value))
}
