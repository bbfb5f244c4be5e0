//! Writing canonical documents back to their wire schema.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::document::{
    Alert, ApiVersion, Document, Indicator, Layout, Presentation, Product, Threshold,
};
use crate::error::{DocumentError, Result};

/// `kind` written on current-schema documents.
pub const DOCUMENT_KIND: &str = "IndicatorDocument";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct V0Out<'a> {
    api_version: &'static str,
    product: &'a Product,
    metadata: &'a BTreeMap<String, String>,
    indicators: Vec<IndicatorOut<'a, V0ThresholdOut<'a>>>,
    layout: &'a Layout,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct V1Out<'a> {
    api_version: &'static str,
    kind: &'static str,
    metadata: V1MetadataOut<'a>,
    spec: V1SpecOut<'a>,
}

#[derive(Serialize)]
struct V1MetadataOut<'a> {
    labels: &'a BTreeMap<String, String>,
}

#[derive(Serialize)]
struct V1SpecOut<'a> {
    product: &'a Product,
    indicators: Vec<IndicatorOut<'a, &'a Threshold>>,
    layout: &'a Layout,
}

#[derive(Serialize)]
struct IndicatorOut<'a, T> {
    name: &'a str,
    promql: String,
    thresholds: Vec<T>,
    alert: &'a Alert,
    #[serde(skip_serializing_if = "Option::is_none")]
    presentation: Option<&'a Presentation>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    documentation: &'a BTreeMap<String, String>,
}

/// Legacy threshold shape, with the operator as the key: `{level, gte: 50}`.
#[derive(Serialize)]
struct V0ThresholdOut<'a> {
    level: &'a str,
    #[serde(flatten)]
    comparison: BTreeMap<&'static str, f64>,
}

impl<'a> From<&'a Threshold> for V0ThresholdOut<'a> {
    fn from(t: &'a Threshold) -> Self {
        Self {
            level: &t.level,
            comparison: BTreeMap::from([(t.operator.as_str(), t.value)]),
        }
    }
}

impl<'a, T> IndicatorOut<'a, T> {
    fn new(indicator: &'a Indicator, thresholds: Vec<T>) -> Self {
        Self {
            name: &indicator.name,
            promql: render_promql(&indicator.promql),
            thresholds,
            alert: &indicator.alert,
            presentation: indicator.presentation.as_ref(),
            documentation: &indicator.documentation,
        }
    }
}

/// Collapses the doubled percent signs left behind by template escaping.
#[must_use]
pub fn render_promql(promql: &str) -> String {
    promql.replace("%%", "%")
}

/// Serializes a document in the wire schema of its own `api_version`.
///
/// `PromQL` expressions are written with doubled percent signs collapsed.
///
/// # Errors
///
/// Returns [`DocumentError::Serialization`] if YAML encoding fails.
pub fn document_to_yaml(document: &Document) -> Result<String> {
    let encoded = match document.api_version {
        ApiVersion::V0 => serde_yaml::to_string(&V0Out {
            api_version: ApiVersion::V0_NAME,
            product: &document.product,
            metadata: &document.metadata,
            indicators: document
                .indicators
                .iter()
                .map(|i| IndicatorOut::new(i, i.thresholds.iter().map(V0ThresholdOut::from).collect()))
                .collect(),
            layout: &document.layout,
        }),
        ApiVersion::V1 => serde_yaml::to_string(&V1Out {
            api_version: ApiVersion::V1_NAME,
            kind: DOCUMENT_KIND,
            metadata: V1MetadataOut {
                labels: &document.metadata,
            },
            spec: V1SpecOut {
                product: &document.product,
                indicators: document
                    .indicators
                    .iter()
                    .map(|i| IndicatorOut::new(i, i.thresholds.iter().collect()))
                    .collect(),
                layout: &document.layout,
            },
        }),
    };

    encoded.map_err(|e| DocumentError::Serialization(e.to_string()))
}
