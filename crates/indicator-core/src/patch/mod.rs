//! Selector-addressed patches for indicator documents.
//!
//! A [`Patch`] carries match criteria and an ordered list of operations.
//! Operations address the raw document tree with an extended pointer path
//! (see [`pointer`]) and are applied one at a time, so a failing operation
//! never prevents the rest from being attempted (see [`apply`]).
//!
//! Patch files are YAML:
//!
//! ```yaml
//! apiVersion: indicatorprotocol.io/v1
//! match:
//!   product:
//!     name: my-product
//!     version: 1.2.3
//!   metadata:
//!     deployment: my-deployment
//! operations:
//! - type: replace
//!   path: /spec/indicators/name=latency/thresholds?/-
//!   value:
//!     level: critical
//!     operator: gt
//!     value: 500
//! ```

pub mod apply;
pub mod pointer;

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use tracing::debug;

use crate::document::ApiVersion;
use crate::error::PatchError;
use crate::yaml::{deserialize_optional_scalar, deserialize_scalar_map, parse_spelled_stream};

pub use apply::{
    apply_patches, apply_patches_with_report, match_document, process_document, PatchReport,
    ProcessedDocument,
};
pub use pointer::{Pointer, Segment};

/// The kind of a patch operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationType {
    /// Set or overwrite the addressed value, or append for a trailing `-`.
    Replace,
    /// Delete the addressed map key or sequence element.
    Remove,
    /// Documentation only; always skipped.
    Test,
}

/// A single operation within a patch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchOperation {
    /// What to do.
    #[serde(rename = "type")]
    pub op: OperationType,
    /// Extended pointer path of the target.
    pub path: String,
    /// New value for `replace`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl PatchOperation {
    /// Creates a `replace` operation.
    pub fn replace(path: impl Into<String>, value: Value) -> Self {
        Self {
            op: OperationType::Replace,
            path: path.into(),
            value: Some(value),
        }
    }

    /// Creates a `remove` operation.
    pub fn remove(path: impl Into<String>) -> Self {
        Self {
            op: OperationType::Remove,
            path: path.into(),
            value: None,
        }
    }

    /// Creates a `test` operation.
    pub fn test(path: impl Into<String>, value: Option<Value>) -> Self {
        Self {
            op: OperationType::Test,
            path: path.into(),
            value,
        }
    }
}

/// Criteria deciding which documents a patch applies to.
///
/// Unset fields impose no constraint. Metadata is a subset match: the
/// document may carry additional keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "WireMatch", into = "WireMatch")]
pub struct Match {
    /// Required product name.
    pub name: Option<String>,
    /// Required product version.
    pub version: Option<String>,
    /// Required metadata entries.
    pub metadata: BTreeMap<String, String>,
}

impl Match {
    /// Checks the criteria against a document's identity.
    #[must_use]
    pub fn matches(
        &self,
        product_name: &str,
        product_version: &str,
        metadata: &BTreeMap<String, String>,
    ) -> bool {
        self.name.as_deref().is_none_or(|name| name == product_name)
            && self
                .version
                .as_deref()
                .is_none_or(|version| version == product_version)
            && self
                .metadata
                .iter()
                .all(|(key, value)| metadata.get(key) == Some(value))
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct WireMatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    product: Option<WireMatchProduct>,
    #[serde(
        default,
        deserialize_with = "deserialize_scalar_map",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    metadata: BTreeMap<String, String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct WireMatchProduct {
    #[serde(
        default,
        deserialize_with = "deserialize_optional_scalar",
        skip_serializing_if = "Option::is_none"
    )]
    name: Option<String>,
    #[serde(
        default,
        deserialize_with = "deserialize_optional_scalar",
        skip_serializing_if = "Option::is_none"
    )]
    version: Option<String>,
}

impl From<WireMatch> for Match {
    fn from(wire: WireMatch) -> Self {
        let product = wire.product.unwrap_or_default();
        Self {
            name: product.name,
            version: product.version,
            metadata: wire.metadata,
        }
    }
}

impl From<Match> for WireMatch {
    fn from(m: Match) -> Self {
        let product = (m.name.is_some() || m.version.is_some()).then_some(WireMatchProduct {
            name: m.name,
            version: m.version,
        });
        Self {
            product,
            metadata: m.metadata,
        }
    }
}

/// A versioned, match-scoped set of operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Patch {
    /// Schema of the documents this patch targets. `v0/patch` reads as `v0`.
    pub api_version: ApiVersion,
    /// Which documents the patch applies to.
    #[serde(rename = "match", default)]
    pub criteria: Match,
    /// Operations, applied in order.
    #[serde(default)]
    pub operations: Vec<PatchOperation>,
}

impl Patch {
    /// Creates a patch with no operations.
    #[must_use]
    pub fn new(api_version: ApiVersion, criteria: Match) -> Self {
        Self {
            api_version,
            criteria,
            operations: Vec::new(),
        }
    }

    /// Appends an operation.
    #[must_use]
    pub fn with_operation(mut self, operation: PatchOperation) -> Self {
        self.operations.push(operation);
        self
    }
}

/// Reads every patch in a (possibly multi-document) YAML stream.
///
/// Empty documents in the stream are skipped.
///
/// # Errors
///
/// Returns [`PatchError::InvalidPatch`] if any document is not a patch.
pub fn read_patches(bytes: &[u8]) -> Result<Vec<Patch>, PatchError> {
    let mut patches = Vec::new();

    for (idx, document) in parse_spelled_stream(bytes).enumerate() {
        let value =
            document.map_err(|e| PatchError::InvalidPatch(format!("document {idx}: {e}")))?;
        if value.is_null() {
            continue;
        }
        let patch = serde_yaml::from_value(value)
            .map_err(|e| PatchError::InvalidPatch(format!("document {idx}: {e}")))?;
        patches.push(patch);
    }

    Ok(patches)
}

/// Reads the patches in a single YAML file.
///
/// # Errors
///
/// Returns [`PatchError::Io`] if the file cannot be read, or
/// [`PatchError::InvalidPatch`] if it does not contain patches.
pub fn read_patch_file(path: &Path) -> Result<Vec<Patch>, PatchError> {
    let bytes = fs::read(path).map_err(|source| PatchError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let patches = read_patches(&bytes).map_err(|e| match e {
        PatchError::InvalidPatch(reason) => {
            PatchError::InvalidPatch(format!("{}: {reason}", path.display()))
        }
        other => other,
    })?;

    debug!(path = %path.display(), count = patches.len(), "read patch file");
    Ok(patches)
}

/// Reads the patches from every `.yml`/`.yaml` file directly inside `dir`,
/// in file name order.
///
/// # Errors
///
/// Returns the first error encountered reading the directory or a file.
pub fn read_patch_dir(dir: &Path) -> Result<Vec<Patch>, PatchError> {
    let io_err = |source| PatchError::Io {
        path: dir.display().to_string(),
        source,
    };

    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .map_err(io_err)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<_, _>>()
        .map_err(io_err)?;
    files.retain(|p| {
        p.is_file()
            && p
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext == "yml" || ext == "yaml")
    });
    files.sort();

    let mut patches = Vec::new();
    for file in files {
        patches.extend(read_patch_file(&file)?);
    }
    Ok(patches)
}

/// Reads patches from a list of files and directories, in order.
///
/// # Errors
///
/// Returns the first error encountered.
pub fn load_patches<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<Patch>, PatchError> {
    let mut patches = Vec::new();
    for path in paths {
        let path = path.as_ref();
        if path.is_dir() {
            patches.extend(read_patch_dir(path)?);
        } else {
            patches.extend(read_patch_file(path)?);
        }
    }
    Ok(patches)
}
