//! Matching patches to raw documents and applying their operations.

use std::collections::BTreeMap;

use serde_yaml::Value;
use tracing::{debug, warn};

use super::pointer::Pointer;
use super::{OperationType, Patch, PatchOperation};
use crate::document::{ApiVersion, Document};
use crate::error::{DocumentError, PatchError};
use crate::parse::{declared_api_version, document_from_yaml, parse_tree};
use crate::yaml::{member, member_string, string_map};

/// The parts of a raw document that patch criteria are checked against.
#[derive(Debug, Clone, PartialEq, Eq)]
struct DocumentIdentity {
    api_version: ApiVersion,
    name: String,
    version: String,
    metadata: BTreeMap<String, String>,
}

impl DocumentIdentity {
    fn from_tree(tree: &Value) -> Self {
        let api_version = declared_api_version(tree);
        let (product, metadata) = match api_version {
            ApiVersion::V0 => (member(tree, "product"), member(tree, "metadata")),
            ApiVersion::V1 => (
                member(tree, "spec").and_then(|spec| member(spec, "product")),
                member(tree, "metadata").and_then(|meta| member(meta, "labels")),
            ),
        };

        Self {
            api_version,
            name: product
                .and_then(|p| member_string(p, "name"))
                .unwrap_or_default(),
            version: product
                .and_then(|p| member_string(p, "version"))
                .unwrap_or_default(),
            metadata: string_map(metadata),
        }
    }

    fn admits(&self, patch: &Patch) -> bool {
        patch.api_version == self.api_version
            && patch
                .criteria
                .matches(&self.name, &self.version, &self.metadata)
    }
}

/// Reports whether `patch` applies to the raw document.
///
/// Bytes that are not a YAML mapping never match.
#[must_use]
pub fn match_document(patch: &Patch, raw: &[u8]) -> bool {
    parse_tree(raw)
        .map(|tree| DocumentIdentity::from_tree(&tree).admits(patch))
        .unwrap_or(false)
}

/// Outcome of applying a batch of patches.
#[derive(Debug)]
pub struct PatchReport {
    /// The patched document. Identical to the input when nothing was applied.
    pub document: Vec<u8>,
    /// Every operation that failed, in application order.
    pub errors: Vec<PatchError>,
    /// Number of operations that changed the tree.
    pub applied: usize,
}

/// Applies every matching patch, in order, and reports per-operation
/// failures alongside the result.
///
/// All patches are matched against the document as it was before any of
/// them ran. Each operation works on a scratch copy of the tree, so a
/// failing operation leaves the document as the previous one left it.
///
/// # Errors
///
/// Returns [`PatchError::Structural`] if `raw` is not a YAML mapping.
pub fn apply_patches_with_report(patches: &[Patch], raw: &[u8]) -> Result<PatchReport, PatchError> {
    let mut tree = parse_tree(raw).map_err(|e| PatchError::Structural(e.to_string()))?;
    let identity = DocumentIdentity::from_tree(&tree);

    let mut errors = Vec::new();
    let mut applied = 0;

    for (idx, patch) in patches.iter().enumerate() {
        if !identity.admits(patch) {
            continue;
        }
        debug!(
            patch = idx,
            product = %identity.name,
            operations = patch.operations.len(),
            "applying patch"
        );

        for operation in &patch.operations {
            match apply_operation(&mut tree, operation) {
                Ok(true) => applied += 1,
                Ok(false) => {}
                Err(err) => errors.push(err),
            }
        }
    }

    let document = if applied == 0 {
        raw.to_vec()
    } else {
        serde_yaml::to_string(&tree)
            .map_err(|e| PatchError::Structural(e.to_string()))?
            .into_bytes()
    };

    Ok(PatchReport {
        document,
        errors,
        applied,
    })
}

/// Applies every matching patch and returns the patched bytes.
///
/// Failing operations are logged and skipped.
///
/// # Errors
///
/// Returns [`PatchError::Structural`] if `raw` is not a YAML mapping.
pub fn apply_patches(patches: &[Patch], raw: &[u8]) -> Result<Vec<u8>, PatchError> {
    let report = apply_patches_with_report(patches, raw)?;
    for err in &report.errors {
        warn!(error = %err, "patch operation skipped");
    }
    Ok(report.document)
}

/// Runs one operation. Returns whether the tree changed.
fn apply_operation(tree: &mut Value, operation: &PatchOperation) -> Result<bool, PatchError> {
    if operation.op == OperationType::Test {
        return Ok(false);
    }

    let pointer: Pointer = operation.path.parse()?;
    let mut scratch = tree.clone();

    match operation.op {
        OperationType::Replace => {
            let value = operation
                .value
                .clone()
                .ok_or_else(|| PatchError::MissingValue {
                    path: operation.path.clone(),
                })?;
            pointer.replace(&mut scratch, value)?;
        }
        OperationType::Remove => pointer.remove(&mut scratch)?,
        OperationType::Test => return Ok(false),
    }

    *tree = scratch;
    Ok(true)
}

/// A parsed document together with every patch problem met on the way.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedDocument {
    /// The validated document.
    pub document: Document,
    /// Operation and post-patch validation errors, as messages.
    pub errors: Vec<String>,
}

/// Applies patches, then parses and validates the result.
///
/// If the patched document does not parse or validate, the document read
/// from the unpatched input is returned instead, with the rejection
/// appended to `errors`. Patch problems never prevent a valid input from
/// being returned.
///
/// # Errors
///
/// Returns the [`DocumentError`] of the unpatched input when it is itself
/// unreadable or invalid.
pub fn process_document(patches: &[Patch], raw: &[u8]) -> Result<ProcessedDocument, DocumentError> {
    let report = match apply_patches_with_report(patches, raw) {
        Ok(report) => report,
        Err(err) => {
            debug!(error = %err, "patching skipped");
            return document_from_yaml(raw).map(|document| ProcessedDocument {
                document,
                errors: vec![err.to_string()],
            });
        }
    };

    let mut errors: Vec<String> = report.errors.iter().map(ToString::to_string).collect();

    match document_from_yaml(&report.document) {
        Ok(document) => Ok(ProcessedDocument { document, errors }),
        Err(err) if report.applied > 0 => {
            warn!(error = %err, "patched document rejected, using unpatched document");
            let document = document_from_yaml(raw)?;
            errors.extend(
                err.messages()
                    .into_iter()
                    .map(|message| format!("patched document rejected: {message}")),
            );
            Ok(ProcessedDocument { document, errors })
        }
        Err(err) => Err(err),
    }
}
