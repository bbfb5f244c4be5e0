//! Indicator document model and patch engine.
//!
//! `indicator-core` reads monitoring indicator documents in either of the two
//! wire schemas (legacy `v0` and `indicatorprotocol.io/v1`), normalizes them
//! into one [`Document`], validates them, and applies selector-addressed
//! [`Patch`]es to the raw YAML before parsing.
//!
//! # Example
//!
//! ```rust
//! use indicator_core::{process_document, read_patches};
//!
//! let document = br"
//! apiVersion: indicatorprotocol.io/v1
//! metadata:
//!   labels:
//!     deployment: redis-abc-123
//! spec:
//!   product:
//!     name: redis-tile
//!     version: 0.11
//!   indicators:
//!   - name: latency
//!     promql: avg(latency)
//!     thresholds:
//!     - level: warning
//!       operator: gt
//!       value: 500
//! ";
//!
//! let patches = read_patches(br"
//! apiVersion: indicatorprotocol.io/v1
//! match:
//!   metadata:
//!     deployment: redis-abc-123
//! operations:
//! - type: replace
//!   path: /spec/indicators/name=latency/thresholds/level=warning/value
//!   value: 800
//! ").unwrap();
//!
//! let processed = process_document(&patches, document).unwrap();
//! assert!(processed.errors.is_empty());
//! assert_eq!(processed.document.indicators[0].thresholds[0].value, 800.0);
//! assert!(processed.document.uid().starts_with("redis-tile-"));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod document;
pub mod error;
pub mod parse;
pub mod patch;
pub mod serialize;
pub mod yaml;

pub use document::{
    Alert, ApiVersion, Document, Indicator, Layout, Presentation, Product, Section, Threshold,
    ThresholdOperator,
};
pub use error::{DocumentError, PatchError, Result};
pub use parse::document_from_yaml;
pub use patch::{
    apply_patches, apply_patches_with_report, load_patches, match_document, process_document,
    read_patch_dir, read_patch_file, read_patches, Match, OperationType, Patch, PatchOperation,
    PatchReport, ProcessedDocument,
};
pub use serialize::document_to_yaml;
