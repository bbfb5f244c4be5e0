//! Error types for the indicator-core crate.

use thiserror::Error;

/// Errors produced while reading, validating or writing indicator documents.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DocumentError {
    /// The input could not be parsed as a document at all.
    #[error("{0}")]
    Structural(String),

    /// The document parsed but failed validation.
    #[error("invalid document: {}", errors.join(", "))]
    Invalid {
        /// Every validation failure, in the order it was found.
        errors: Vec<String>,
    },

    /// The document could not be written back to YAML.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl DocumentError {
    /// Returns the human-readable messages carried by this error.
    ///
    /// Validation errors expand to their full list; every other variant
    /// yields a single message.
    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        match self {
            Self::Invalid { errors } => errors.clone(),
            other => vec![other.to_string()],
        }
    }
}

/// Errors produced by the patch engine.
#[derive(Debug, Error)]
pub enum PatchError {
    /// The raw document is not a structural YAML document.
    #[error("could not read document: {0}")]
    Structural(String),

    /// A path segment could not be resolved against the document tree.
    #[error("could not resolve path '{path}': {reason}")]
    Resolution {
        /// The full operation path.
        path: String,
        /// Which segment failed and why.
        reason: String,
    },

    /// A `replace` operation carried no value.
    #[error("replace at '{path}' requires a value")]
    MissingValue {
        /// The full operation path.
        path: String,
    },

    /// The operation path is syntactically invalid.
    #[error("invalid path '{path}': {reason}")]
    InvalidPath {
        /// The offending path.
        path: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A patch definition could not be parsed.
    #[error("invalid patch definition: {0}")]
    InvalidPatch(String),

    /// A patch file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// The file or directory being read.
        path: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

impl From<serde_yaml::Error> for DocumentError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Structural(err.to_string())
    }
}

/// Result type for document operations.
pub type Result<T> = std::result::Result<T, DocumentError>;
