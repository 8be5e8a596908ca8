//! Error types for metasync-core.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using metasync-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during mapping, synchronization and verification.
#[derive(Error, Debug)]
pub enum Error {
    /// An element path could not be resolved.
    #[error("Element not found: {path} in {}", file.display())]
    NotFound { file: PathBuf, path: String },

    /// A path segment exists but has the wrong structural shape.
    #[error("Structural mismatch at '{segment}' of {path}: {reason}")]
    StructuralMismatch {
        path: String,
        segment: String,
        reason: String,
    },

    /// Source and target values infer to different datatypes.
    #[error("Datatype mismatch: source '{source_value}' is {source_type}, target '{target_value}' is {target_type}")]
    TypeMismatch {
        source_value: String,
        source_type: String,
        target_value: String,
        target_type: String,
    },

    /// Source and target units disagree.
    #[error("Unit mismatch: source unit '{source_unit}' vs target unit '{target_unit}'")]
    UnitMismatch {
        source_unit: String,
        target_unit: String,
    },

    /// A value that must be present is empty.
    #[error("Empty value for element {element_path}")]
    EmptyValue { element_path: String },

    /// A file required by the operation does not exist.
    #[error("File not found: {}", path.display())]
    MissingFile { path: PathBuf },

    /// An annotated-source tag expected to exist was not found.
    #[error("No @metadata tag with path '{path}' in {}", file.display())]
    TagNotFound { file: PathBuf, path: String },

    /// The two sides of a mapping have unsupported formats.
    #[error("Invalid mapping: {0}")]
    InvalidMapping(String),

    /// A positional index could not be pinned down unambiguously.
    #[error("Ambiguous index for {path}: value '{value}' occurs at positions {positions:?}")]
    AmbiguousIndex {
        path: String,
        value: String,
        positions: Vec<usize>,
    },

    /// A constraint definition is missing.
    #[error("Constraint definition '{0}' not found")]
    ConstraintNotFound(String),

    /// A constraint definition has no usage.
    #[error("No usage of constraint '{0}' found")]
    ConstraintUsageNotFound(String),

    /// A reference inside a constraint could not be resolved to a value.
    #[error("Unresolved reference '{reference}': {reason}")]
    UnresolvedReference { reference: String, reason: String },

    /// Malformed input that the recognizers cannot handle.
    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    /// Filesystem error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Version control collaborator failed
    #[error("Version control error: {0}")]
    VersionControl(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a not-found error.
    pub fn not_found(file: impl Into<PathBuf>, path: impl Into<String>) -> Self {
        Self::NotFound {
            file: file.into(),
            path: path.into(),
        }
    }

    /// Create a structural mismatch error.
    pub fn structural(
        path: impl Into<String>,
        segment: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::StructuralMismatch {
            path: path.into(),
            segment: segment.into(),
            reason: reason.into(),
        }
    }

    /// Create a missing-file error.
    pub fn missing_file(path: impl Into<PathBuf>) -> Self {
        Self::MissingFile { path: path.into() }
    }

    /// Create a parse error.
    pub fn parse(line: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            line,
            message: message.into(),
        }
    }

    /// Create an unresolved reference error.
    pub fn unresolved(reference: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UnresolvedReference {
            reference: reference.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error only concerns a single file or element, so a batch
    /// operation can skip it and continue.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. }
                | Self::StructuralMismatch { .. }
                | Self::MissingFile { .. }
                | Self::TagNotFound { .. }
                | Self::AmbiguousIndex { .. }
                | Self::Parse { .. }
                | Self::Io(_)
                | Self::Serialization(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = Error::UnitMismatch {
            source_unit: "mm".to_string(),
            target_unit: "cm".to_string(),
        };
        assert!(err.to_string().contains("Unit mismatch"));
        assert!(!err.is_recoverable());
    }
}
