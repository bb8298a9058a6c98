//! Error types for mask parsing, mask application, model composition and loading.

use std::path::PathBuf;
use thiserror::Error;

/// Malformed mask text.
///
/// Offsets are byte offsets into the original mask string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MaskParseError {
    #[error("unexpected opening bracket at offset {offset}")]
    UnexpectedOpeningBracket { offset: usize },

    #[error("unexpected closing bracket at offset {offset}")]
    UnexpectedClosingBracket { offset: usize },

    #[error("unexpected comma at offset {offset}")]
    UnexpectedComma { offset: usize },

    #[error("missing closing bracket")]
    MissingClosingBracket,
}

/// Errors while applying a mask to data or to a model.
#[derive(Debug, Error)]
pub enum MaskError {
    #[error(transparent)]
    Parse(#[from] MaskParseError),

    #[error("mask is inconsistent with model at {path}")]
    Inconsistent { path: String },

    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Errors during model declaration, resolution and schema compilation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    #[error("unknown model '{name}'")]
    UnknownModel { name: String },

    #[error("model '{name}' is already registered")]
    DuplicateModel { name: String },

    #[error("only one discriminator allowed per schema: '{model}' resolves {}", fields.join(", "))]
    DuplicateDiscriminator { model: String, fields: Vec<String> },

    #[error("unable to determine common ancestor for: {}", models.join(", "))]
    AmbiguousAncestor { models: Vec<String> },

    #[error("inheritance cycle through model '{model}'")]
    InheritanceCycle { model: String },
}

/// Errors while loading documents and model declarations.
#[derive(Debug, Error)]
pub enum LoadError {
    // IO errors (exit code 3)
    #[error("file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("cannot read {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[cfg(feature = "remote")]
    #[error("failed to fetch {url}: {source}")]
    NetworkError {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    // Parse errors (exit code 2)
    #[error("invalid JSON: {source}")]
    InvalidJson {
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid declaration at {path}: {message}")]
    InvalidDeclaration { path: String, message: String },

    #[error("invalid mask at {path}: {source}")]
    InvalidMask {
        path: String,
        #[source]
        source: MaskParseError,
    },

    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Errors while marshalling a value against a model.
#[derive(Debug, Error)]
pub enum MarshalError {
    #[error(transparent)]
    Mask(#[from] MaskError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("invalid value at {path}: expected {expected}, got {actual}")]
    InvalidValue {
        path: String,
        expected: &'static str,
        actual: String,
    },

    #[error("unmatched type at {path}: {}", tag.as_deref().unwrap_or("no discriminator value"))]
    UnmatchedType { path: String, tag: Option<String> },
}

/// Errors during validation.
#[derive(Debug, Error)]
pub enum ValidateError {
    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("invalid schema: {message}")]
    InvalidSchema { message: String },

    #[error("validation failed with {} error(s)", errors.len())]
    Invalid { errors: Vec<SchemaError> },
}

/// Single validation error with path context.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SchemaError {
    /// JSON Pointer (RFC 6901) to the invalid field.
    pub path: String,
    /// Human-readable error message.
    pub message: String,
}

impl std::fmt::Display for SchemaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

impl MaskError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        2
    }
}

impl ModelError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        2
    }
}

impl LoadError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            LoadError::FileNotFound { .. } | LoadError::ReadError { .. } => 3,
            #[cfg(feature = "remote")]
            LoadError::NetworkError { .. } => 3,
            _ => 2,
        }
    }
}

impl MarshalError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        2
    }
}

impl ValidateError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            ValidateError::Model(e) => e.exit_code(),
            ValidateError::InvalidSchema { .. } => 2,
            ValidateError::Invalid { .. } => 1,
        }
    }
}

/// Render an internal slash path as a JSON Pointer, using `/` for the root.
pub(crate) fn pointer(path: &str) -> String {
    if path.is_empty() {
        "/".to_string()
    } else {
        path.to_string()
    }
}

/// Append one segment to a slash path, escaping `~` and `/` per RFC 6901.
pub(crate) fn join_pointer(path: &str, segment: &str) -> String {
    format!("{}/{}", path, segment.replace('~', "~0").replace('/', "~1"))
}
