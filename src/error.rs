//! Error types for schema registration, transform and untransform.

use std::path::PathBuf;

use serde_json::Value;
use thiserror::Error;

/// Errors raised while registering a schema.
#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("invalid schema name: must be a non-empty string")]
    EmptyName,

    #[error("schema '{schema}' declares a relationship with an empty name")]
    EmptyRelationshipName { schema: String },

    #[error("schema '{schema}' declares reserved relationship name '{relationship}'")]
    ReservedRelationshipName {
        schema: String,
        relationship: String,
    },

    #[error("schema '{schema}' declares relationship '{relationship}' more than once")]
    DuplicateRelationship {
        schema: String,
        relationship: String,
    },
}

/// Errors during transform of raw data into a document.
///
/// Every variant carries the raw item being transformed so callers can
/// report which input triggered the failure.
#[derive(Debug, Error)]
pub enum TransformError {
    #[error("missing schema: {name}")]
    MissingSchema { name: String, data: Value },

    #[error("invalid type from schema '{schema}': expected string but is '{actual}'")]
    InvalidType {
        schema: String,
        actual: &'static str,
        value: Value,
        data: Value,
    },

    #[error("invalid id from schema '{schema}': expected string but is '{actual}'")]
    InvalidId {
        schema: String,
        actual: &'static str,
        value: Value,
        data: Value,
    },
}

/// Errors when a document fails the JSON:API structural check.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("invalid JSON:API document: {} violation(s)", errors.len())]
    Invalid { errors: Vec<Violation> },

    #[error("malformed JSON:API document: {source}")]
    Malformed {
        #[source]
        source: serde_json::Error,
    },

    #[error("document validator unavailable: {message}")]
    Validator { message: String },
}

/// Errors during untransform of a document into raw data.
#[derive(Debug, Error)]
pub enum UntransformError {
    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error("missing schema: {name}")]
    MissingSchema { name: String },

    #[error("circular reference at {type_}:{id} (enable remove_circular_dependencies)")]
    CircularReference { type_: String, id: Value },
}

/// Errors loading a JSON input.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("cannot read {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON: {source}")]
    InvalidJson {
        #[source]
        source: serde_json::Error,
    },
}

/// Single structural violation with path context.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Violation {
    /// JSON Pointer (RFC 6901) to the offending value.
    pub path: String,
    /// Human-readable error message.
    pub message: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let path = if self.path.is_empty() { "/" } else { &self.path };
        write!(f, "{}: {}", path, self.message)
    }
}

impl RegistrationError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        2
    }
}

impl TransformError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        2
    }

    /// The raw item that was being transformed when the error occurred.
    pub fn data(&self) -> &Value {
        match self {
            TransformError::MissingSchema { data, .. }
            | TransformError::InvalidType { data, .. }
            | TransformError::InvalidId { data, .. } => data,
        }
    }
}

impl DocumentError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            DocumentError::Invalid { .. } | DocumentError::Malformed { .. } => 1,
            DocumentError::Validator { .. } => 2,
        }
    }
}

impl UntransformError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            UntransformError::Document(e) => e.exit_code(),
            _ => 2,
        }
    }
}

impl LoadError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            LoadError::FileNotFound { .. } | LoadError::ReadError { .. } => 3,
            LoadError::InvalidJson { .. } => 2,
        }
    }
}
