//! Error types for schema loading, model loading and prediction.

use std::path::PathBuf;

/// Failure to parse or derive an attribute schema.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("line {line}: {reason}")]
    Malformed { line: usize, reason: String },

    #[error("schema has no @relation declaration")]
    MissingRelation,

    #[error("attribute '{0}' not found in schema")]
    MissingAttribute(String),

    #[error("attribute '{0}' is declared more than once")]
    DuplicateAttribute(String),

    #[error("label attribute '{0}' must be nominal")]
    LabelNotNominal(String),
}

/// Failure to load a classifier artifact.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("failed to open model file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode model file {path:?}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: rmp_serde::decode::Error,
    },

    #[error("failed to encode model: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    /// The artifact was fitted against a different attribute layout.
    #[error("model {path:?} does not match the {target} schema: {detail}")]
    SchemaMismatch {
        path: PathBuf,
        target: &'static str,
        detail: String,
    },

    #[error("invalid model: {0}")]
    Invalid(String),
}

/// Failure raised by a classifier while predicting a single instance.
#[derive(Debug, thiserror::Error)]
pub enum ClassifierError {
    #[error("expected {expected} features, instance has {actual}")]
    Shape { expected: usize, actual: usize },

    #[error("prediction failed: {0}")]
    Prediction(String),
}

/// Outcome of a rejected or failed `classify` call.
#[derive(Debug, thiserror::Error)]
pub enum PredictError {
    /// Caller sent the wrong number of feature values.
    #[error("expected {expected} feature values, got {actual}")]
    Arity { expected: usize, actual: usize },

    /// Caller sent a value that is neither a placeholder nor a number.
    #[error("feature {position} is not a number: {value:?}")]
    InvalidNumber { position: usize, value: String },

    /// The classifier itself failed; not the caller's fault.
    #[error("{label} classifier failed: {source}")]
    Classifier {
        label: &'static str,
        #[source]
        source: ClassifierError,
    },
}

impl PredictError {
    /// Whether the error was caused by the request contents.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Arity { .. } | Self::InvalidNumber { .. })
    }
}

/// Failure to read the server configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file not found: {0:?}")]
    NotFound(PathBuf),

    #[error("failed to read config file {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid address '{address}': {reason}")]
    Address { address: String, reason: String },

    #[error("invalid serving mode: {0}")]
    Mode(String),
}
