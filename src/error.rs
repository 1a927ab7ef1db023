//! Error taxonomy for the detection core.
//!
//! Configuration errors are fatal at session construction. Schema and
//! inference errors are scoped to a single sample, so a batch keeps going.

use crate::model::ModelKind;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DetectError {
    /// A required artifact is missing or malformed, or the config is invalid.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Artifact on disk does not match its configured SHA-256. Always fatal,
    /// including for the optional autoencoder.
    #[error("checksum mismatch for {}: expected {expected}, got {actual}", path.display())]
    ChecksumMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("feature schema error: {0}")]
    FeatureSchema(#[from] FeatureSchemaError),

    /// A loaded model failed while scoring one sample.
    #[error("{model} inference failed: {reason}")]
    Inference { model: ModelKind, reason: String },
}

impl DetectError {
    pub fn config(msg: impl Into<String>) -> Self {
        DetectError::Configuration(msg.into())
    }

    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            DetectError::Configuration(_) | DetectError::ChecksumMismatch { .. }
        )
    }
}

/// Structural problem with an input sample that zero-fill cannot cover.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FeatureSchemaError {
    #[error("sample is not a JSON object")]
    NotAnObject,

    #[error("sample is not valid JSON: {0}")]
    Malformed(String),

    #[error("field `{field}` is not numeric (got {found})")]
    NonNumeric { field: String, found: String },

    #[error("field `{field}` is NaN")]
    NotANumber { field: String },

    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("invalid source port: {0}")]
    InvalidPort(String),
}

pub type Result<T> = std::result::Result<T, DetectError>;
