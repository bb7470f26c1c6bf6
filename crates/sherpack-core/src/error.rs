//! Core error types

use thiserror::Error;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum CoreError {
    #[error("Pack not found: {path}")]
    PackNotFound { path: String },

    #[error("Invalid Pack.yaml: {message}")]
    InvalidPack { message: String },

    #[error("Failed to parse Pack.yaml: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid version: {0}")]
    InvalidVersion(#[from] semver::Error),

    #[error("Values merge error: {message}")]
    ValuesMerge { message: String },

    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid manifest: {message}")]
    InvalidManifest { message: String },

    #[error("Archive error: {message}")]
    Archive { message: String },

    #[error("File access error for '{path}': {message}")]
    FileAccess { path: String, message: String },

    #[error("Invalid glob pattern: {message}")]
    GlobPattern { message: String },

    #[error("Invalid schema: {message}")]
    InvalidSchema { message: String },
}

pub type Result<T> = std::result::Result<T, CoreError>;

/// Detail of a single values validation failure, reported against a JSON Pointer path.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ValidationErrorInfo {
    /// JSON Pointer to the offending value (e.g. "/replicaCount")
    pub path: String,
    /// Human-readable description of the failure
    pub message: String,
}
