//! Core error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Bundle not found: {path}")]
    BundleNotFound { path: String },

    #[error("Invalid bundle: {message}")]
    InvalidBundle { message: String },

    #[error("Invalid schema: {message}")]
    InvalidSchema { message: String },

    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid version: {0}")]
    InvalidVersion(#[from] semver::Error),

    #[error("Invalid value override: {message}")]
    InvalidOverride { message: String },
}

/// A single values-schema violation
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationErrorInfo {
    /// JSON pointer to the offending value, or `(root)`
    pub path: String,
    pub message: String,
}

pub type Result<T> = std::result::Result<T, CoreError>;
