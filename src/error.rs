//! Error types for the model registry dataset.

use thiserror::Error;

/// Crate error type.
#[derive(Error, Debug)]
pub enum Error {
    /// Locator URI does not match `models:/<name>[/<version-or-stage>]`
    #[error("Malformed model URI: {0}")]
    MalformedUri(String),

    /// Stage token not one of Production, Staging, Archived
    #[error("Unknown stage: {0}")]
    UnknownStage(String),

    /// No version of the model is assigned the requested stage
    #[error("No version of model '{name}' is in stage {stage}")]
    NoVersionForStage {
        name: String,
        stage: crate::model::locator::Stage,
    },

    /// Model has no registered versions at all
    #[error("Model '{0}' has no registered versions")]
    NoVersions(String),

    /// Registered version could not be fetched
    #[error("Model '{name}' version '{version}' could not be fetched: {reason}")]
    ArtifactNotFound {
        name: String,
        version: String,
        reason: String,
    },

    /// Signature spec rejected at construction
    #[error("Invalid signature: {0}")]
    InvalidSignature(#[from] crate::signature::SignatureError),

    /// Environment tag with no stage mapping
    #[error("Environment '{0}' does not map to a stage")]
    UnknownEnvironment(String),

    /// Invalid dataset configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Registry backend error
    #[error("Registry error: {0}")]
    Registry(#[from] crate::backend::RegistryError),

    /// Data catalog error
    #[error("Catalog error: {0}")]
    Catalog(#[from] crate::provenance::catalog::CatalogError),

    /// YAML serialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for dataset operations.
pub type Result<T> = std::result::Result<T, Error>;
