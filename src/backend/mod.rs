//! Registry backends.
//!
//! This module provides:
//! - The `RegistryClient` seam every resolver and dataset talks through
//! - An MLflow REST implementation (`rest`)
//! - An in-process implementation with the same semantics (`memory`)

pub mod memory;
pub mod rest;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use thiserror::Error;

use crate::model::locator::Stage;
use crate::model::registry::{Experiment, ModelVersion, RunInfo};

pub use memory::MemoryRegistry;
pub use rest::RestRegistry;

/// Errors raised by a registry backend.
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Registry returned {status}: {code}: {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid registry response: {0}")]
    InvalidResponse(String),

    #[error("Unsupported artifact location: {0}")]
    UnsupportedArtifactStore(String),

    #[error("Integrity check failed for {name}/{version}: expected {expected}, got {actual}")]
    Integrity {
        name: String,
        version: String,
        expected: String,
        actual: String,
    },
}

pub type Result<T> = std::result::Result<T, RegistryError>;

/// Model payload plus the metadata written next to it.
#[derive(Debug, Clone)]
pub struct ModelUpload {
    /// Artifact path inside the run, also the registered model name
    pub artifact_path: String,
    pub registered_name: String,
    pub payload: Vec<u8>,
    /// Rendered `MLmodel` document
    pub metadata: String,
    pub input_example: Option<serde_json::Value>,
}

/// Operations the resolver and dataset need from a model registry.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait RegistryClient: Send + Sync {
    /// All versions of `name`, in the registry's own order.
    async fn search_model_versions(&self, name: &str) -> Result<Vec<ModelVersion>>;

    /// Latest version of `name` per requested stage.
    async fn get_latest_versions(&self, name: &str, stages: &[Stage]) -> Result<Vec<ModelVersion>>;

    /// Look up an experiment by name, creating it when absent.
    async fn get_or_create_experiment(&self, name: &str) -> Result<Experiment>;

    async fn create_run(&self, experiment_id: &str) -> Result<RunInfo>;

    /// Mark a run finished.
    async fn finish_run(&self, run_id: &str) -> Result<()>;

    async fn log_param(&self, run_id: &str, key: &str, value: &str) -> Result<()>;

    /// Store `contents` at `path` relative to the run's artifact root.
    async fn log_artifact(&self, run: &RunInfo, path: &str, contents: &[u8]) -> Result<()>;

    /// Upload a model under the run and register a new version of it.
    async fn create_model_version(&self, run: &RunInfo, upload: ModelUpload) -> Result<ModelVersion>;

    /// Fetch the payload registered as `name`/`version`.
    async fn download_model(&self, name: &str, version: &str) -> Result<Vec<u8>>;
}
