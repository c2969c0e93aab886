//! mlflow-dataset - model registry dataset for pipeline runs.
//!
//! Resolves `models:/` locators against a model registry, saves models with
//! a provenance snapshot of the producing run, and loads them back by
//! version, stage-mapped environment, or latest.

mod defaults;
pub mod error;

pub mod backend;
pub mod config;
pub mod dataset;
pub mod model;
pub mod provenance;
pub mod signature;
pub mod tracking;

pub use error::{Error, Result};

pub use backend::{MemoryRegistry, ModelUpload, RegistryClient, RegistryError, RestRegistry};
pub use config::DataSetConfig;
pub use dataset::{LoadedModel, MlflowDataSet};

pub use model::{
    Experiment, ModelLocator, ModelMetadata, ModelResolver, ModelVersion, ModelVersionStatus,
    ResolvedReference, RunInfo, Stage,
};
pub use provenance::{
    sanitize_param, CatalogEntry, CatalogError, DataCatalog, DatasetVersion, Node, Pipeline,
    ProvenanceSnapshot, RunContext, Versioning,
};
pub use signature::{ColumnSpec, DataType, ModelSignature, SignatureError};
pub use tracking::{CodeRevision, TrackingSession};

/// Name of the provenance artifact written on every save.
pub const PROVENANCE_ARTIFACT: &str = defaults::PROVENANCE_ARTIFACT;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
