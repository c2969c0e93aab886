//! Run provenance recorded alongside saved models.

pub mod catalog;
pub mod snapshot;

pub use catalog::{CatalogEntry, CatalogError, DataCatalog, Node, Pipeline, Versioning};
pub use snapshot::{sanitize_param, DatasetVersion, ProvenanceSnapshot, RunContext};
