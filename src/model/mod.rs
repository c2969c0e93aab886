//! Model locators, registry records and resolution.

pub mod artifact;
pub mod locator;
pub mod registry;
pub mod resolver;

pub use artifact::ModelMetadata;
pub use locator::{ModelLocator, Stage};
pub use registry::{Experiment, ModelVersion, ModelVersionStatus, RunInfo};
pub use resolver::{ModelResolver, ResolvedReference};
