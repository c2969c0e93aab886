//! Model reference resolution.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::backend::{RegistryClient, RegistryError};
use crate::defaults;
use crate::error::{Error, Result};
use crate::model::locator::{ModelLocator, Stage};

/// A locator pinned to one concrete registered version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedReference {
    pub protocol: String,
    pub name: String,
    pub version: String,
}

impl ResolvedReference {
    pub(crate) fn new(name: &str, version: String) -> Self {
        Self {
            protocol: defaults::PROTOCOL.to_string(),
            name: name.to_string(),
            version,
        }
    }
}

impl fmt::Display for ResolvedReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:/{}/{}", self.protocol, self.name, self.version)
    }
}

/// Resolves model locators to concrete versions against a registry.
#[derive(Clone)]
pub struct ModelResolver {
    registry: Arc<dyn RegistryClient>,
}

impl ModelResolver {
    pub fn new(registry: Arc<dyn RegistryClient>) -> Self {
        Self { registry }
    }

    /// Resolve a `models:/` URI.
    ///
    /// # Arguments
    /// * `uri` - Locator, which can be:
    ///   - `models:/<name>`: latest version in registry order
    ///   - `models:/<name>/<stage>`: latest version holding Production, Staging or Archived
    ///   - `models:/<name>/<version>`: returned as is, not checked against the registry
    pub async fn resolve_uri(&self, uri: &str) -> Result<ResolvedReference> {
        let locator = ModelLocator::parse(uri)?;
        self.resolve(&locator).await
    }

    /// Resolve an already parsed locator.
    pub async fn resolve(&self, locator: &ModelLocator) -> Result<ResolvedReference> {
        let name = locator.name();

        if let Some(stage) = locator.stage() {
            let version = self.stage_version(name, stage).await?;
            return Ok(ResolvedReference::new(name, version));
        }

        if let Some(version) = locator.version() {
            return Ok(ResolvedReference::new(name, version.to_string()));
        }

        let version = self.latest_version(name).await?;
        Ok(ResolvedReference::new(name, version))
    }

    /// Last version the registry returns for `name`.
    pub async fn latest_version(&self, name: &str) -> Result<String> {
        let versions = self.registry.search_model_versions(name).await?;
        versions
            .last()
            .map(|v| v.version.clone())
            .ok_or_else(|| Error::NoVersions(name.to_string()))
    }

    /// Version currently holding `stage`.
    pub async fn stage_version(&self, name: &str, stage: Stage) -> Result<String> {
        let no_version = || Error::NoVersionForStage {
            name: name.to_string(),
            stage,
        };

        let versions = match self.registry.get_latest_versions(name, &[stage]).await {
            Ok(versions) => versions,
            // An unregistered model has no version in any stage.
            Err(RegistryError::NotFound(_)) => return Err(no_version()),
            Err(e) => return Err(e.into()),
        };
        versions
            .into_iter()
            .next()
            .map(|v| v.version)
            .ok_or_else(no_version)
    }
}
