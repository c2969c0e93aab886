//! Registry-backed model dataset.
//!
//! Saving uploads the model into the caller's tracking run and registers a
//! new version, then records the code revision and a provenance snapshot.
//! Loading resolves the configured env, version or latest to one registered
//! version and fetches it.

use std::path::PathBuf;
use std::sync::Arc;

use serde_json::json;

use crate::backend::{ModelUpload, RegistryClient, RestRegistry};
use crate::config::DataSetConfig;
use crate::defaults;
use crate::error::{Error, Result};
use crate::model::artifact::ModelMetadata;
use crate::model::locator::{ModelLocator, Stage};
use crate::model::registry::ModelVersion;
use crate::model::resolver::{ModelResolver, ResolvedReference};
use crate::provenance::{ProvenanceSnapshot, RunContext};
use crate::signature::ModelSignature;
use crate::tracking::{CodeRevision, TrackingSession};

/// A model fetched from the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedModel {
    pub reference: ResolvedReference,
    pub payload: Vec<u8>,
}

/// Saves models to, and loads them from, a model registry.
pub struct MlflowDataSet {
    config: DataSetConfig,
    signature: Option<ModelSignature>,
    env_stage: Option<Stage>,
    registry: Arc<dyn RegistryClient>,
    resolver: ModelResolver,
    workdir: Option<PathBuf>,
}

impl MlflowDataSet {
    /// Create a dataset talking to the configured tracking server.
    pub fn new(config: DataSetConfig) -> Result<Self> {
        let tracking_uri = config.resolved_tracking_uri();
        log::info!("Using tracking server {}", tracking_uri);
        Self::with_registry(config, Arc::new(RestRegistry::new(&tracking_uri)))
    }

    /// Create a dataset on top of any registry client.
    ///
    /// Validates the whole configuration before any registry call: an env
    /// overrides an explicit version, an env must map to a stage, and a
    /// signature must parse.
    pub fn with_registry(mut config: DataSetConfig, registry: Arc<dyn RegistryClient>) -> Result<Self> {
        if config.model_name.trim().is_empty() {
            return Err(Error::Config("model_name must not be empty".into()));
        }

        if config.env.is_some() && config.model_version.is_some() {
            log::warn!("env and version should not be specified together. Ignoring version, using env");
            config.model_version = None;
        }

        let env_stage = config
            .env
            .as_deref()
            .map(|env| config.stage_for_env(env))
            .transpose()?;

        let signature = config
            .signature
            .as_ref()
            .map(ModelSignature::from_dict)
            .transpose()?;

        Ok(Self {
            resolver: ModelResolver::new(Arc::clone(&registry)),
            config,
            signature,
            env_stage,
            registry,
            workdir: None,
        })
    }

    /// Look for the code revision from `dir` instead of the working directory.
    pub fn with_workdir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.workdir = Some(dir.into());
        self
    }

    pub fn config(&self) -> &DataSetConfig {
        &self.config
    }

    pub fn resolver(&self) -> &ModelResolver {
        &self.resolver
    }

    /// Locator the configuration describes.
    pub fn locator(&self) -> ModelLocator {
        ModelLocator::new(
            self.config.model_name.clone(),
            self.config.model_version.clone(),
            self.env_stage,
        )
    }

    /// Upload `model`, register it, and record the run's provenance.
    ///
    /// Starts a run in `session` if none is active; the run stays open.
    pub async fn save(
        &self,
        session: &mut TrackingSession,
        model: &[u8],
        context: &RunContext,
    ) -> Result<ModelVersion> {
        let run = session
            .ensure_run(self.registry.as_ref(), &self.config.experiment_name)
            .await?
            .clone();

        let name = &self.config.model_name;
        let metadata = ModelMetadata::new(
            name,
            &run.run_id,
            model,
            self.signature.as_ref(),
            self.config.input_example.is_some(),
        );
        let upload = ModelUpload {
            artifact_path: name.clone(),
            registered_name: name.clone(),
            payload: model.to_vec(),
            metadata: metadata.render()?,
            input_example: self.config.input_example.clone(),
        };
        let version = self.registry.create_model_version(&run, upload).await?;
        log::info!(
            "Registered model '{}' version {} from run {}",
            name,
            version.version,
            run.run_id
        );

        let revision = match self.workdir {
            Some(ref dir) => CodeRevision::discover(dir),
            None => CodeRevision::from_current_dir(),
        };
        let code_revision = match revision {
            CodeRevision::Commit(sha) => {
                self.registry
                    .log_param(&run.run_id, defaults::GIT_SHA_PARAM, &sha)
                    .await?;
                Some(sha)
            }
            CodeRevision::Unavailable(reason) => {
                log::error!("Unable to get '{}'", defaults::GIT_SHA_PARAM);
                log::error!("{}", reason);
                None
            }
        };

        let snapshot = ProvenanceSnapshot::build(context, code_revision)?;
        self.registry
            .log_artifact(
                &run,
                defaults::PROVENANCE_ARTIFACT,
                snapshot.to_yaml()?.as_bytes(),
            )
            .await?;

        Ok(version)
    }

    /// Resolve the configured locator and fetch that version.
    pub async fn load(&self) -> Result<LoadedModel> {
        let name = &self.config.model_name;
        let latest = self.resolver.latest_version(name).await?;

        let locator = self.locator();
        let reference = if locator.is_latest() {
            ResolvedReference::new(name, latest.clone())
        } else {
            self.resolver.resolve(&locator).await?
        };

        log::info!("Loading model '{}' version '{}'", name, reference.version);

        if reference.version != latest {
            if let Some(ref env) = self.config.env {
                log::warn!("{} environment has older version.", env);
            }
            log::warn!("Newer version {} exists in repo", latest);
        }

        let payload = self
            .registry
            .download_model(name, &reference.version)
            .await
            .map_err(|e| Error::ArtifactNotFound {
                name: name.clone(),
                version: reference.version.clone(),
                reason: e.to_string(),
            })?;

        Ok(LoadedModel { reference, payload })
    }

    /// True when the registry holds at least one version of the model.
    pub async fn exists(&self) -> Result<bool> {
        let versions = self
            .registry
            .search_model_versions(&self.config.model_name)
            .await?;
        Ok(!versions.is_empty())
    }

    /// Configuration summary for catalog listings.
    pub fn describe(&self) -> serde_json::Value {
        json!({
            "tracking_uri": self.config.tracking_uri,
            "experiment_name": self.config.experiment_name,
            "model_name": self.config.model_name,
            "env": self.config.env,
            "model_version": self.config.model_version,
            "signature": self.signature.as_ref().map(ModelSignature::to_dict),
            "input_example": self.config.input_example,
        })
    }
}
