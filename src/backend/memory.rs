//! In-process registry with the same semantics as a tracking server.
//!
//! Versions are numbered from 1 per model name and returned in registration
//! order. A stage is held by at most one version of a model at a time.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::backend::{ModelUpload, RegistryClient, RegistryError, Result};
use crate::model::locator::Stage;
use crate::model::registry::{Experiment, ModelVersion, RunInfo};

/// Everything recorded against one run.
#[derive(Debug, Clone, Default)]
pub struct RunRecord {
    pub experiment_id: String,
    pub params: BTreeMap<String, String>,
    pub artifacts: BTreeMap<String, Vec<u8>>,
    pub finished: bool,
}

struct StoredVersion {
    version: ModelVersion,
    payload: Vec<u8>,
}

#[derive(Default)]
struct State {
    experiments: Vec<Experiment>,
    runs: HashMap<String, RunRecord>,
    models: BTreeMap<String, Vec<StoredVersion>>,
    downloads: Vec<(String, String)>,
}

/// Registry kept entirely in memory.
#[derive(Default)]
pub struct MemoryRegistry {
    state: RwLock<State>,
    next_id: AtomicU64,
    unreachable: AtomicBool,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail as if the server were down.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// Register a new version of `name` directly, outside of any run.
    pub async fn register(&self, name: &str, payload: &[u8]) -> ModelVersion {
        let mut state = self.state.write().await;
        push_version(&mut state, name, None, None, payload.to_vec())
    }

    /// Assign `stage` to one version, taking it away from any other.
    pub async fn transition_stage(&self, name: &str, version: &str, stage: Stage) -> Result<()> {
        let mut state = self.state.write().await;
        let versions = state
            .models
            .get_mut(name)
            .ok_or_else(|| RegistryError::NotFound(format!("registered model '{}'", name)))?;

        if !versions.iter().any(|v| v.version.version == version) {
            return Err(RegistryError::NotFound(format!("{} version {}", name, version)));
        }

        for stored in versions.iter_mut() {
            if stored.version.version == version {
                stored.version.current_stage = Some(stage);
            } else if stored.version.current_stage == Some(stage) {
                stored.version.current_stage = None;
            }
        }
        Ok(())
    }

    pub async fn run(&self, run_id: &str) -> Option<RunRecord> {
        self.state.read().await.runs.get(run_id).cloned()
    }

    /// `(name, version)` of every successful download, in order.
    pub async fn downloads(&self) -> Vec<(String, String)> {
        self.state.read().await.downloads.clone()
    }

    fn check_reachable(&self) -> Result<()> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(RegistryError::Api {
                status: 503,
                code: "TEMPORARILY_UNAVAILABLE".to_string(),
                message: "registry unreachable".to_string(),
            });
        }
        Ok(())
    }

    fn next_id(&self, prefix: &str) -> String {
        format!("{}{}", prefix, self.next_id.fetch_add(1, Ordering::SeqCst))
    }
}

fn push_version(
    state: &mut State,
    name: &str,
    run_id: Option<String>,
    source: Option<String>,
    payload: Vec<u8>,
) -> ModelVersion {
    let versions = state.models.entry(name.to_string()).or_default();
    let mut version = ModelVersion::new(name, (versions.len() + 1).to_string());
    version.run_id = run_id;
    version.source = source;
    versions.push(StoredVersion {
        version: version.clone(),
        payload,
    });
    version
}

#[async_trait]
impl RegistryClient for MemoryRegistry {
    async fn search_model_versions(&self, name: &str) -> Result<Vec<ModelVersion>> {
        self.check_reachable()?;
        let state = self.state.read().await;
        Ok(state
            .models
            .get(name)
            .map(|versions| versions.iter().map(|v| v.version.clone()).collect())
            .unwrap_or_default())
    }

    async fn get_latest_versions(&self, name: &str, stages: &[Stage]) -> Result<Vec<ModelVersion>> {
        self.check_reachable()?;
        let state = self.state.read().await;
        let versions = state
            .models
            .get(name)
            .ok_or_else(|| RegistryError::NotFound(format!("registered model '{}'", name)))?;

        Ok(stages
            .iter()
            .filter_map(|stage| {
                versions
                    .iter()
                    .rev()
                    .find(|v| v.version.current_stage == Some(*stage))
                    .map(|v| v.version.clone())
            })
            .collect())
    }

    async fn get_or_create_experiment(&self, name: &str) -> Result<Experiment> {
        self.check_reachable()?;
        let mut state = self.state.write().await;
        if let Some(existing) = state.experiments.iter().find(|e| e.name == name) {
            return Ok(existing.clone());
        }

        let experiment = Experiment {
            experiment_id: state.experiments.len().to_string(),
            name: name.to_string(),
        };
        state.experiments.push(experiment.clone());
        Ok(experiment)
    }

    async fn create_run(&self, experiment_id: &str) -> Result<RunInfo> {
        self.check_reachable()?;
        let run_id = self.next_id("run-");
        let mut state = self.state.write().await;
        if !state.experiments.iter().any(|e| e.experiment_id == experiment_id) {
            return Err(RegistryError::NotFound(format!("experiment {}", experiment_id)));
        }

        state.runs.insert(
            run_id.clone(),
            RunRecord {
                experiment_id: experiment_id.to_string(),
                ..Default::default()
            },
        );
        Ok(RunInfo {
            artifact_uri: format!("mlflow-artifacts:/{}/{}/artifacts", experiment_id, run_id),
            run_id,
            experiment_id: experiment_id.to_string(),
        })
    }

    async fn finish_run(&self, run_id: &str) -> Result<()> {
        self.check_reachable()?;
        let mut state = self.state.write().await;
        let run = state
            .runs
            .get_mut(run_id)
            .ok_or_else(|| RegistryError::NotFound(format!("run {}", run_id)))?;
        run.finished = true;
        Ok(())
    }

    async fn log_param(&self, run_id: &str, key: &str, value: &str) -> Result<()> {
        self.check_reachable()?;
        let mut state = self.state.write().await;
        let run = state
            .runs
            .get_mut(run_id)
            .ok_or_else(|| RegistryError::NotFound(format!("run {}", run_id)))?;
        run.params.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn log_artifact(&self, run: &RunInfo, path: &str, contents: &[u8]) -> Result<()> {
        self.check_reachable()?;
        let mut state = self.state.write().await;
        let record = state
            .runs
            .get_mut(&run.run_id)
            .ok_or_else(|| RegistryError::NotFound(format!("run {}", run.run_id)))?;
        record.artifacts.insert(path.to_string(), contents.to_vec());
        Ok(())
    }

    async fn create_model_version(&self, run: &RunInfo, upload: ModelUpload) -> Result<ModelVersion> {
        self.check_reachable()?;
        let mut state = self.state.write().await;
        let record = state
            .runs
            .get_mut(&run.run_id)
            .ok_or_else(|| RegistryError::NotFound(format!("run {}", run.run_id)))?;

        let prefix = upload.artifact_path.trim_matches('/');
        record.artifacts.insert(
            format!("{}/{}", prefix, crate::defaults::MODEL_PAYLOAD_FILE),
            upload.payload.clone(),
        );
        record.artifacts.insert(
            format!("{}/{}", prefix, crate::defaults::MODEL_METADATA_FILE),
            upload.metadata.into_bytes(),
        );
        if let Some(example) = upload.input_example {
            record.artifacts.insert(
                format!("{}/{}", prefix, crate::defaults::INPUT_EXAMPLE_FILE),
                serde_json::to_vec(&example)
                    .map_err(|e| RegistryError::InvalidResponse(e.to_string()))?,
            );
        }

        let source = format!("{}/{}", run.artifact_uri, prefix);
        Ok(push_version(
            &mut state,
            &upload.registered_name,
            Some(run.run_id.clone()),
            Some(source),
            upload.payload,
        ))
    }

    async fn download_model(&self, name: &str, version: &str) -> Result<Vec<u8>> {
        self.check_reachable()?;
        let mut state = self.state.write().await;
        let payload = state
            .models
            .get(name)
            .and_then(|versions| versions.iter().find(|v| v.version.version == version))
            .map(|v| v.payload.clone())
            .ok_or_else(|| RegistryError::NotFound(format!("{} version {}", name, version)))?;
        state.downloads.push((name.to_string(), version.to_string()));
        Ok(payload)
    }
}
