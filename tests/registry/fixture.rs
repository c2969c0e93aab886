use std::path::Path;
use std::sync::{Arc, Mutex, Once};
use std::thread::{self, ThreadId};

use async_trait::async_trait;
use log::{Level, LevelFilter, Log, Metadata, Record};
use serde_json::json;

use mlflow_dataset::backend::Result as RegistryResult;
use mlflow_dataset::{
    CatalogEntry, DataCatalog, DataSetConfig, Experiment, MemoryRegistry, MlflowDataSet,
    ModelUpload, ModelVersion, Node, Pipeline, RegistryClient, RegistryError, RunContext, RunInfo,
    Stage,
};

pub(crate) const MODEL_NAME: &str = "fraud_model";

/// Read-only registry reporting a fixed version list.
pub(crate) struct FixedVersions {
    pub(crate) versions: Vec<ModelVersion>,
}

impl FixedVersions {
    pub(crate) fn new(name: &str, numbers: &[&str]) -> Self {
        Self {
            versions: numbers.iter().map(|n| ModelVersion::new(name, *n)).collect(),
        }
    }
}

#[async_trait]
impl RegistryClient for FixedVersions {
    async fn search_model_versions(&self, name: &str) -> RegistryResult<Vec<ModelVersion>> {
        Ok(self
            .versions
            .iter()
            .filter(|v| v.name == name)
            .cloned()
            .collect())
    }

    async fn get_latest_versions(
        &self,
        name: &str,
        stages: &[Stage],
    ) -> RegistryResult<Vec<ModelVersion>> {
        Ok(self
            .versions
            .iter()
            .filter(|v| v.name == name)
            .filter(|v| v.current_stage.map(|s| stages.contains(&s)).unwrap_or(false))
            .cloned()
            .collect())
    }

    async fn get_or_create_experiment(&self, _name: &str) -> RegistryResult<Experiment> {
        Err(read_only())
    }

    async fn create_run(&self, _experiment_id: &str) -> RegistryResult<RunInfo> {
        Err(read_only())
    }

    async fn finish_run(&self, _run_id: &str) -> RegistryResult<()> {
        Err(read_only())
    }

    async fn log_param(&self, _run_id: &str, _key: &str, _value: &str) -> RegistryResult<()> {
        Err(read_only())
    }

    async fn log_artifact(&self, _run: &RunInfo, _path: &str, _contents: &[u8]) -> RegistryResult<()> {
        Err(read_only())
    }

    async fn create_model_version(
        &self,
        _run: &RunInfo,
        _upload: ModelUpload,
    ) -> RegistryResult<ModelVersion> {
        Err(read_only())
    }

    async fn download_model(&self, _name: &str, _version: &str) -> RegistryResult<Vec<u8>> {
        Err(read_only())
    }
}

fn read_only() -> RegistryError {
    RegistryError::Api {
        status: 405,
        code: "READ_ONLY".to_string(),
        message: "fixture registry is read-only".to_string(),
    }
}

/// Registry with versions 1..=3 of the model, version 2 in Production.
pub(crate) async fn seeded_registry() -> Arc<MemoryRegistry> {
    let registry = Arc::new(MemoryRegistry::new());
    for payload in [b"v1", b"v2", b"v3"] {
        registry.register(MODEL_NAME, payload).await;
    }
    registry
        .transition_stage(MODEL_NAME, "2", Stage::Production)
        .await
        .expect("Failed to stage version 2");
    registry
}

pub(crate) fn dataset(config: DataSetConfig, registry: Arc<MemoryRegistry>) -> MlflowDataSet {
    MlflowDataSet::with_registry(config, registry).expect("Failed to build dataset")
}

/// Fraud pipeline: split, train, report.
pub(crate) fn run_context() -> RunContext {
    let pipeline = Pipeline::new(vec![
        Node::new(
            "split_data",
            &["transactions", "params:train:ratio"],
            &["train_x", "train_y", "test_x", "test_y"],
        ),
        Node::new("train_model", &["train_x", "train_y", "parameters"], &[MODEL_NAME]),
        Node::new("predict", &[MODEL_NAME, "test_x"], &["pred_y"]),
        Node::new("report_accuracy", &["pred_y", "test_y"], &[]).named("report"),
    ]);

    let mut catalog = DataCatalog::new();
    catalog.add_parameters(&json!({"train": {"ratio": 0.8}, "random_state": 42}));
    catalog.add("params:train:ratio", CatalogEntry::memory(json!(0.8)));
    catalog.add("transactions", CatalogEntry::versioned("2024-06-01T00.00.00.000Z", None));
    catalog.add(
        "train_x",
        CatalogEntry::versioned(
            "2024-06-02T00.00.00.000Z",
            Some("2024-06-01T00.00.00.000Z".into()),
        ),
    );
    catalog.add("train_y", CatalogEntry::unversioned());
    catalog.add("test_x", CatalogEntry::unversioned());
    catalog.add("test_y", CatalogEntry::unversioned());
    catalog.add(MODEL_NAME, CatalogEntry::unversioned());

    let mut context = RunContext::new(pipeline, catalog);
    context.run_args = vec![
        "run".to_string(),
        "--pipeline".to_string(),
        "data science".to_string(),
    ];
    context
}

/// Repository at `root` with one commit on HEAD. Returns the commit hash.
pub(crate) fn init_git(root: &Path) -> String {
    let repo = git2::Repository::init(root).expect("Failed to init repository");
    let sig = git2::Signature::now("Pipeline", "pipeline@example.com").expect("Bad signature");
    let tree_id = repo
        .index()
        .and_then(|mut index| index.write_tree())
        .expect("Failed to write tree");
    let tree = repo.find_tree(tree_id).expect("Failed to find tree");
    repo.commit(Some("HEAD"), &sig, &sig, "initial", &tree, &[])
        .expect("Failed to commit")
        .to_string()
}

/// Logger keeping every record with the thread that emitted it.
struct CaptureLogger;

static RECORDS: Mutex<Vec<(ThreadId, Level, String)>> = Mutex::new(Vec::new());
static LOGGER: CaptureLogger = CaptureLogger;
static INIT: Once = Once::new();

impl Log for CaptureLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        if let Ok(mut records) = RECORDS.lock() {
            records.push((thread::current().id(), record.level(), record.args().to_string()));
        }
    }

    fn flush(&self) {}
}

/// Start capturing log records for the current test thread.
///
/// `#[tokio::test]` runs on the test's own thread, so records are told apart
/// by thread id while tests run in parallel.
pub(crate) fn capture_logs() {
    INIT.call_once(|| {
        log::set_logger(&LOGGER).expect("Logger already installed");
        log::set_max_level(LevelFilter::Debug);
    });
    let current = thread::current().id();
    RECORDS
        .lock()
        .expect("Log capture poisoned")
        .retain(|(id, _, _)| *id != current);
}

/// Warnings logged on the current thread since `capture_logs`.
pub(crate) fn warnings() -> Vec<String> {
    let current = thread::current().id();
    RECORDS
        .lock()
        .expect("Log capture poisoned")
        .iter()
        .filter(|(id, level, _)| *id == current && *level == Level::Warn)
        .map(|(_, _, message)| message.clone())
        .collect()
}
