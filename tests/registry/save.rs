//! Saving models with provenance into the in-memory registry.

use std::sync::Arc;

use mlflow_dataset::{
    DataSetConfig, Error, MemoryRegistry, ModelMetadata, RegistryClient, TrackingSession,
    PROVENANCE_ARTIFACT,
};

use crate::fixture::{dataset, init_git, run_context, MODEL_NAME};

fn config() -> DataSetConfig {
    let mut config = DataSetConfig::new(MODEL_NAME);
    config.experiment_name = "fraud_detection".to_string();
    config
}

#[tokio::test]
async fn test_save_registers_version_and_provenance() {
    let repo = tempfile::tempdir().unwrap();
    let sha = init_git(repo.path());

    let registry = Arc::new(MemoryRegistry::new());
    let dataset = dataset(config(), Arc::clone(&registry)).with_workdir(repo.path());
    let mut session = TrackingSession::new();

    let version = dataset
        .save(&mut session, b"weights-v1", &run_context())
        .await
        .unwrap();
    assert_eq!(version.version, "1");
    assert_eq!(version.name, MODEL_NAME);

    let run = session.active_run().cloned().expect("run should stay open");
    assert_eq!(version.run_id.as_deref(), Some(run.run_id.as_str()));

    let record = registry.run(&run.run_id).await.unwrap();
    assert!(!record.finished);
    assert_eq!(record.params.get("git_sha").map(String::as_str), Some(sha.as_str()));

    let provenance = record
        .artifacts
        .get(PROVENANCE_ARTIFACT)
        .expect("provenance artifact missing");
    let doc: serde_yaml::Value = serde_yaml::from_slice(provenance).unwrap();

    assert_eq!(
        doc["kedro_run_args"].as_str(),
        Some("run --pipeline 'data science'")
    );
    let nodes: Vec<&str> = doc["kedro_nodes"]
        .as_sequence()
        .unwrap()
        .iter()
        .filter_map(|n| n.as_str())
        .collect();
    assert_eq!(nodes, vec!["Predict", "Split Data", "Train Model", "report"]);

    let versions = doc["kedro_dataset_versions"].as_sequence().unwrap();
    assert_eq!(versions.len(), 1);
    assert_eq!(versions[0]["name"].as_str(), Some("train_x"));
    assert_eq!(
        versions[0]["load_version"].as_str(),
        Some("2024-06-01T00.00.00.000Z")
    );

    assert_eq!(doc["kedro_params_train_ratio"].as_f64(), Some(0.8));
    assert_eq!(doc["kedro_parameters"]["random_state"].as_i64(), Some(42));

    let mlmodel = record
        .artifacts
        .get(&format!("{}/MLmodel", MODEL_NAME))
        .expect("MLmodel missing");
    let metadata = ModelMetadata::parse(std::str::from_utf8(mlmodel).unwrap()).unwrap();
    assert_eq!(metadata.run_id.as_deref(), Some(run.run_id.as_str()));
    assert!(metadata.signature.is_none());
}

#[tokio::test]
async fn test_second_save_reuses_run() {
    let registry = Arc::new(MemoryRegistry::new());
    let dataset = dataset(config(), Arc::clone(&registry));
    let mut session = TrackingSession::new();

    let first = dataset.save(&mut session, b"a", &run_context()).await.unwrap();
    let second = dataset.save(&mut session, b"b", &run_context()).await.unwrap();

    assert_eq!(first.version, "1");
    assert_eq!(second.version, "2");
    assert_eq!(first.run_id, second.run_id);

    let ended = session.end_run(registry.as_ref()).await.unwrap().unwrap();
    assert!(registry.run(&ended.run_id).await.unwrap().finished);
}

#[tokio::test]
async fn test_missing_git_does_not_block_save() {
    let not_a_repo = tempfile::tempdir().unwrap();
    let registry = Arc::new(MemoryRegistry::new());
    let dataset = dataset(config(), Arc::clone(&registry)).with_workdir(not_a_repo.path());
    let mut session = TrackingSession::new();

    dataset.save(&mut session, b"w", &run_context()).await.unwrap();

    let run_id = session.active_run().unwrap().run_id.clone();
    let record = registry.run(&run_id).await.unwrap();
    assert!(!record.params.contains_key("git_sha"));
    assert!(record.artifacts.contains_key(PROVENANCE_ARTIFACT));
}

#[tokio::test]
async fn test_signature_and_example_recorded() {
    let mut config = config();
    let mut signature = std::collections::BTreeMap::new();
    signature.insert(
        "inputs".to_string(),
        r#"[{"name": "amount", "type": "double"}]"#.to_string(),
    );
    config.signature = Some(signature);
    config.input_example = Some(serde_json::json!({"amount": [12.5]}));

    let registry = Arc::new(MemoryRegistry::new());
    let dataset = dataset(config, Arc::clone(&registry));
    let mut session = TrackingSession::new();
    dataset.save(&mut session, b"w", &run_context()).await.unwrap();

    let record = registry
        .run(&session.active_run().unwrap().run_id)
        .await
        .unwrap();
    let example = record
        .artifacts
        .get(&format!("{}/input_example.json", MODEL_NAME))
        .expect("input example missing");
    let example: serde_json::Value = serde_json::from_slice(example).unwrap();
    assert_eq!(example["amount"][0], 12.5);

    let mlmodel = record
        .artifacts
        .get(&format!("{}/MLmodel", MODEL_NAME))
        .unwrap();
    let metadata = ModelMetadata::parse(std::str::from_utf8(mlmodel).unwrap()).unwrap();
    assert!(metadata.signature.unwrap().contains_key("inputs"));
    assert!(metadata.saved_input_example_info.is_some());
}

#[tokio::test]
async fn test_unreachable_registry_surfaces() {
    let registry = Arc::new(MemoryRegistry::new());
    registry.set_unreachable(true);
    let dataset = dataset(config(), Arc::clone(&registry));
    let mut session = TrackingSession::new();

    let result = dataset.save(&mut session, b"w", &run_context()).await;
    assert!(matches!(result, Err(Error::Registry(_))));
    assert!(session.active_run().is_none());
}

#[tokio::test]
async fn test_missing_parameter_fails_save() {
    let registry = Arc::new(MemoryRegistry::new());
    let dataset = dataset(config(), Arc::clone(&registry));
    let mut session = TrackingSession::new();

    let mut context = run_context();
    context.catalog = mlflow_dataset::DataCatalog::new();

    assert!(matches!(
        dataset.save(&mut session, b"w", &context).await,
        Err(Error::Catalog(_))
    ));
    // The model itself was uploaded before the snapshot failed.
    assert_eq!(registry.search_model_versions(MODEL_NAME).await.unwrap().len(), 1);
}
