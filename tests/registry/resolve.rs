//! Locator resolution against registry backends.

use std::sync::Arc;

use mlflow_dataset::{Error, MemoryRegistry, ModelResolver, ModelVersion, Stage};

use crate::fixture::{seeded_registry, FixedVersions, MODEL_NAME};

#[tokio::test]
async fn test_latest_of_sparse_versions() {
    let resolver = ModelResolver::new(Arc::new(FixedVersions::new(MODEL_NAME, &["1", "2", "5"])));

    let resolved = resolver.resolve_uri("models:/fraud_model").await.unwrap();
    assert_eq!(resolved.version, "5");
    assert_eq!(resolved.name, MODEL_NAME);
    assert_eq!(resolved.to_string(), "models:/fraud_model/5");
}

#[tokio::test]
async fn test_stage_from_fixed_versions() {
    let mut registry = FixedVersions::new(MODEL_NAME, &["1", "2"]);
    registry
        .versions
        .push(ModelVersion::new(MODEL_NAME, "3").with_stage(Stage::Archived));
    let resolver = ModelResolver::new(Arc::new(registry));

    let resolved = resolver.resolve_uri("models:/fraud_model/Archived").await.unwrap();
    assert_eq!(resolved.version, "3");
    assert!(matches!(
        resolver.resolve_uri("models:/fraud_model/Staging").await,
        Err(Error::NoVersionForStage { stage: Stage::Staging, .. })
    ));
}

#[tokio::test]
async fn test_memory_registry_resolution() {
    let registry = seeded_registry().await;
    let resolver = ModelResolver::new(registry);

    assert_eq!(
        resolver.resolve_uri("models:/fraud_model").await.unwrap().version,
        "3"
    );
    assert_eq!(
        resolver
            .resolve_uri("models:/fraud_model/Production")
            .await
            .unwrap()
            .version,
        "2"
    );
    // Literal versions are not checked until load.
    assert_eq!(
        resolver.resolve_uri("models:/fraud_model/99").await.unwrap().version,
        "99"
    );
}

#[tokio::test]
async fn test_malformed_before_registry() {
    let registry = seeded_registry().await;
    registry.set_unreachable(true);
    let resolver = ModelResolver::new(registry);

    for uri in ["fraud_model", "model:/fraud_model", "runs:/abc/model"] {
        assert!(
            matches!(resolver.resolve_uri(uri).await, Err(Error::MalformedUri(_))),
            "expected MalformedUri for {}",
            uri
        );
    }
    // A well-formed URI does reach the (down) registry.
    assert!(matches!(
        resolver.resolve_uri("models:/fraud_model").await,
        Err(Error::Registry(_))
    ));
}

#[tokio::test]
async fn test_stage_of_unregistered_model() {
    let resolver = ModelResolver::new(Arc::new(MemoryRegistry::new()));

    assert!(matches!(
        resolver.resolve_uri("models:/ghost/Production").await,
        Err(Error::NoVersionForStage { ref name, stage: Stage::Production }) if name == "ghost"
    ));
}

#[tokio::test]
async fn test_stage_lookup_keeps_transport_errors() {
    let registry = seeded_registry().await;
    registry.set_unreachable(true);
    let resolver = ModelResolver::new(registry);

    assert!(matches!(
        resolver.resolve_uri("models:/fraud_model/Production").await,
        Err(Error::Registry(_))
    ));
}
