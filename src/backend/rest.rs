//! MLflow tracking server client over its REST API.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::backend::{ModelUpload, RegistryClient, RegistryError, Result};
use crate::defaults;
use crate::model::artifact::{payload_digest, ModelMetadata};
use crate::model::locator::Stage;
use crate::model::registry::{Experiment, ModelVersion, RunInfo};

const API_PREFIX: &str = "api/2.0/mlflow";
const ARTIFACTS_PREFIX: &str = "api/2.0/mlflow-artifacts/artifacts";
const ARTIFACT_SCHEME: &str = "mlflow-artifacts:";
const SEARCH_PAGE_SIZE: u32 = 1000;

const RESOURCE_DOES_NOT_EXIST: &str = "RESOURCE_DOES_NOT_EXIST";
const RESOURCE_ALREADY_EXISTS: &str = "RESOURCE_ALREADY_EXISTS";

#[derive(Debug, Default, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    error_code: String,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct ModelVersionsPage {
    #[serde(default)]
    model_versions: Vec<ModelVersion>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ExperimentEnvelope {
    experiment: Experiment,
}

#[derive(Debug, Deserialize)]
struct CreatedExperiment {
    experiment_id: String,
}

#[derive(Debug, Deserialize)]
struct RunEnvelope {
    run: RunBody,
}

#[derive(Debug, Deserialize)]
struct RunBody {
    info: RunInfo,
}

#[derive(Debug, Deserialize)]
struct ModelVersionEnvelope {
    model_version: ModelVersion,
}

#[derive(Debug, Deserialize)]
struct DownloadUri {
    artifact_uri: String,
}

#[derive(Debug, Serialize)]
struct LatestVersionsRequest<'a> {
    name: &'a str,
    stages: Vec<&'static str>,
}

/// Registry client for an MLflow tracking server.
///
/// Artifacts go through the server's `mlflow-artifacts` proxy, so runs must
/// have an `mlflow-artifacts:` artifact root.
pub struct RestRegistry {
    client: Client,
    base_url: String,
}

impl RestRegistry {
    /// Create a client for the server at `tracking_uri`.
    pub fn new(tracking_uri: &str) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(defaults::DOWNLOAD_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: tracking_uri.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn api_url(&self, endpoint: &str) -> String {
        format!("{}/{}/{}", self.base_url, API_PREFIX, endpoint)
    }

    /// Map an `mlflow-artifacts:` URI plus a relative path to a proxy URL.
    fn artifact_url(&self, artifact_uri: &str, path: &str) -> Result<String> {
        let rest = artifact_uri
            .strip_prefix(ARTIFACT_SCHEME)
            .ok_or_else(|| RegistryError::UnsupportedArtifactStore(artifact_uri.to_string()))?;

        // `mlflow-artifacts://host/path` carries an authority we ignore.
        let rest = match rest.strip_prefix("//") {
            Some(with_host) => with_host.find('/').map(|i| &with_host[i..]).unwrap_or(""),
            None => rest,
        };

        let root = rest.trim_matches('/');
        let path = path.trim_start_matches('/');
        Ok(match (root.is_empty(), path.is_empty()) {
            (true, _) => format!("{}/{}/{}", self.base_url, ARTIFACTS_PREFIX, path),
            (false, true) => format!("{}/{}/{}", self.base_url, ARTIFACTS_PREFIX, root),
            (false, false) => format!("{}/{}/{}/{}", self.base_url, ARTIFACTS_PREFIX, root, path),
        })
    }

    async fn post_json<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
        body: &serde_json::Value,
    ) -> Result<T> {
        log::debug!("POST {}", endpoint);
        let response = self
            .client
            .post(self.api_url(endpoint))
            .timeout(Duration::from_secs(defaults::REQUEST_TIMEOUT_SECS))
            .json(body)
            .send()
            .await?;
        decode(check(response, endpoint).await?).await
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, &str)],
    ) -> Result<T> {
        log::debug!("GET {}", endpoint);
        let response = self
            .client
            .get(self.api_url(endpoint))
            .timeout(Duration::from_secs(defaults::REQUEST_TIMEOUT_SECS))
            .query(query)
            .send()
            .await?;
        decode(check(response, endpoint).await?).await
    }

    async fn get_artifact(&self, artifact_uri: &str, path: &str) -> Result<Vec<u8>> {
        let url = self.artifact_url(artifact_uri, path)?;
        log::debug!("GET artifact {}", url);
        let response = self.client.get(&url).send().await?;
        let bytes = check(response, &url).await?.bytes().await?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl RegistryClient for RestRegistry {
    async fn search_model_versions(&self, name: &str) -> Result<Vec<ModelVersion>> {
        let filter = format!("name='{}'", name.replace('\'', "\\'"));
        let page_size = SEARCH_PAGE_SIZE.to_string();
        let mut versions = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut query = vec![("filter", filter.as_str()), ("max_results", page_size.as_str())];
            if let Some(ref token) = page_token {
                query.push(("page_token", token.as_str()));
            }

            let page: ModelVersionsPage = self.get_json("model-versions/search", &query).await?;
            versions.extend(page.model_versions);

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(versions)
    }

    async fn get_latest_versions(&self, name: &str, stages: &[Stage]) -> Result<Vec<ModelVersion>> {
        let request = LatestVersionsRequest {
            name,
            stages: stages.iter().map(Stage::as_str).collect(),
        };
        let page: ModelVersionsPage = self
            .post_json(
                "registered-models/get-latest-versions",
                &serde_json::to_value(&request)
                    .map_err(|e| RegistryError::InvalidResponse(e.to_string()))?,
            )
            .await?;
        Ok(page.model_versions)
    }

    async fn get_or_create_experiment(&self, name: &str) -> Result<Experiment> {
        match self
            .get_json::<ExperimentEnvelope>("experiments/get-by-name", &[("experiment_name", name)])
            .await
        {
            Ok(envelope) => return Ok(envelope.experiment),
            Err(RegistryError::NotFound(_)) => {}
            Err(e) => return Err(e),
        }

        log::info!("Creating experiment '{}'", name);
        let created: CreatedExperiment = self
            .post_json("experiments/create", &json!({ "name": name }))
            .await?;
        Ok(Experiment {
            experiment_id: created.experiment_id,
            name: name.to_string(),
        })
    }

    async fn create_run(&self, experiment_id: &str) -> Result<RunInfo> {
        let envelope: RunEnvelope = self
            .post_json(
                "runs/create",
                &json!({ "experiment_id": experiment_id, "start_time": now_millis() }),
            )
            .await?;
        Ok(envelope.run.info)
    }

    async fn finish_run(&self, run_id: &str) -> Result<()> {
        let _: serde_json::Value = self
            .post_json(
                "runs/update",
                &json!({ "run_id": run_id, "status": "FINISHED", "end_time": now_millis() }),
            )
            .await?;
        Ok(())
    }

    async fn log_param(&self, run_id: &str, key: &str, value: &str) -> Result<()> {
        let _: serde_json::Value = self
            .post_json(
                "runs/log-parameter",
                &json!({ "run_id": run_id, "key": key, "value": value }),
            )
            .await?;
        Ok(())
    }

    async fn log_artifact(&self, run: &RunInfo, path: &str, contents: &[u8]) -> Result<()> {
        let url = self.artifact_url(&run.artifact_uri, path)?;
        log::debug!("PUT artifact {}", url);
        let response = self.client.put(&url).body(contents.to_vec()).send().await?;
        check(response, &url).await?;
        Ok(())
    }

    async fn create_model_version(&self, run: &RunInfo, upload: ModelUpload) -> Result<ModelVersion> {
        let prefix = upload.artifact_path.trim_matches('/');
        self.log_artifact(
            run,
            &format!("{}/{}", prefix, defaults::MODEL_PAYLOAD_FILE),
            &upload.payload,
        )
        .await?;
        self.log_artifact(
            run,
            &format!("{}/{}", prefix, defaults::MODEL_METADATA_FILE),
            upload.metadata.as_bytes(),
        )
        .await?;
        if let Some(ref example) = upload.input_example {
            let rendered = serde_json::to_vec(example)
                .map_err(|e| RegistryError::InvalidResponse(e.to_string()))?;
            self.log_artifact(
                run,
                &format!("{}/{}", prefix, defaults::INPUT_EXAMPLE_FILE),
                &rendered,
            )
            .await?;
        }

        match self
            .post_json::<serde_json::Value>(
                "registered-models/create",
                &json!({ "name": upload.registered_name }),
            )
            .await
        {
            Ok(_) => log::info!("Registered model '{}'", upload.registered_name),
            Err(RegistryError::Api { ref code, .. }) if code == RESOURCE_ALREADY_EXISTS => {}
            Err(e) => return Err(e),
        }

        let source = format!("{}/{}", run.artifact_uri.trim_end_matches('/'), prefix);
        let envelope: ModelVersionEnvelope = self
            .post_json(
                "model-versions/create",
                &json!({
                    "name": upload.registered_name,
                    "source": source,
                    "run_id": run.run_id,
                }),
            )
            .await?;
        Ok(envelope.model_version)
    }

    async fn download_model(&self, name: &str, version: &str) -> Result<Vec<u8>> {
        let location: DownloadUri = self
            .get_json(
                "model-versions/get-download-uri",
                &[("name", name), ("version", version)],
            )
            .await?;

        let metadata = self
            .get_artifact(&location.artifact_uri, defaults::MODEL_METADATA_FILE)
            .await?;
        let metadata = ModelMetadata::parse(&String::from_utf8_lossy(&metadata))
            .map_err(|e| RegistryError::InvalidResponse(format!("Invalid MLmodel: {}", e)))?;

        let payload = self
            .get_artifact(&location.artifact_uri, defaults::MODEL_PAYLOAD_FILE)
            .await?;

        if let Some(expected) = metadata.payload_sha256 {
            let actual = payload_digest(&payload);
            if actual != expected {
                return Err(RegistryError::Integrity {
                    name: name.to_string(),
                    version: version.to_string(),
                    expected,
                    actual,
                });
            }
        }

        Ok(payload)
    }
}

/// Turn a non-success response into the matching `RegistryError`.
async fn check(response: Response, what: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body: ApiErrorBody = response.json().await.unwrap_or_default();
    if status == StatusCode::NOT_FOUND || body.error_code == RESOURCE_DOES_NOT_EXIST {
        return Err(RegistryError::NotFound(format!("{}: {}", what, body.message)));
    }

    Err(RegistryError::Api {
        status: status.as_u16(),
        code: body.error_code,
        message: body.message,
    })
}

async fn decode<T: serde::de::DeserializeOwned>(response: Response) -> Result<T> {
    response
        .json::<T>()
        .await
        .map_err(|e| RegistryError::InvalidResponse(e.to_string()))
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
