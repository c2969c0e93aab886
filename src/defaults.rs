//! Default values and fixed names used across the crate.

/// Scheme of a model locator URI.
pub const PROTOCOL: &str = "models";
/// Leading segment of a locator URI once split on `/`.
pub const PROTOCOL_SEGMENT: &str = "models:";

/// Provenance artifact written next to every saved model.
pub const PROVENANCE_ARTIFACT: &str = "kedro.yaml";
/// Prefix applied to every sanitized pipeline parameter key.
pub const PARAM_PREFIX: &str = "kedro_";
/// Substring marking a pipeline input as a parameter.
pub const PARAM_MARKER: &str = "param";
/// Run parameter holding the code revision.
pub const GIT_SHA_PARAM: &str = "git_sha";

/// Files written under the model's artifact path.
pub const MODEL_PAYLOAD_FILE: &str = "model.bin";
pub const MODEL_METADATA_FILE: &str = "MLmodel";
pub const INPUT_EXAMPLE_FILE: &str = "input_example.json";

/// Environment variable consulted when no tracking URI is configured.
pub const TRACKING_URI_ENV: &str = "MLFLOW_TRACKING_URI";
pub const DEFAULT_TRACKING_URI: &str = "http://localhost:5000";
pub const DEFAULT_EXPERIMENT: &str = "Default";

pub const REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DOWNLOAD_TIMEOUT_SECS: u64 = 600;

pub fn experiment_name() -> String { DEFAULT_EXPERIMENT.to_string() }
