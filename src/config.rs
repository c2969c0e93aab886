//! Dataset configuration as it appears in a data catalog entry.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::defaults;
use crate::error::{Error, Result};
use crate::model::locator::Stage;

const BUILTIN_ENV_STAGES: &[(&str, Stage)] = &[
    ("prod", Stage::Production),
    ("production", Stage::Production),
    ("staging", Stage::Staging),
    ("stage", Stage::Staging),
    ("dev", Stage::Staging),
    ("archived", Stage::Archived),
    ("archive", Stage::Archived),
];

/// Settings for one registry-backed model dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSetConfig {
    /// Tracking server; falls back to `MLFLOW_TRACKING_URI` when empty
    #[serde(default)]
    pub tracking_uri: Option<String>,
    #[serde(default = "defaults::experiment_name")]
    pub experiment_name: String,
    pub model_name: String,
    /// Environment tag resolved to a stage on load
    #[serde(default)]
    pub env: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub model_version: Option<String>,
    /// Dict form of a model signature
    #[serde(default)]
    pub signature: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub input_example: Option<Value>,
    /// Extra environment-to-stage mappings, checked before the built-in ones
    #[serde(default)]
    pub env_stages: BTreeMap<String, Stage>,
}

impl DataSetConfig {
    pub fn new(model_name: impl Into<String>) -> Self {
        Self {
            tracking_uri: None,
            experiment_name: defaults::experiment_name(),
            model_name: model_name.into(),
            env: None,
            model_version: None,
            signature: None,
            input_example: None,
            env_stages: BTreeMap::new(),
        }
    }

    /// Parse a catalog entry. Keys the dataset does not use (such as `type`) are ignored.
    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content)?;
        if config.model_name.trim().is_empty() {
            return Err(Error::Config("model_name must not be empty".into()));
        }
        Ok(config)
    }

    /// Configured tracking URI, else the environment, else the local default.
    pub fn resolved_tracking_uri(&self) -> String {
        self.tracking_uri
            .clone()
            .filter(|uri| !uri.trim().is_empty())
            .or_else(|| {
                std::env::var(defaults::TRACKING_URI_ENV)
                    .ok()
                    .filter(|uri| !uri.trim().is_empty())
            })
            .unwrap_or_else(|| defaults::DEFAULT_TRACKING_URI.to_string())
    }

    /// Stage an environment tag stands for.
    pub fn stage_for_env(&self, env: &str) -> Result<Stage> {
        if let Some(stage) = self.env_stages.get(env) {
            return Ok(*stage);
        }
        if let Some(stage) = Stage::from_token(env) {
            return Ok(stage);
        }
        BUILTIN_ENV_STAGES
            .iter()
            .find(|(alias, _)| alias.eq_ignore_ascii_case(env))
            .map(|(_, stage)| *stage)
            .ok_or_else(|| Error::UnknownEnvironment(env.to_string()))
    }
}

/// Versions are often written unquoted in YAML (`model_version: 3`).
fn string_or_number<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Option<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Int(i64),
    }

    Ok(Option::<Raw>::deserialize(d)?.map(|raw| match raw {
        Raw::Text(s) => s,
        Raw::Int(n) => n.to_string(),
    }))
}
