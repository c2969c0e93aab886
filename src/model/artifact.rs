//! The `MLmodel` document stored beside every model payload.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::defaults;
use crate::signature::ModelSignature;

/// Flavor name recorded for opaque byte payloads.
pub const BYTES_FLAVOR: &str = "bytes";

/// Reference to a saved input example.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputExampleInfo {
    pub artifact_path: String,
    #[serde(rename = "type")]
    pub example_type: String,
}

/// Contents of the `MLmodel` file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub artifact_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    #[serde(default)]
    pub flavors: BTreeMap<String, serde_yaml::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_input_example_info: Option<InputExampleInfo>,
    /// Hex SHA-256 of the payload file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload_sha256: Option<String>,
}

impl ModelMetadata {
    pub fn new(
        artifact_path: &str,
        run_id: &str,
        payload: &[u8],
        signature: Option<&ModelSignature>,
        has_input_example: bool,
    ) -> Self {
        let mut flavor = serde_yaml::Mapping::new();
        flavor.insert("data".into(), defaults::MODEL_PAYLOAD_FILE.into());
        let mut flavors = BTreeMap::new();
        flavors.insert(BYTES_FLAVOR.to_string(), serde_yaml::Value::Mapping(flavor));

        Self {
            artifact_path: artifact_path.to_string(),
            run_id: Some(run_id.to_string()),
            flavors,
            signature: signature.map(ModelSignature::to_dict),
            saved_input_example_info: has_input_example.then(|| InputExampleInfo {
                artifact_path: defaults::INPUT_EXAMPLE_FILE.to_string(),
                example_type: "json".to_string(),
            }),
            payload_sha256: Some(payload_digest(payload)),
        }
    }

    pub fn render(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }

    pub fn parse(content: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(content)
    }
}

pub fn payload_digest(payload: &[u8]) -> String {
    ::hex::encode(Sha256::digest(payload))
}
