//! Records the model registry hands back.
//!
//! A registered version moves through:
//! PENDING_REGISTRATION -> READY | FAILED_REGISTRATION

use serde::{Deserialize, Serialize};

use crate::model::locator::Stage;

/// Registration status of a model version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ModelVersionStatus {
    /// Artifact copy still in progress
    PendingRegistration,
    /// Registration failed on the server
    FailedRegistration,
    /// Loadable
    #[default]
    Ready,
}

impl std::fmt::Display for ModelVersionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PendingRegistration => write!(f, "PENDING_REGISTRATION"),
            Self::FailedRegistration => write!(f, "FAILED_REGISTRATION"),
            Self::Ready => write!(f, "READY"),
        }
    }
}

/// One registered version of a model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelVersion {
    /// Registered model name
    pub name: String,
    /// Version string as the registry reports it
    pub version: String,
    /// Stage currently assigned, if any
    #[serde(default, with = "stage_field")]
    pub current_stage: Option<Stage>,
    /// Run that produced the artifact
    #[serde(default)]
    pub run_id: Option<String>,
    /// Artifact location the version was registered from
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub status: ModelVersionStatus,
}

impl ModelVersion {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            current_stage: None,
            run_id: None,
            source: None,
            status: ModelVersionStatus::Ready,
        }
    }

    pub fn with_stage(mut self, stage: Stage) -> Self {
        self.current_stage = Some(stage);
        self
    }
}

/// Experiment a run belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Experiment {
    pub experiment_id: String,
    pub name: String,
}

/// Identity of a tracking run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunInfo {
    pub run_id: String,
    pub experiment_id: String,
    /// Root under which the run's artifacts live
    pub artifact_uri: String,
}

/// The registry encodes "no stage" as the literal `None`.
mod stage_field {
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::model::locator::Stage;

    pub fn serialize<S: Serializer>(stage: &Option<Stage>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(stage.map(|st| st.as_str()).unwrap_or("None"))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Stage>, D::Error> {
        let raw = Option::<String>::deserialize(d)?;
        Ok(raw.as_deref().and_then(Stage::from_token))
    }
}
