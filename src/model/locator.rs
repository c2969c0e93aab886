//! Symbolic model locators: `models:/<name>` and `models:/<name>/<selector>`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::defaults;
use crate::error::{Error, Result};

/// Deployment stage a registry can assign to a model version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    Production,
    Staging,
    Archived,
}

impl Stage {
    pub const ALL: [Stage; 3] = [Stage::Production, Stage::Staging, Stage::Archived];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Production => "Production",
            Self::Staging => "Staging",
            Self::Archived => "Archived",
        }
    }

    /// Exact, case-sensitive token match.
    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|stage| stage.as_str() == token)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_token(s).ok_or_else(|| Error::UnknownStage(s.to_string()))
    }
}

/// A model reference that may pin a version or a deployment stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelLocator {
    name: String,
    version: Option<String>,
    stage: Option<Stage>,
}

impl ModelLocator {
    /// Locator for the latest version of `name`.
    pub fn latest(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
            stage: None,
        }
    }

    /// Build a locator. A stage always wins over a version; the version is
    /// dropped with a warning when both are given.
    pub fn new(name: impl Into<String>, version: Option<String>, stage: Option<Stage>) -> Self {
        let name = name.into();
        let version = match (&version, stage) {
            (Some(v), Some(s)) => {
                log::warn!(
                    "Model '{}': stage {} and version {} given together; ignoring version",
                    name,
                    s,
                    v
                );
                None
            }
            _ => version,
        };
        Self {
            name,
            version,
            stage,
        }
    }

    /// Parse a `models:/` URI without contacting any registry.
    pub fn parse(uri: &str) -> Result<Self> {
        let parts: Vec<&str> = uri.split('/').collect();

        if parts.len() < 2 {
            return Err(Error::MalformedUri(format!(
                "model uri should have the format 'models:/<model_name>' or \
                 'models:/<model_name>/<version>', got {}",
                uri
            )));
        }

        if parts[0] != defaults::PROTOCOL_SEGMENT {
            return Err(Error::MalformedUri(format!(
                "model uri should start with `models:/`, got {}",
                uri
            )));
        }

        if parts.len() > 3 {
            return Err(Error::MalformedUri(format!(
                "model uri has unexpected trailing segments: {}",
                uri
            )));
        }

        let name = parts[1];
        if name.is_empty() {
            return Err(Error::MalformedUri(format!("model name is empty in {}", uri)));
        }

        let selector = match parts.get(2) {
            None => return Ok(Self::latest(name)),
            Some(s) if s.is_empty() => {
                return Err(Error::MalformedUri(format!(
                    "version or stage is empty in {}",
                    uri
                )))
            }
            Some(s) => *s,
        };

        Ok(match Stage::from_token(selector) {
            Some(stage) => Self::new(name, None, Some(stage)),
            None => Self::new(name, Some(selector.to_string()), None),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn stage(&self) -> Option<Stage> {
        self.stage
    }

    /// True when neither a version nor a stage is pinned.
    pub fn is_latest(&self) -> bool {
        self.version.is_none() && self.stage.is_none()
    }
}

impl fmt::Display for ModelLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:/{}", defaults::PROTOCOL, self.name)?;
        if let Some(stage) = self.stage {
            write!(f, "/{}", stage)
        } else if let Some(ref version) = self.version {
            write!(f, "/{}", version)
        } else {
            Ok(())
        }
    }
}

impl FromStr for ModelLocator {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
