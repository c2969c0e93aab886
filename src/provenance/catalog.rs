//! Pipeline and data catalog as seen by the provenance snapshot.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Errors raised by catalog lookups.
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Dataset '{0}' is not registered in the catalog")]
    NotFound(String),

    #[error("Dataset '{0}' holds no loadable value")]
    NotLoadable(String),
}

/// Whether a dataset can report the versions it saves and loads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Versioning {
    Versioned {
        save: String,
        #[serde(default)]
        load: Option<String>,
    },
    #[default]
    Unversioned,
}

/// One dataset registered in the catalog.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// In-memory value, present for parameters and memory datasets
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default)]
    pub versioning: Versioning,
}

impl CatalogEntry {
    pub fn memory(value: Value) -> Self {
        Self {
            value: Some(value),
            versioning: Versioning::Unversioned,
        }
    }

    pub fn versioned(save: impl Into<String>, load: Option<String>) -> Self {
        Self {
            value: None,
            versioning: Versioning::Versioned {
                save: save.into(),
                load,
            },
        }
    }

    pub fn unversioned() -> Self {
        Self::default()
    }
}

/// Named datasets available to a pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataCatalog {
    entries: BTreeMap<String, CatalogEntry>,
}

impl DataCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, name: impl Into<String>, entry: CatalogEntry) {
        self.entries.insert(name.into(), entry);
    }

    /// Register run parameters the way pipelines consume them: the whole
    /// tree as `parameters`, every key path as `params:<a.b.c>`.
    pub fn add_parameters(&mut self, parameters: &Value) {
        self.add("parameters", CatalogEntry::memory(parameters.clone()));
        if let Value::Object(map) = parameters {
            for (key, value) in map {
                self.add_parameter(key, value);
            }
        }
    }

    fn add_parameter(&mut self, path: &str, value: &Value) {
        self.add(format!("params:{}", path), CatalogEntry::memory(value.clone()));
        if let Value::Object(map) = value {
            for (key, nested) in map {
                self.add_parameter(&format!("{}.{}", path, key), nested);
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&CatalogEntry> {
        self.entries.get(name)
    }

    pub fn load(&self, name: &str) -> Result<Value, CatalogError> {
        let entry = self
            .entries
            .get(name)
            .ok_or_else(|| CatalogError::NotFound(name.to_string()))?;
        entry
            .value
            .clone()
            .ok_or_else(|| CatalogError::NotLoadable(name.to_string()))
    }

    /// Entries in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &CatalogEntry)> {
        self.entries.iter()
    }
}

/// One step of a pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub func_name: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub inputs: Vec<String>,
    #[serde(default)]
    pub outputs: Vec<String>,
}

impl Node {
    pub fn new(func_name: impl Into<String>, inputs: &[&str], outputs: &[&str]) -> Self {
        Self {
            func_name: func_name.into(),
            name: None,
            inputs: inputs.iter().map(|s| s.to_string()).collect(),
            outputs: outputs.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Explicit name, else the function name title-cased (`train_model` -> `Train Model`).
    pub fn short_name(&self) -> String {
        if let Some(ref name) = self.name {
            return name.clone();
        }
        title_case(&self.func_name.replace('_', " "))
    }
}

/// Upper-case letters that follow a non-letter, lower-case the rest.
fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut after_letter = false;
    for c in text.chars() {
        if after_letter {
            out.extend(c.to_lowercase());
        } else {
            out.extend(c.to_uppercase());
        }
        after_letter = c.is_alphabetic();
    }
    out
}

/// Ordered set of nodes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pipeline {
    pub nodes: Vec<Node>,
}

impl Pipeline {
    pub fn new(nodes: Vec<Node>) -> Self {
        Self { nodes }
    }

    /// Inputs no node in the pipeline produces.
    pub fn inputs(&self) -> BTreeSet<String> {
        let outputs = self.all_outputs();
        self.nodes
            .iter()
            .flat_map(|n| n.inputs.iter())
            .filter(|i| !outputs.contains(*i))
            .cloned()
            .collect()
    }

    /// Every dataset any node writes.
    pub fn all_outputs(&self) -> BTreeSet<String> {
        self.nodes
            .iter()
            .flat_map(|n| n.outputs.iter().cloned())
            .collect()
    }
}
