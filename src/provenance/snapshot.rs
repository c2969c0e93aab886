//! Point-in-time record of the pipeline run that produced a model.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::defaults;
use crate::provenance::catalog::{CatalogError, DataCatalog, Pipeline, Versioning};

const RESERVED_KEYS: [&str; 3] = ["kedro_run_args", "kedro_nodes", "kedro_dataset_versions"];

/// Versions one pipeline output was saved and loaded at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetVersion {
    pub name: String,
    pub save_version: String,
    pub load_version: Option<String>,
}

/// Everything a save needs to know about the run calling it.
#[derive(Debug, Clone, Default)]
pub struct RunContext {
    /// Command-line arguments after the program name
    pub run_args: Vec<String>,
    /// Run-level overrides, merged over catalog parameters
    pub extra_params: BTreeMap<String, Value>,
    pub pipeline: Pipeline,
    pub catalog: DataCatalog,
}

impl RunContext {
    pub fn new(pipeline: Pipeline, catalog: DataCatalog) -> Self {
        Self {
            pipeline,
            catalog,
            ..Default::default()
        }
    }

    /// Context carrying this process's own command line.
    pub fn from_process_args(pipeline: Pipeline, catalog: DataCatalog) -> Self {
        Self {
            run_args: std::env::args().skip(1).collect(),
            ..Self::new(pipeline, catalog)
        }
    }

    pub fn with_extra_params(mut self, extra_params: BTreeMap<String, Value>) -> Self {
        self.extra_params = extra_params;
        self
    }
}

/// Provenance written as `kedro.yaml` beside each saved model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProvenanceSnapshot {
    /// Logged as the `git_sha` run parameter, not part of the document
    #[serde(skip)]
    pub code_revision: Option<String>,
    #[serde(rename = "kedro_run_args")]
    pub run_args: String,
    #[serde(rename = "kedro_nodes")]
    pub node_names: Vec<String>,
    #[serde(rename = "kedro_dataset_versions")]
    pub dataset_versions: Vec<DatasetVersion>,
    #[serde(flatten)]
    pub parameters: BTreeMap<String, Value>,
}

impl ProvenanceSnapshot {
    pub fn build(context: &RunContext, code_revision: Option<String>) -> Result<Self, CatalogError> {
        Ok(Self {
            code_revision,
            run_args: join_run_args(&context.run_args),
            node_names: node_names(&context.pipeline),
            dataset_versions: dataset_versions(&context.catalog, &context.pipeline),
            parameters: collect_parameters(context)?,
        })
    }

    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}

/// `train:ratio` -> `kedro_train_ratio`.
pub fn sanitize_param(name: &str) -> String {
    format!("{}{}", defaults::PARAM_PREFIX, name.replace(':', "_"))
}

fn collect_parameters(context: &RunContext) -> Result<BTreeMap<String, Value>, CatalogError> {
    let mut parameters = BTreeMap::new();
    for input in context.pipeline.inputs() {
        if input.contains(defaults::PARAM_MARKER) {
            let value = context.catalog.load(&input)?;
            parameters.insert(input, value);
        }
    }

    for (name, value) in &context.extra_params {
        parameters.insert(name.clone(), value.clone());
    }

    let mut sanitized = BTreeMap::new();
    for (name, value) in parameters {
        let key = sanitize_param(&name);
        if RESERVED_KEYS.contains(&key.as_str()) {
            log::warn!("Parameter '{}' clashes with a provenance key; not recorded", name);
            continue;
        }
        sanitized.insert(key, value);
    }
    Ok(sanitized)
}

fn dataset_versions(catalog: &DataCatalog, pipeline: &Pipeline) -> Vec<DatasetVersion> {
    let outputs = pipeline.all_outputs();
    catalog
        .iter()
        .filter(|(name, _)| outputs.contains(*name))
        .filter_map(|(name, entry)| match entry.versioning {
            Versioning::Versioned { ref save, ref load } => Some(DatasetVersion {
                name: name.clone(),
                save_version: save.clone(),
                load_version: load.clone(),
            }),
            Versioning::Unversioned => None,
        })
        .collect()
}

fn node_names(pipeline: &Pipeline) -> Vec<String> {
    let mut names: Vec<String> = pipeline.nodes.iter().map(|n| n.short_name()).collect();
    names.sort();
    names
}

fn join_run_args(args: &[String]) -> String {
    args.iter()
        .map(|a| {
            if a.chars().any(char::is_whitespace) {
                quote_arg(a)
            } else {
                a.clone()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Single-quote unless the argument itself holds a single quote and no double quote.
fn quote_arg(arg: &str) -> String {
    if arg.contains('\'') && !arg.contains('"') {
        return format!("\"{}\"", arg.replace('\\', "\\\\"));
    }
    format!("'{}'", arg.replace('\\', "\\\\").replace('\'', "\\'"))
}
