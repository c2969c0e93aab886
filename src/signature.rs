//! Model signatures: the input/output schema attached to a saved model.
//!
//! Configuration supplies a signature as a dict of JSON strings:
//! `{"inputs": "[{\"name\": \"amount\", \"type\": \"double\"}]", "outputs": "..."}`.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while building a signature.
#[derive(Error, Debug)]
pub enum SignatureError {
    #[error("signature is missing required key '{0}'")]
    MissingKey(&'static str),

    #[error("signature has unknown key '{0}'")]
    UnknownKey(String),

    #[error("signature '{key}' is not a valid schema: {source}")]
    Schema {
        key: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("signature '{0}' schema is empty")]
    EmptySchema(&'static str),

    #[error("signature '{0}' mixes named and unnamed columns")]
    MixedNames(&'static str),
}

/// Column data types accepted in a column-based schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Boolean,
    Integer,
    Long,
    Float,
    Double,
    String,
    Binary,
    Datetime,
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Boolean => "boolean",
            Self::Integer => "integer",
            Self::Long => "long",
            Self::Float => "float",
            Self::Double => "double",
            Self::String => "string",
            Self::Binary => "binary",
            Self::Datetime => "datetime",
        };
        f.write_str(name)
    }
}

/// Shape and numpy dtype of a tensor input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TensorInfo {
    pub dtype: String,
    pub shape: Vec<i64>,
}

/// Marker for the `"type": "tensor"` field of a tensor spec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TensorTag {
    #[serde(rename = "tensor")]
    Tensor,
}

/// One entry of a schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnSpec {
    Tensor {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(rename = "type")]
        tag: TensorTag,
        #[serde(rename = "tensor-spec")]
        tensor_spec: TensorInfo,
    },
    Column {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(rename = "type")]
        data_type: DataType,
    },
}

impl ColumnSpec {
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Tensor { name, .. } | Self::Column { name, .. } => name.as_deref(),
        }
    }
}

/// Ordered list of column specs.
pub type Schema = Vec<ColumnSpec>;

/// Input and optional output schema of a model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSignature {
    pub inputs: Schema,
    pub outputs: Option<Schema>,
}

impl ModelSignature {
    /// Build a signature from its dict form. Fails before any I/O happens.
    pub fn from_dict(dict: &BTreeMap<String, String>) -> Result<Self, SignatureError> {
        if let Some(unknown) = dict.keys().find(|k| *k != "inputs" && *k != "outputs") {
            return Err(SignatureError::UnknownKey(unknown.clone()));
        }

        let inputs = dict
            .get("inputs")
            .ok_or(SignatureError::MissingKey("inputs"))
            .and_then(|raw| parse_schema("inputs", raw))?;

        let outputs = dict
            .get("outputs")
            .map(|raw| parse_schema("outputs", raw))
            .transpose()?;

        Ok(Self { inputs, outputs })
    }

    /// Dict form with each schema rendered as a JSON string.
    pub fn to_dict(&self) -> BTreeMap<String, String> {
        let mut dict = BTreeMap::new();
        dict.insert("inputs".to_string(), render_schema(&self.inputs));
        if let Some(ref outputs) = self.outputs {
            dict.insert("outputs".to_string(), render_schema(outputs));
        }
        dict
    }
}

fn parse_schema(key: &'static str, raw: &str) -> Result<Schema, SignatureError> {
    let schema: Schema =
        serde_json::from_str(raw).map_err(|source| SignatureError::Schema { key, source })?;

    if schema.is_empty() {
        return Err(SignatureError::EmptySchema(key));
    }

    let named = schema.iter().filter(|c| c.name().is_some()).count();
    if named != 0 && named != schema.len() {
        return Err(SignatureError::MixedNames(key));
    }

    Ok(schema)
}

fn render_schema(schema: &Schema) -> String {
    serde_json::to_string(schema).unwrap_or_default()
}
