//! Contract parameter preparation.
//!
//! Contracts declare typed inputs. Users supply either flat string forms
//! (CLI flags, query strings) or typed maps (programmatic callers). This
//! module resolves each declared field against the input and produces the
//! parameter map that goes into a [`Payload::ContractCall`](crate::transaction::Payload).

use std::collections::BTreeMap;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use thiserror::Error;
use tracing::debug;

use crate::transaction::{FileParam, ParamValue};
use crate::transport::ContractInfo;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParamError {
    #[error("parse param '{name}': {value}, {reason}")]
    Field {
        name: String,
        value: String,
        reason: String,
    },
}

impl ParamError {
    fn field(name: &str, value: &str, reason: impl ToString) -> Self {
        ParamError::Field {
            name: name.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Where parameter values come from.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamSource {
    /// Everything is a string.
    Form(BTreeMap<String, String>),
    /// Typed values. Required for `file`, `bytes` and `array` fields.
    Map(BTreeMap<String, ParamValue>),
}

impl Default for ParamSource {
    fn default() -> Self {
        ParamSource::Form(BTreeMap::new())
    }
}

impl ParamSource {
    /// Parse `a=1&b=two` style input.
    pub fn from_query(query: &str) -> Self {
        let form = url::form_urlencoded::parse(query.trim_start_matches('?').as_bytes())
            .into_owned()
            .collect();
        ParamSource::Form(form)
    }

    /// The value as text. Missing keys read as `None`.
    pub fn get(&self, key: &str) -> Option<String> {
        match self {
            ParamSource::Form(form) => form.get(key).cloned(),
            ParamSource::Map(map) => map.get(key).map(ParamValue::to_display_string),
        }
    }

    /// The typed value, only available from a [`ParamSource::Map`].
    pub fn get_raw(&self, key: &str) -> Option<&ParamValue> {
        match self {
            ParamSource::Form(_) => None,
            ParamSource::Map(map) => map.get(key),
        }
    }

    /// Whether `key` is present with a non-empty value.
    pub fn has(&self, key: &str) -> bool {
        self.get(key).is_some_and(|v| !v.is_empty())
    }
}

impl From<BTreeMap<String, String>> for ParamSource {
    fn from(form: BTreeMap<String, String>) -> Self {
        ParamSource::Form(form)
    }
}

impl From<BTreeMap<String, ParamValue>> for ParamSource {
    fn from(map: BTreeMap<String, ParamValue>) -> Self {
        ParamSource::Map(map)
    }
}

/// Resolve every field of `contract` from `source`. Fields without a value
/// are left out; the node decides whether they were optional. Fields of a
/// type this client does not know are left out too.
pub fn prepare_params(
    contract: &ContractInfo,
    source: &ParamSource,
) -> Result<BTreeMap<String, ParamValue>, ParamError> {
    let mut params = BTreeMap::new();
    for field in &contract.fields {
        let name = field.name.as_str();
        let value = match source.get(name) {
            Some(v) if !v.is_empty() => v,
            _ => continue,
        };

        let parsed = match field.kind.as_str() {
            "bool" => parse_bool(&value)
                .map(ParamValue::Bool)
                .ok_or_else(|| ParamError::field(name, &value, "invalid syntax"))?,
            "int" | "address" => value
                .trim()
                .parse::<i64>()
                .map(ParamValue::Int)
                .map_err(|e| ParamError::field(name, &value, e))?,
            "float" => value
                .trim()
                .parse::<f64>()
                .map(ParamValue::Float)
                .map_err(|e| ParamError::field(name, &value, e))?,
            "array" => {
                let items: Vec<serde_json::Value> =
                    serde_json::from_str(&value).map_err(|e| ParamError::field(name, &value, e))?;
                ParamValue::from(serde_json::Value::Array(items))
            }
            "map" => {
                let object: serde_json::Map<String, serde_json::Value> =
                    serde_json::from_str(&value).map_err(|e| ParamError::field(name, &value, e))?;
                ParamValue::from(serde_json::Value::Object(object))
            }
            "string" | "money" => ParamValue::String(value),
            "file" | "bytes" => {
                let raw = match source {
                    ParamSource::Map(_) => source.get_raw(name),
                    ParamSource::Form(_) => {
                        return Err(ParamError::field(name, &value, "requires a typed parameter map"))
                    }
                };
                let raw = raw.cloned().unwrap_or(ParamValue::Null);
                if field.kind == "file" {
                    ParamValue::File(to_file(name, &value, raw)?)
                } else {
                    raw
                }
            }
            other => {
                debug!(field = name, kind = other, "skipping field of unknown type");
                continue;
            }
        };
        params.insert(field.name.clone(), parsed);
    }
    Ok(params)
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim() {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}

/// A file is either already a [`FileParam`] or a map with `Name`, `MimeType`
/// and a `Body` given as bytes or base64 text.
fn to_file(name: &str, text: &str, raw: ParamValue) -> Result<FileParam, ParamError> {
    let map = match raw {
        ParamValue::File(file) => return Ok(file),
        ParamValue::Map(map) => map,
        _ => return Err(ParamError::field(name, text, "file must be a map")),
    };
    let string_field = |key: &str| match map.get(key) {
        Some(ParamValue::String(s)) => Ok(s.clone()),
        _ => Err(ParamError::field(name, text, format!("file {key} must be a string"))),
    };
    let file_name = string_field("Name")?;
    let mime_type = string_field("MimeType")?;
    let body = match map.get("Body") {
        Some(ParamValue::Bytes(b)) => b.clone(),
        Some(ParamValue::String(s)) => BASE64
            .decode(s)
            .map_err(|e| ParamError::field(name, text, format!("file Body: {e}")))?,
        None | Some(ParamValue::Null) => Vec::new(),
        _ => return Err(ParamError::field(name, text, "file Body must be bytes or base64")),
    };
    Ok(FileParam {
        name: file_name,
        mime_type,
        body,
    })
}
