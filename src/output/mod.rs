//! Decoding of Terraform's machine-readable output.
//!
//! `terraform output -json` yields an object mapping each output name to
//! `{"sensitive": bool, "type": <type>, "value": <value>}`. Outputs declared
//! as `string` keep their raw value; every other type is re-encoded as
//! canonical JSON (RFC 8785, sorted keys) so callers always receive one
//! string per output.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

const TYPE_FIELD: &str = "type";
const VALUE_FIELD: &str = "value";
const SENSITIVE_FIELD: &str = "sensitive";
const STRING_TYPE: &str = "string";

/// Errors raised while decoding Terraform JSON documents.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum DecodeError {
    /// Raised when the document is not valid JSON of the expected shape.
    #[error("unable to decode terraform {document}: {message}")]
    Malformed {
        /// Document being decoded (`output` or `version`).
        document: String,
        /// Parser error message.
        message: String,
    },
    /// Raised when an output entry lacks a required field.
    #[error("terraform output {name} is missing the {field} field")]
    MissingField {
        /// Output name.
        name: String,
        /// Missing field name.
        field: String,
    },
    /// Raised when an output declared as `string` holds another JSON type.
    #[error("terraform output {name} is declared as string but holds {found}")]
    TypeMismatch {
        /// Output name.
        name: String,
        /// JSON type actually found.
        found: String,
    },
    /// Raised when a structured value cannot be re-encoded.
    #[error("unable to marshal value for terraform output {name}: {message}")]
    Render {
        /// Output name.
        name: String,
        /// Serialiser error message.
        message: String,
    },
}

/// Value of a single output before it is flattened to a string.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum OutputValue {
    /// Output declared with type `string`.
    String(String),
    /// Any other output: lists, maps, objects, numbers, booleans, null.
    Structured(Value),
}

impl OutputValue {
    /// Flattens the value to the string handed to callers.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::Render`] if a structured value cannot be
    /// serialised.
    pub fn render(&self, name: &str) -> Result<String, DecodeError> {
        match self {
            Self::String(raw) => Ok(raw.clone()),
            Self::Structured(value) => {
                let render_error = |message: String| DecodeError::Render {
                    name: name.to_owned(),
                    message,
                };
                let bytes = serde_json_canonicalizer::to_vec(value)
                    .map_err(|err| render_error(err.to_string()))?;
                String::from_utf8(bytes).map_err(|err| render_error(err.to_string()))
            }
        }
    }
}

/// One decoded output entry.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct OutputEntry {
    /// Whether Terraform marked the output as sensitive. Sensitive outputs are
    /// still returned; `-json` exposes them too.
    pub sensitive: bool,
    /// Typed value of the output.
    pub value: OutputValue,
}

/// Decodes `terraform output -json` bytes into typed entries.
///
/// Empty or whitespace-only input decodes to an empty map.
///
/// # Errors
///
/// Returns [`DecodeError`] when the input is not an object of objects, an
/// entry lacks `type` or `value`, or a `string` output holds a non-string.
pub fn decode_entries(bytes: &[u8]) -> Result<BTreeMap<String, OutputEntry>, DecodeError> {
    if bytes.trim_ascii().is_empty() {
        return Ok(BTreeMap::new());
    }

    let document: Map<String, Value> =
        serde_json::from_slice(bytes).map_err(|err| DecodeError::Malformed {
            document: String::from("output"),
            message: err.to_string(),
        })?;

    document
        .into_iter()
        .map(|(name, raw)| -> Result<(String, OutputEntry), DecodeError> {
            let entry = decode_entry(&name, raw)?;
            Ok((name, entry))
        })
        .collect()
}

/// Decodes `terraform output -json` bytes into one string per output.
///
/// The key set of the result equals the key set of the document.
///
/// # Errors
///
/// Returns [`DecodeError`] under the same conditions as [`decode_entries`].
pub fn decode(bytes: &[u8]) -> Result<BTreeMap<String, String>, DecodeError> {
    decode_entries(bytes)?
        .into_iter()
        .map(|(name, entry)| -> Result<(String, String), DecodeError> {
            let rendered = entry.value.render(&name)?;
            Ok((name, rendered))
        })
        .collect()
}

fn decode_entry(name: &str, raw: Value) -> Result<OutputEntry, DecodeError> {
    let mut fields = match raw {
        Value::Object(fields) => fields,
        other => {
            return Err(DecodeError::Malformed {
                document: String::from("output"),
                message: format!("entry {name} is {}, expected an object", json_type(&other)),
            });
        }
    };

    let declared = fields
        .remove(TYPE_FIELD)
        .ok_or_else(|| missing_field(name, TYPE_FIELD))?;
    let value = fields
        .remove(VALUE_FIELD)
        .ok_or_else(|| missing_field(name, VALUE_FIELD))?;
    let sensitive = fields
        .get(SENSITIVE_FIELD)
        .and_then(Value::as_bool)
        .unwrap_or(false);

    let value = if declared.as_str() == Some(STRING_TYPE) {
        match value {
            Value::String(raw_string) => OutputValue::String(raw_string),
            other => {
                return Err(DecodeError::TypeMismatch {
                    name: name.to_owned(),
                    found: json_type(&other).to_owned(),
                });
            }
        }
    } else {
        OutputValue::Structured(value)
    };

    Ok(OutputEntry { sensitive, value })
}

fn missing_field(name: &str, field: &str) -> DecodeError {
    DecodeError::MissingField {
        name: name.to_owned(),
        field: field.to_owned(),
    }
}

const fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[derive(Debug, Deserialize)]
struct VersionReport {
    #[serde(rename = "terraform_version", alias = "version")]
    version: String,
}

/// Extracts the Terraform version from `terraform version -json` bytes.
///
/// # Errors
///
/// Returns [`DecodeError::Malformed`] when the document is not JSON or has no
/// version field.
pub fn decode_version(bytes: &[u8]) -> Result<String, DecodeError> {
    serde_json::from_slice::<VersionReport>(bytes)
        .map(|report| report.version)
        .map_err(|err| DecodeError::Malformed {
            document: String::from("version"),
            message: err.to_string(),
        })
}
