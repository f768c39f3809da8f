//! Value typing shared by flow inputs, prompt parameters, and skill inputs.
//!
//! YAML documents declare parameter types by name ("string", "int", ...);
//! values arriving from the CLI or from templates are plain strings and get
//! coerced here before they reach an executor.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Declared type of an input parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    #[default]
    #[serde(alias = "str")]
    String,
    #[serde(alias = "integer")]
    Int,
    #[serde(alias = "number")]
    Float,
    #[serde(alias = "boolean")]
    Bool,
    #[serde(alias = "array")]
    List,
}

impl std::fmt::Display for ValueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ValueType::String => "string",
            ValueType::Int => "int",
            ValueType::Float => "float",
            ValueType::Bool => "bool",
            ValueType::List => "list",
        };
        write!(f, "{}", s)
    }
}

impl ValueType {
    /// Coerce a dynamic value to this type.
    ///
    /// Strings are parsed ("true"/"1"/"yes"/"on"/"y" for bools, comma-split
    /// for lists); values already of the right shape pass through.
    pub fn coerce(&self, value: Value, param: &str) -> Result<Value, CoercionError> {
        let fail = |value: &Value| CoercionError {
            param: param.to_string(),
            expected: *self,
            got: value.clone(),
        };

        match self {
            ValueType::String => Ok(match value {
                Value::String(_) => value,
                Value::Number(n) => Value::String(n.to_string()),
                Value::Bool(b) => Value::String(b.to_string()),
                other => Value::String(other.to_string()),
            }),
            ValueType::Int => match &value {
                Value::Number(n) => n
                    .as_i64()
                    .or_else(|| n.as_f64().map(|f| f as i64))
                    .map(Value::from)
                    .ok_or_else(|| fail(&value)),
                Value::String(s) => s
                    .trim()
                    .parse::<i64>()
                    .map(Value::from)
                    .map_err(|_| fail(&value)),
                _ => Err(fail(&value)),
            },
            ValueType::Float => match &value {
                Value::Number(n) => n.as_f64().map(Value::from).ok_or_else(|| fail(&value)),
                Value::String(s) => s
                    .trim()
                    .parse::<f64>()
                    .map(Value::from)
                    .map_err(|_| fail(&value)),
                _ => Err(fail(&value)),
            },
            ValueType::Bool => match &value {
                Value::Bool(b) => Ok(Value::Bool(*b)),
                Value::Number(n) => Ok(Value::Bool(n.as_f64() != Some(0.0))),
                Value::String(s) => Ok(Value::Bool(matches!(
                    s.trim().to_ascii_lowercase().as_str(),
                    "true" | "1" | "yes" | "on" | "y"
                ))),
                _ => Err(fail(&value)),
            },
            ValueType::List => match value {
                Value::Array(_) => Ok(value),
                Value::String(s) => Ok(Value::Array(
                    s.split(',')
                        .map(str::trim)
                        .filter(|p| !p.is_empty())
                        .map(|p| Value::String(p.to_string()))
                        .collect(),
                )),
                other => Ok(Value::Array(vec![other])),
            },
        }
    }
}

/// Natural string form of a value: strings render verbatim, everything
/// else renders as JSON.
pub fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// A value could not be converted to its declared type.
#[derive(Debug, thiserror::Error)]
#[error("cannot convert input '{param}' to {expected}: got {got}")]
pub struct CoercionError {
    pub param: String,
    pub expected: ValueType,
    pub got: Value,
}
