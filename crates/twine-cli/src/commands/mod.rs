//! Shared command helpers.

pub mod flow;
pub mod history;
pub mod progress;
pub mod prompt;
pub mod skill;

use std::collections::HashMap;

use serde_json::Value;
use twine_core::flow::FlowSpec;

/// Split a `--param name=value` argument.
pub fn parse_param(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.to_string()))
        }
        _ => Err(format!(
            "invalid parameter '{}': expected name=value",
            raw
        )),
    }
}

/// Collect raw `--param` pairs into a value map; pairs naming a declared
/// flow input are coerced to the declared type, the rest stay strings.
pub fn collect_flow_inputs(
    spec: &FlowSpec,
    params: &[String],
) -> Result<HashMap<String, Value>, String> {
    let mut inputs = HashMap::new();
    for raw in params {
        let (name, value) = parse_param(raw)?;
        let value = match spec.inputs.iter().find(|i| i.name == name) {
            Some(input) => input
                .value_type
                .coerce(Value::String(value), &name)
                .map_err(|e| e.to_string())?,
            None => Value::String(value),
        };
        inputs.insert(name, value);
    }
    Ok(inputs)
}

/// Collect raw `--param` pairs into a plain string-valued map; prompt and
/// skill specs coerce declared types themselves.
pub fn collect_params(params: &[String]) -> Result<HashMap<String, Value>, String> {
    let mut collected = HashMap::new();
    for raw in params {
        let (name, value) = parse_param(raw)?;
        collected.insert(name, Value::String(value));
    }
    Ok(collected)
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}
