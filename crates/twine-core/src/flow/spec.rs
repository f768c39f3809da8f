//! Flow document model and loader.
//!
//! A flow YAML declares inputs, outputs, and a map of named steps:
//!
//! ```yaml
//! name: "research"
//! description: "Gather then summarize"
//!
//! inputs:
//!   - name: topic
//!     type: string
//!     required: true
//!
//! outputs:
//!   - name: summary
//!     source: summarize.result
//!
//! steps:
//!   gather:
//!     prompt: gather
//!     inputs:
//!       query: "${inputs.topic}"
//!   summarize:
//!     prompt: summarize
//!     depends_on: [gather]
//!     inputs:
//!       text: "${gather.result}"
//! ```
//!
//! Parsing is eager: defaults are populated, the prompt/skill choice is
//! checked, and output sources are verified against the step map before a
//! spec is handed to the engine. Step declaration order is preserved; the
//! planner uses it to break ties deterministically.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use serde_json::Value;

use super::error::SpecError;
use crate::value::ValueType;

/// A flow input parameter.
#[derive(Debug, Clone)]
pub struct FlowInput {
    pub name: String,
    pub value_type: ValueType,
    pub description: String,
    pub required: bool,
    pub default: Option<Value>,
}

/// Maps a flow output name onto a field of a step's results.
#[derive(Debug, Clone)]
pub struct FlowOutput {
    pub name: String,
    /// Exactly `<step>.<field>`, no nesting.
    pub source: String,
    pub description: String,
}

/// Which external executor a step invokes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepKind {
    Prompt(String),
    Skill(String),
}

/// A single named step in a flow.
#[derive(Debug, Clone)]
pub struct FlowStep {
    pub name: String,
    pub kind: StepKind,
    /// Parameter name → template string.
    pub inputs: HashMap<String, String>,
    /// Declared result fields, used to wrap scalar executor results.
    pub outputs: Vec<String>,
    pub depends_on: Vec<String>,
    /// Reserved for conditional execution; parsed but never evaluated.
    pub when: Option<String>,
}

/// A complete, validated flow specification.
#[derive(Debug, Clone)]
pub struct FlowSpec {
    pub name: String,
    pub description: String,
    pub inputs: Vec<FlowInput>,
    pub outputs: Vec<FlowOutput>,
    steps: Vec<FlowStep>,
    index: HashMap<String, usize>,
}

impl FlowSpec {
    /// Parse a flow from a YAML string. The document must carry a `name`.
    pub fn from_yaml(yaml: &str) -> Result<Self, SpecError> {
        let raw: RawFlow = serde_yaml::from_str(yaml)?;
        Self::from_raw(raw, None)
    }

    /// Load a flow from a YAML file; the file stem names the flow when the
    /// document itself does not.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SpecError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SpecError::NotFound(path.to_path_buf()));
        }
        let contents = std::fs::read_to_string(path).map_err(|source| SpecError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let raw: RawFlow = serde_yaml::from_str(&contents)?;
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        Self::from_raw(raw, Some(stem))
    }

    /// Steps in declaration order.
    pub fn steps(&self) -> impl Iterator<Item = &FlowStep> {
        self.steps.iter()
    }

    pub fn step(&self, name: &str) -> Option<&FlowStep> {
        self.index.get(name).map(|&i| &self.steps[i])
    }

    pub fn contains_step(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    fn from_raw(raw: RawFlow, fallback_name: Option<String>) -> Result<Self, SpecError> {
        let name = raw
            .name
            .or(fallback_name)
            .filter(|n| !n.is_empty())
            .ok_or(SpecError::MissingField("name"))?;

        let inputs = raw
            .inputs
            .into_iter()
            .map(|input| {
                // Inputs with a default are optional unless marked otherwise.
                let required = input.required.unwrap_or(input.default.is_none());
                FlowInput {
                    name: input.name,
                    value_type: input.value_type,
                    description: input.description,
                    required,
                    default: input.default,
                }
            })
            .collect();

        let outputs: Vec<FlowOutput> = raw
            .outputs
            .into_iter()
            .map(|output| FlowOutput {
                name: output.name,
                source: output.source,
                description: output.description,
            })
            .collect();

        let mut steps = Vec::with_capacity(raw.steps.len());
        let mut index = HashMap::with_capacity(raw.steps.len());
        for (key, value) in raw.steps {
            let step_name = key
                .as_str()
                .ok_or_else(|| SpecError::InvalidStep {
                    step: format!("{:?}", key),
                    message: "step names must be strings".to_string(),
                })?
                .to_string();

            let raw_step: RawStep =
                serde_yaml::from_value(value).map_err(|e| SpecError::InvalidStep {
                    step: step_name.clone(),
                    message: e.to_string(),
                })?;

            let kind = match (raw_step.prompt, raw_step.skill) {
                (Some(prompt), None) => StepKind::Prompt(prompt),
                (None, Some(skill)) => StepKind::Skill(skill),
                (Some(_), Some(_)) => return Err(SpecError::AmbiguousExecutor(step_name)),
                (None, None) => return Err(SpecError::MissingExecutor(step_name)),
            };

            index.insert(step_name.clone(), steps.len());
            steps.push(FlowStep {
                name: step_name,
                kind,
                inputs: raw_step.inputs,
                outputs: raw_step.outputs,
                depends_on: raw_step.depends_on,
                when: raw_step.when,
            });
        }

        // Output sources must point at declared steps; field existence is
        // only knowable after the step has run.
        for output in &outputs {
            let parts: Vec<&str> = output.source.split('.').collect();
            if parts.len() != 2 || parts.iter().any(|p| p.is_empty()) {
                return Err(SpecError::InvalidOutputSource {
                    output: output.name.clone(),
                    source_value: output.source.clone(),
                });
            }
            if !index.contains_key(parts[0]) {
                return Err(SpecError::UnknownOutputStep {
                    output: output.name.clone(),
                    step: parts[0].to_string(),
                });
            }
        }

        Ok(Self {
            name,
            description: raw.description,
            inputs,
            outputs,
            steps,
            index,
        })
    }
}

#[derive(Debug, Deserialize)]
struct RawFlow {
    name: Option<String>,
    #[serde(default)]
    description: String,
    #[serde(default)]
    inputs: Vec<RawInput>,
    #[serde(default)]
    outputs: Vec<RawOutput>,
    /// Kept as a YAML mapping so declaration order survives parsing.
    #[serde(default)]
    steps: serde_yaml::Mapping,
}

#[derive(Debug, Deserialize)]
struct RawInput {
    name: String,
    #[serde(rename = "type", default)]
    value_type: ValueType,
    #[serde(default)]
    description: String,
    required: Option<bool>,
    #[serde(default)]
    default: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RawOutput {
    name: String,
    source: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct RawStep {
    prompt: Option<String>,
    skill: Option<String>,
    #[serde(default)]
    inputs: HashMap<String, String>,
    #[serde(default)]
    outputs: Vec<String>,
    #[serde(default)]
    depends_on: Vec<String>,
    #[serde(default)]
    when: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_minimal_flow() {
        let yaml = r#"
name: "hello"
steps:
  greet:
    prompt: greeter
    inputs:
      who: "world"
"#;
        let spec = FlowSpec::from_yaml(yaml).unwrap();
        assert_eq!(spec.name, "hello");
        assert_eq!(spec.step_count(), 1);
        let step = spec.step("greet").unwrap();
        assert_eq!(step.kind, StepKind::Prompt("greeter".to_string()));
        assert_eq!(step.inputs["who"], "world");
        assert!(step.depends_on.is_empty());
        assert!(step.when.is_none());
    }

    #[test]
    fn input_defaults_are_populated() {
        let yaml = r#"
name: "defaults"
inputs:
  - name: topic
  - name: limit
    type: int
    default: 5
  - name: strict
    type: bool
    required: true
    default: false
steps:
  only:
    skill: echo
"#;
        let spec = FlowSpec::from_yaml(yaml).unwrap();
        let topic = &spec.inputs[0];
        assert_eq!(topic.value_type, crate::value::ValueType::String);
        assert!(topic.required);
        assert!(topic.default.is_none());

        let limit = &spec.inputs[1];
        assert!(!limit.required);
        assert_eq!(limit.default, Some(json!(5)));

        // An explicit `required` wins over the has-default heuristic.
        assert!(spec.inputs[2].required);
    }

    #[test]
    fn step_needs_exactly_one_executor() {
        let neither = r#"
name: "bad"
steps:
  s:
    inputs: {}
"#;
        assert!(matches!(
            FlowSpec::from_yaml(neither),
            Err(SpecError::MissingExecutor(step)) if step == "s"
        ));

        let both = r#"
name: "bad"
steps:
  s:
    prompt: a
    skill: b
"#;
        assert!(matches!(
            FlowSpec::from_yaml(both),
            Err(SpecError::AmbiguousExecutor(step)) if step == "s"
        ));
    }

    #[test]
    fn output_source_shape_is_checked() {
        let yaml = r#"
name: "bad"
outputs:
  - name: out
    source: "lonely"
steps:
  lonely:
    prompt: p
"#;
        assert!(matches!(
            FlowSpec::from_yaml(yaml),
            Err(SpecError::InvalidOutputSource { .. })
        ));

        let yaml = r#"
name: "bad"
outputs:
  - name: out
    source: "ghost.field"
steps:
  real:
    prompt: p
"#;
        assert!(matches!(
            FlowSpec::from_yaml(yaml),
            Err(SpecError::UnknownOutputStep { output, step })
                if output == "out" && step == "ghost"
        ));
    }

    #[test]
    fn declaration_order_is_preserved() {
        let yaml = r#"
name: "ordered"
steps:
  zeta:
    prompt: p
  alpha:
    prompt: p
  mid:
    skill: s
"#;
        let spec = FlowSpec::from_yaml(yaml).unwrap();
        let names: Vec<&str> = spec.steps().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn missing_name_is_rejected() {
        let yaml = r#"
steps:
  s:
    prompt: p
"#;
        assert!(matches!(
            FlowSpec::from_yaml(yaml),
            Err(SpecError::MissingField("name"))
        ));
    }
}
