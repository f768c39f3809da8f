//! Error taxonomy for flow loading, planning, and execution.
//!
//! Every error here is fatal to the `execute()` call that raised it: there
//! is no retry and no partial result. The CLI layer decides presentation.

use std::path::PathBuf;

/// Opaque failure from an external executor (LLM call or skill process).
pub type ExecutorError = Box<dyn std::error::Error + Send + Sync>;

/// The flow document is unreadable, malformed, or internally inconsistent.
#[derive(Debug, thiserror::Error)]
pub enum SpecError {
    #[error("flow file not found: {0}")]
    NotFound(PathBuf),

    #[error("failed to read flow file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid YAML in flow file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("flow is missing required field '{0}'")]
    MissingField(&'static str),

    #[error("step '{0}' must have either a 'prompt' or a 'skill' key")]
    MissingExecutor(String),

    #[error("step '{0}' cannot have both 'prompt' and 'skill' keys")]
    AmbiguousExecutor(String),

    #[error("invalid step definition '{step}': {message}")]
    InvalidStep { step: String, message: String },

    #[error("output '{output}' has invalid source '{source_value}': expected 'step.field'")]
    InvalidOutputSource { output: String, source_value: String },

    #[error("output '{output}' references unknown step '{step}'")]
    UnknownOutputStep { output: String, step: String },
}

/// The dependency graph references a missing step or contains a cycle.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("step '{step}' depends on unknown step '{dependency}'")]
    UnknownDependency { step: String, dependency: String },

    #[error("step '{step}' references unknown step '{reference}'")]
    UnknownReference { step: String, reference: String },

    #[error("flow contains a dependency cycle involving: {}", members.join(", "))]
    Cycle { members: Vec<String> },
}

/// A required flow input was not supplied at execution time.
#[derive(Debug, thiserror::Error)]
#[error("required input '{input}' is missing")]
pub struct ValidationError {
    pub input: String,
}

/// A `${...}` reference could not be resolved against the execution context.
#[derive(Debug, thiserror::Error)]
#[error("failed to resolve template variable '{path}'")]
pub struct TemplateError {
    pub path: String,
}

/// An external executor failed while running a step.
#[derive(Debug, thiserror::Error)]
#[error("step '{step}' failed: {source}")]
pub struct StepExecutionError {
    pub step: String,
    #[source]
    pub source: ExecutorError,
}

/// A declared flow output could not be resolved after all steps ran.
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    #[error("invalid output source '{source_value}' for output '{output}': expected 'step.field'")]
    InvalidSource { output: String, source_value: String },

    #[error("output '{output}' references step '{step}' which produced no results")]
    MissingStep { output: String, step: String },

    #[error("output '{output}': field '{field}' not found in step '{step}' results")]
    MissingField {
        output: String,
        step: String,
        field: String,
    },
}

/// Any failure surfaced by a flow `execute()` call.
#[derive(Debug, thiserror::Error)]
pub enum FlowError {
    #[error(transparent)]
    Spec(#[from] SpecError),
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error(transparent)]
    Step(#[from] StepExecutionError),
    #[error(transparent)]
    Output(#[from] OutputError),
}
