//! Flow orchestration — chaining prompts and skills into a dependency graph.
//!
//! A flow document declares named steps, each invoking one prompt or one
//! skill. Steps may reference earlier steps' results through `${...}`
//! templates; those references, together with explicit `depends_on` lists,
//! form a directed acyclic graph that is validated and planned before
//! anything runs. Execution is strictly sequential in the planned order.

pub mod engine;
pub mod error;
pub mod graph;
pub mod spec;
pub mod template;

use std::path::{Path, PathBuf};

pub use engine::{ExecutionContext, FlowEngine, FlowOutcome, StepExecutor};
pub use error::{
    ExecutorError, FlowError, GraphError, OutputError, SpecError, StepExecutionError,
    TemplateError, ValidationError,
};
pub use graph::DependencyGraph;
pub use spec::{FlowInput, FlowOutput, FlowSpec, FlowStep, StepKind};

/// Name, description, and location of a discoverable flow.
#[derive(Debug, Clone)]
pub struct FlowSummary {
    pub name: String,
    pub description: String,
    pub path: PathBuf,
}

/// Enumerate the loadable flows in a directory.
///
/// Files that fail to parse are skipped with a warning rather than failing
/// the whole listing.
pub fn list_flows(dir: &Path) -> Vec<FlowSummary> {
    let pattern = dir.join("*.yaml").to_string_lossy().to_string();
    let mut flows = Vec::new();

    let Ok(paths) = glob::glob(&pattern) else {
        return flows;
    };
    for path in paths.flatten() {
        match FlowSpec::from_file(&path) {
            Ok(spec) => flows.push(FlowSummary {
                name: spec.name,
                description: spec.description,
                path,
            }),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "skipping unloadable flow");
            }
        }
    }

    flows.sort_by(|a, b| a.name.cmp(&b.name));
    flows
}
