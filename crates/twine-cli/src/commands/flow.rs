//! `twine flow` — run, list, and inspect flows.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;
use twine_core::flow::{self, DependencyGraph, FlowEngine, FlowOutcome, FlowSpec};
use twine_core::LocalExecutor;

use super::progress::TerminalReporter;
use super::{collect_flow_inputs, truncate};

pub struct RunOptions {
    pub dry_run: bool,
    pub output: Option<PathBuf>,
    pub json: bool,
    pub params: Vec<String>,
    pub quiet: bool,
    pub verbose: bool,
}

/// Execute a flow by name.
pub async fn run(
    flows_dir: &Path,
    prompts_dir: &Path,
    skills_dir: &Path,
    name: &str,
    options: RunOptions,
) -> Result<(), String> {
    let spec = load(flows_dir, name)?;
    let inputs = collect_flow_inputs(&spec, &options.params)?;

    let mut executor = LocalExecutor::new(prompts_dir, skills_dir);
    let reporter = Arc::new(TerminalReporter::new(options.verbose));
    if !options.quiet {
        executor = executor.with_progress(reporter.clone());
    }

    let mut engine = FlowEngine::new(spec, executor).map_err(|e| e.to_string())?;
    if !options.quiet {
        engine = engine.with_progress(reporter);
    }

    let outcome = engine
        .execute(inputs, options.dry_run)
        .await
        .map_err(|e| e.to_string())?;

    match outcome {
        FlowOutcome::DryRun { order } => {
            println!("DRY RUN - Flow execution plan:");
            println!("Execution order: {}", order.join(" -> "));
            Ok(())
        }
        FlowOutcome::Completed { outputs } => write_outputs(&outputs, &options),
    }
}

fn write_outputs(outputs: &HashMap<String, Value>, options: &RunOptions) -> Result<(), String> {
    let rendered = if options.json {
        serde_json::to_string_pretty(outputs).map_err(|e| e.to_string())?
    } else {
        let mut lines: Vec<String> = outputs
            .iter()
            .map(|(name, value)| format!("{}: {}", name, twine_core::value::display(value)))
            .collect();
        lines.sort();
        lines.join("\n")
    };

    match &options.output {
        Some(path) => {
            std::fs::write(path, rendered + "\n")
                .map_err(|e| format!("error writing output file '{}': {}", path.display(), e))?;
            tracing::info!(path = %path.display(), "flow output written");
            Ok(())
        }
        None => {
            println!("{}", rendered);
            Ok(())
        }
    }
}

/// List available flows.
pub fn list(flows_dir: &Path) -> Result<(), String> {
    let flows = flow::list_flows(flows_dir);
    if flows.is_empty() {
        println!("No flows found in {}", flows_dir.display());
        return Ok(());
    }

    println!("\nAvailable flows ({} total):", flows.len());
    println!("{:<20} {:<60}", "Name", "Description");
    println!("{}", "-".repeat(80));
    for flow in flows {
        println!(
            "{:<20} {:<60}",
            flow.name,
            truncate(&flow.description, 60)
        );
    }
    Ok(())
}

/// Show a flow's inputs, outputs, and steps.
pub fn show(flows_dir: &Path, name: &str) -> Result<(), String> {
    let spec = load(flows_dir, name)?;

    let banner = format!("Flow: {}", spec.name);
    println!("\n{}\n{}", banner, "=".repeat(banner.len()));
    if !spec.description.is_empty() {
        println!("Description: {}\n", spec.description);
    }

    if spec.inputs.is_empty() {
        println!("No inputs defined.");
    } else {
        println!("Inputs ({}):", spec.inputs.len());
        for input in &spec.inputs {
            let status = if input.required { "REQUIRED" } else { "OPTIONAL" };
            println!("  {:<20} ({}) [{}]", input.name, input.value_type, status);
            if !input.description.is_empty() {
                println!("    {}", input.description);
            }
            if let Some(default) = &input.default {
                println!("    Default: {}", default);
            }
        }
    }

    if !spec.outputs.is_empty() {
        println!("\nOutputs ({}):", spec.outputs.len());
        for output in &spec.outputs {
            println!("  {:<20} <- {}", output.name, output.source);
        }
    }

    println!("\nSteps ({}):", spec.step_count());
    for step in spec.steps() {
        let executor = match &step.kind {
            twine_core::flow::StepKind::Prompt(p) => format!("prompt: {}", p),
            twine_core::flow::StepKind::Skill(s) => format!("skill: {}", s),
        };
        println!("  {:<20} ({})", step.name, executor);
        if !step.depends_on.is_empty() {
            println!("    Depends on: {}", step.depends_on.join(", "));
        }
    }
    Ok(())
}

/// Print a flow's dependency graph and planned order.
pub fn graph(flows_dir: &Path, name: &str) -> Result<(), String> {
    let spec = load(flows_dir, name)?;
    let graph = DependencyGraph::build(&spec).map_err(|e| e.to_string())?;
    let order = graph.execution_order().map_err(|e| e.to_string())?;

    println!("\nDependency graph for flow '{}':", name);
    println!("{}", "-".repeat(50));
    println!("Execution order: {}", order.join(" -> "));

    println!("\nStep dependencies:");
    for step in spec.steps() {
        let mut deps: Vec<String> = step.depends_on.clone();
        for template in step.inputs.values() {
            for reference in flow::template::extract_step_references(template) {
                if !deps.contains(&reference) {
                    deps.push(reference);
                }
            }
        }
        if deps.is_empty() {
            println!("  {} (no dependencies)", step.name);
        } else {
            println!("  {} depends on: {}", step.name, deps.join(", "));
        }
    }
    Ok(())
}

/// Validate a flow without running anything.
pub fn test(flows_dir: &Path, name: &str) -> Result<(), String> {
    let spec = load(flows_dir, name)?;
    let graph = DependencyGraph::build(&spec).map_err(|e| e.to_string())?;
    let order = graph.execution_order().map_err(|e| e.to_string())?;

    println!("\n✓ Flow '{}' validation successful", name);
    println!("Steps: {}", spec.step_count());
    println!("Inputs: {}", spec.inputs.len());
    println!("Outputs: {}", spec.outputs.len());
    println!("Execution order: {}", order.join(" -> "));
    Ok(())
}

fn load(flows_dir: &Path, name: &str) -> Result<FlowSpec, String> {
    let path = flows_dir.join(format!("{}.yaml", name));
    FlowSpec::from_file(&path).map_err(|e| e.to_string())
}
