//! Flow execution engine.
//!
//! The engine wires the loader, graph, planner, and template resolver
//! together behind one `execute(inputs, dry_run)` entry point. Steps are
//! dispatched strictly sequentially in the planned order; the first failure
//! aborts the run and no partial outputs are returned.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use super::error::{
    ExecutorError, FlowError, OutputError, StepExecutionError, ValidationError,
};
use super::graph::DependencyGraph;
use super::spec::{FlowSpec, FlowStep, StepKind};
use super::template;
use crate::progress::{ProgressEvent, ProgressKind, ProgressSink};

/// Boundary to the external executors a step can invoke.
///
/// Implementations run a named prompt against a text-generation backend, or
/// a named skill as a sandboxed process. Either may return a structured
/// mapping or a bare scalar; failures are opaque to the engine and abort the
/// flow as a step failure.
#[allow(async_fn_in_trait)]
pub trait StepExecutor {
    async fn invoke_prompt(
        &self,
        reference: &str,
        inputs: HashMap<String, String>,
    ) -> Result<Value, ExecutorError>;

    async fn invoke_skill(
        &self,
        reference: &str,
        inputs: HashMap<String, String>,
    ) -> Result<Value, ExecutorError>;
}

/// Per-execution accumulator of flow inputs and completed step results.
///
/// Owned by exactly one `execute()` call, mutated append-only as steps
/// finish, and discarded when the call returns.
pub struct ExecutionContext {
    inputs: HashMap<String, Value>,
    results: HashMap<String, HashMap<String, Value>>,
}

impl ExecutionContext {
    pub fn new(inputs: HashMap<String, Value>) -> Self {
        Self {
            inputs,
            results: HashMap::new(),
        }
    }

    /// Record a completed step's results.
    pub fn record(&mut self, step: &str, result: HashMap<String, Value>) {
        self.results.insert(step.to_string(), result);
    }

    pub fn results(&self) -> &HashMap<String, HashMap<String, Value>> {
        &self.results
    }

    /// Walk a dot-separated path: `inputs.<name>…` or `<step>.<field>…`.
    /// Segments beyond the first two index into nested objects.
    pub(crate) fn get(&self, path: &str) -> Option<Value> {
        let mut segments = path.split('.');
        let first = segments.next()?;

        let mut current: Value = if first == "inputs" {
            match segments.next() {
                Some(name) => self.inputs.get(name)?.clone(),
                None => Value::Object(self.inputs.clone().into_iter().collect()),
            }
        } else {
            let step_results = self.results.get(first)?;
            match segments.next() {
                Some(field) => step_results.get(field)?.clone(),
                None => Value::Object(step_results.clone().into_iter().collect()),
            }
        };

        for segment in segments {
            current = current.as_object()?.get(segment)?.clone();
        }
        Some(current)
    }
}

/// Outcome of [`FlowEngine::execute`].
#[derive(Debug)]
pub enum FlowOutcome {
    /// Dry run: the planned execution order. Nothing was dispatched.
    DryRun { order: Vec<String> },
    /// Every step ran; these are the reduced, declared outputs.
    Completed { outputs: HashMap<String, Value> },
}

/// Executes a flow spec against a [`StepExecutor`].
pub struct FlowEngine<E> {
    spec: FlowSpec,
    executor: E,
    order: Vec<String>,
    sink: Option<Arc<dyn ProgressSink>>,
}

impl<E: StepExecutor> FlowEngine<E> {
    /// Build the dependency graph and plan the execution order up front.
    /// Unknown references and cycles surface here, not during execution.
    pub fn new(spec: FlowSpec, executor: E) -> Result<Self, FlowError> {
        let graph = DependencyGraph::build(&spec)?;
        let order = graph.execution_order()?;
        tracing::debug!(flow = %spec.name, steps = order.len(), "flow planned");
        Ok(Self {
            spec,
            executor,
            order,
            sink: None,
        })
    }

    pub fn with_progress(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn spec(&self) -> &FlowSpec {
        &self.spec
    }

    /// The planned topological order.
    pub fn execution_order(&self) -> &[String] {
        &self.order
    }

    /// Run the flow. With `dry_run` the planned order is returned and no
    /// executor is invoked. Required inputs are validated either way.
    pub async fn execute(
        &self,
        inputs: HashMap<String, Value>,
        dry_run: bool,
    ) -> Result<FlowOutcome, FlowError> {
        tracing::info!(flow = %self.spec.name, dry_run, "starting flow execution");
        self.emit(
            ProgressEvent::new(
                ProgressKind::FlowStart,
                format!("Starting flow: {}", self.spec.name),
            )
            .with_total(self.order.len()),
        );

        match self.execute_inner(inputs, dry_run).await {
            Ok(FlowOutcome::Completed { outputs }) => {
                tracing::info!(
                    flow = %self.spec.name,
                    outputs = outputs.len(),
                    "flow completed"
                );
                self.emit(
                    ProgressEvent::new(
                        ProgressKind::FlowComplete,
                        format!("Completed flow: {}", self.spec.name),
                    )
                    .with_total(self.order.len()),
                );
                Ok(FlowOutcome::Completed { outputs })
            }
            Ok(dry) => Ok(dry),
            Err(e) => {
                self.emit(ProgressEvent::new(
                    ProgressKind::FlowError,
                    format!("Flow '{}' failed: {}", self.spec.name, e),
                ));
                Err(e)
            }
        }
    }

    async fn execute_inner(
        &self,
        mut inputs: HashMap<String, Value>,
        dry_run: bool,
    ) -> Result<FlowOutcome, FlowError> {
        self.validate_inputs(&mut inputs)?;

        if dry_run {
            tracing::info!(order = ?self.order, "dry run, skipping dispatch");
            return Ok(FlowOutcome::DryRun {
                order: self.order.clone(),
            });
        }

        let outputs = self.run_steps(inputs).await?;
        Ok(FlowOutcome::Completed { outputs })
    }

    async fn run_steps(
        &self,
        inputs: HashMap<String, Value>,
    ) -> Result<HashMap<String, Value>, FlowError> {
        let mut context = ExecutionContext::new(inputs);
        let total = self.order.len();

        for (i, name) in self.order.iter().enumerate() {
            let step = self
                .spec
                .step(name)
                .expect("planned order only contains declared steps");

            self.emit(
                ProgressEvent::new(
                    ProgressKind::FlowStepStart,
                    format!("Executing step: {}", name),
                )
                .with_step(name, i + 1, total),
            );

            match self.dispatch(step, &context).await {
                Ok(result) => {
                    self.emit(
                        ProgressEvent::new(
                            ProgressKind::FlowStepComplete,
                            format!("Completed step: {}", name),
                        )
                        .with_step(name, i + 1, total),
                    );
                    context.record(name, result);
                }
                Err(e) => {
                    self.emit(
                        ProgressEvent::new(
                            ProgressKind::FlowError,
                            format!("Step '{}' failed: {}", name, e),
                        )
                        .with_step(name, i + 1, total),
                    );
                    return Err(e);
                }
            }
        }

        self.resolve_outputs(context.results())
    }

    /// Resolve a step's input templates, invoke its executor, and shape the
    /// result into a field map.
    async fn dispatch(
        &self,
        step: &FlowStep,
        context: &ExecutionContext,
    ) -> Result<HashMap<String, Value>, FlowError> {
        tracing::info!(step = %step.name, "executing flow step");

        let mut resolved = HashMap::with_capacity(step.inputs.len());
        for (param, input_template) in &step.inputs {
            resolved.insert(param.clone(), template::resolve(input_template, context)?);
        }

        let invoked = match &step.kind {
            StepKind::Prompt(reference) => self.executor.invoke_prompt(reference, resolved).await,
            StepKind::Skill(reference) => self.executor.invoke_skill(reference, resolved).await,
        };

        let value = invoked.map_err(|source| StepExecutionError {
            step: step.name.clone(),
            source,
        })?;

        Ok(shape_result(step, value))
    }

    fn validate_inputs(&self, inputs: &mut HashMap<String, Value>) -> Result<(), ValidationError> {
        for input in &self.spec.inputs {
            if inputs.contains_key(&input.name) {
                continue;
            }
            if let Some(default) = &input.default {
                inputs.insert(input.name.clone(), default.clone());
            } else if input.required {
                return Err(ValidationError {
                    input: input.name.clone(),
                });
            }
            // Optional and defaultless: stays absent. A template that needs
            // it will fail resolution for that step.
        }
        Ok(())
    }

    fn resolve_outputs(
        &self,
        results: &HashMap<String, HashMap<String, Value>>,
    ) -> Result<HashMap<String, Value>, FlowError> {
        let mut outputs = HashMap::with_capacity(self.spec.outputs.len());
        for output in &self.spec.outputs {
            let parts: Vec<&str> = output.source.split('.').collect();
            let [step, field] = parts[..] else {
                return Err(OutputError::InvalidSource {
                    output: output.name.clone(),
                    source_value: output.source.clone(),
                }
                .into());
            };
            let step_results = results.get(step).ok_or_else(|| OutputError::MissingStep {
                output: output.name.clone(),
                step: step.to_string(),
            })?;
            let value = step_results
                .get(field)
                .ok_or_else(|| OutputError::MissingField {
                    output: output.name.clone(),
                    step: step.to_string(),
                    field: field.to_string(),
                })?;
            outputs.insert(output.name.clone(), value.clone());
        }
        Ok(outputs)
    }

    fn emit(&self, event: ProgressEvent) {
        if let Some(sink) = &self.sink {
            sink.notify(&event);
        }
    }
}

/// Structured results pass through; bare scalars are wrapped under the
/// step's first declared output, or `"result"` when none is declared.
fn shape_result(step: &FlowStep, value: Value) -> HashMap<String, Value> {
    match value {
        Value::Object(map) => map.into_iter().collect(),
        scalar => {
            let key = step
                .outputs
                .first()
                .cloned()
                .unwrap_or_else(|| "result".to_string());
            HashMap::from([(key, scalar)])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    /// Echoes each call as `<kind>:<reference>:<sorted inputs>` and records
    /// the dispatch order.
    #[derive(Default)]
    struct EchoExecutor {
        calls: Mutex<Vec<String>>,
        fail_on: Option<String>,
    }

    impl EchoExecutor {
        fn failing_on(reference: &str) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                fail_on: Some(reference.to_string()),
            }
        }

        fn echo(
            &self,
            kind: &str,
            reference: &str,
            inputs: HashMap<String, String>,
        ) -> Result<Value, ExecutorError> {
            self.calls.lock().unwrap().push(reference.to_string());
            if self.fail_on.as_deref() == Some(reference) {
                return Err("backend exploded".into());
            }
            let mut parts: Vec<String> = inputs.into_values().collect();
            parts.sort();
            Ok(json!({ "result": format!("{}:{}:{}", kind, reference, parts.join("+")) }))
        }
    }

    impl StepExecutor for EchoExecutor {
        async fn invoke_prompt(
            &self,
            reference: &str,
            inputs: HashMap<String, String>,
        ) -> Result<Value, ExecutorError> {
            self.echo("prompt", reference, inputs)
        }

        async fn invoke_skill(
            &self,
            reference: &str,
            inputs: HashMap<String, String>,
        ) -> Result<Value, ExecutorError> {
            self.echo("skill", reference, inputs)
        }
    }

    /// Returns a bare scalar instead of a mapping.
    struct ScalarExecutor;

    impl StepExecutor for ScalarExecutor {
        async fn invoke_prompt(
            &self,
            _reference: &str,
            _inputs: HashMap<String, String>,
        ) -> Result<Value, ExecutorError> {
            Ok(json!("just text"))
        }

        async fn invoke_skill(
            &self,
            _reference: &str,
            _inputs: HashMap<String, String>,
        ) -> Result<Value, ExecutorError> {
            Ok(json!(42))
        }
    }

    fn research_spec() -> FlowSpec {
        FlowSpec::from_yaml(
            r#"
name: "research"
inputs:
  - name: topic
    required: true
outputs:
  - name: summary
    source: summarize.result
steps:
  gather:
    prompt: gather
    inputs:
      query: "${inputs.topic}"
  summarize:
    prompt: summarize
    depends_on: [gather]
    inputs:
      text: "${gather.result}"
"#,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn results_thread_through_to_declared_outputs() {
        let engine = FlowEngine::new(research_spec(), EchoExecutor::default()).unwrap();
        let outcome = engine
            .execute(HashMap::from([("topic".to_string(), json!("bees"))]), false)
            .await
            .unwrap();

        let FlowOutcome::Completed { outputs } = outcome else {
            panic!("expected completion");
        };
        assert_eq!(
            outputs["summary"],
            json!("prompt:summarize:prompt:gather:bees")
        );

        let calls = engine.executor.calls.lock().unwrap();
        assert_eq!(*calls, vec!["gather", "summarize"]);
    }

    #[tokio::test]
    async fn dry_run_dispatches_nothing() {
        let engine = FlowEngine::new(research_spec(), EchoExecutor::default()).unwrap();
        let outcome = engine
            .execute(HashMap::from([("topic".to_string(), json!("bees"))]), true)
            .await
            .unwrap();

        let FlowOutcome::DryRun { order } = outcome else {
            panic!("expected dry run outcome");
        };
        assert_eq!(order, vec!["gather", "summarize"]);
        assert!(engine.executor.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn dry_run_still_validates_required_inputs() {
        let engine = FlowEngine::new(research_spec(), EchoExecutor::default()).unwrap();
        let err = engine.execute(HashMap::new(), true).await.unwrap_err();
        assert!(matches!(err, FlowError::Validation(_)));
        assert!(engine.executor.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_required_input_fails_validation() {
        let engine = FlowEngine::new(research_spec(), EchoExecutor::default()).unwrap();
        let err = engine.execute(HashMap::new(), false).await.unwrap_err();
        assert!(matches!(
            err,
            FlowError::Validation(ValidationError { ref input }) if input == "topic"
        ));
    }

    #[tokio::test]
    async fn failure_aborts_before_later_steps() {
        let spec = FlowSpec::from_yaml(
            r#"
name: "chain"
steps:
  first:
    prompt: first
  second:
    prompt: second
    inputs:
      x: "${first.result}"
  third:
    prompt: third
    inputs:
      x: "${second.result}"
"#,
        )
        .unwrap();
        let engine = FlowEngine::new(spec, EchoExecutor::failing_on("second")).unwrap();
        let err = engine.execute(HashMap::new(), false).await.unwrap_err();

        assert!(matches!(
            err,
            FlowError::Step(StepExecutionError { ref step, .. }) if step == "second"
        ));
        let calls = engine.executor.calls.lock().unwrap();
        assert_eq!(*calls, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn scalar_results_wrap_under_declared_output() {
        let spec = FlowSpec::from_yaml(
            r#"
name: "scalars"
outputs:
  - name: text
    source: speak.answer
  - name: number
    source: compute.result
steps:
  speak:
    prompt: speak
    outputs: [answer]
  compute:
    skill: compute
"#,
        )
        .unwrap();
        let engine = FlowEngine::new(spec, ScalarExecutor).unwrap();
        let outcome = engine.execute(HashMap::new(), false).await.unwrap();

        let FlowOutcome::Completed { outputs } = outcome else {
            panic!("expected completion");
        };
        assert_eq!(outputs["text"], json!("just text"));
        assert_eq!(outputs["number"], json!(42));
    }

    #[tokio::test]
    async fn unresolved_template_names_path_and_fails_step() {
        let spec = FlowSpec::from_yaml(
            r#"
name: "bad-template"
steps:
  gather:
    prompt: gather
  use:
    prompt: use
    depends_on: [gather]
    inputs:
      x: "${gather.nope}"
"#,
        )
        .unwrap();
        let engine = FlowEngine::new(spec, EchoExecutor::default()).unwrap();
        let err = engine.execute(HashMap::new(), false).await.unwrap_err();
        assert!(matches!(
            err,
            FlowError::Template(ref t) if t.path == "gather.nope"
        ));
    }

    #[tokio::test]
    async fn default_values_fill_missing_inputs() {
        let spec = FlowSpec::from_yaml(
            r#"
name: "defaults"
inputs:
  - name: limit
    type: int
    default: 7
outputs:
  - name: out
    source: only.result
steps:
  only:
    prompt: only
    inputs:
      n: "${inputs.limit}"
"#,
        )
        .unwrap();
        let engine = FlowEngine::new(spec, EchoExecutor::default()).unwrap();
        let outcome = engine.execute(HashMap::new(), false).await.unwrap();
        let FlowOutcome::Completed { outputs } = outcome else {
            panic!("expected completion");
        };
        assert_eq!(outputs["out"], json!("prompt:only:7"));
    }
}
