//! File-system-backed step executor.
//!
//! Adapts the prompt runner and skill engine to the flow engine's
//! [`StepExecutor`] boundary: prompt references resolve to
//! `<prompts_dir>/<name>.yaml`, skill references to
//! `<skills_dir>/<name>.yaml`.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use serde_json::Value;

use crate::config;
use crate::flow::{ExecutorError, StepExecutor};
use crate::progress::ProgressSink;
use crate::prompt::{PromptRunner, PromptSpec};
use crate::skill::{SkillEngine, SkillSpec};

/// Resolves prompts and skills from directories on disk.
pub struct LocalExecutor {
    prompts_dir: PathBuf,
    skills_dir: PathBuf,
    base_config: PathBuf,
    sink: Option<Arc<dyn ProgressSink>>,
}

impl LocalExecutor {
    pub fn new(prompts_dir: impl Into<PathBuf>, skills_dir: impl Into<PathBuf>) -> Self {
        Self {
            prompts_dir: prompts_dir.into(),
            skills_dir: skills_dir.into(),
            base_config: config::config_file(),
            sink: None,
        }
    }

    /// Executor over the configured default directories.
    pub fn from_config() -> Self {
        Self::new(config::prompts_dir(), config::skills_dir())
    }

    pub fn with_base_config(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_config = path.into();
        self
    }

    /// Forward prompt/skill lifecycle events to the sink.
    pub fn with_progress(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sink = Some(sink);
        self
    }
}

impl StepExecutor for LocalExecutor {
    async fn invoke_prompt(
        &self,
        reference: &str,
        inputs: HashMap<String, String>,
    ) -> Result<Value, ExecutorError> {
        let path = self.prompts_dir.join(format!("{}.yaml", reference));
        let spec = PromptSpec::from_file(&path, Some(self.base_config.as_path()))?;

        let mut runner = PromptRunner::new(spec)?;
        if let Some(sink) = &self.sink {
            runner = runner.with_progress(sink.clone());
        }

        let params = string_params(inputs);
        Ok(runner.run(params).await?)
    }

    async fn invoke_skill(
        &self,
        reference: &str,
        inputs: HashMap<String, String>,
    ) -> Result<Value, ExecutorError> {
        let path = self.skills_dir.join(format!("{}.yaml", reference));
        let spec = SkillSpec::from_file(&path)?;

        let mut engine = SkillEngine::new(spec, self.skills_dir.clone());
        if let Some(sink) = &self.sink {
            engine = engine.with_progress(sink.clone());
        }

        let params = string_params(inputs);
        Ok(engine.execute(params).await?)
    }
}

/// Template-resolved step inputs arrive as strings; declared parameter
/// types coerce them further inside each engine.
fn string_params(inputs: HashMap<String, String>) -> HashMap<String, Value> {
    inputs
        .into_iter()
        .map(|(k, v)| (k, Value::String(v)))
        .collect()
}
