//! Skill specs and sandboxed execution.
//!
//! A skill pairs a YAML spec with a script. The spec declares typed inputs,
//! the output fields the script promises to produce, and a wall-clock
//! timeout:
//!
//! ```yaml
//! name: word-count
//! description: "Counts words in a text"
//! inputs:
//!   - name: text
//!     required: true
//! outputs:
//!   - name: count
//!     type: int
//! security:
//!   timeout_secs: 10
//! ```
//!
//! Execution spawns the script as a child process, writes the validated
//! inputs as one JSON object to its stdin, and parses its stdout as JSON
//! (falling back to the raw text). The timeout is enforced here; everything
//! the script does is opaque to callers.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use tokio::io::AsyncWriteExt;

use crate::progress::{ProgressEvent, ProgressKind, ProgressSink};
use crate::value::{CoercionError, ValueType};

/// Errors from skill loading or execution.
#[derive(Debug, thiserror::Error)]
pub enum SkillError {
    #[error("skill file not found: {0}")]
    NotFound(PathBuf),

    #[error("failed to read skill file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid YAML in skill file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("required input '{0}' is missing")]
    MissingInput(String),

    #[error(transparent)]
    Coercion(#[from] CoercionError),

    #[error("skill script not found: {0}")]
    ScriptNotFound(PathBuf),

    #[error("failed to spawn skill process: {0}")]
    Spawn(std::io::Error),

    #[error("skill '{name}' exceeded its {timeout_secs}s timeout")]
    Timeout { name: String, timeout_secs: u64 },

    #[error("skill '{name}' exited with {status}: {stderr}")]
    Failed {
        name: String,
        status: String,
        stderr: String,
    },

    #[error("skill '{name}' did not produce declared output '{output}'")]
    MissingOutput { name: String, output: String },
}

/// A declared skill input.
#[derive(Debug, Clone, Deserialize)]
pub struct SkillInput {
    pub name: String,
    #[serde(rename = "type", default)]
    pub value_type: ValueType,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub required: Option<bool>,
    #[serde(default)]
    pub default: Option<Value>,
}

impl SkillInput {
    pub fn is_required(&self) -> bool {
        self.required.unwrap_or(self.default.is_none())
    }
}

/// A field the skill promises to produce.
#[derive(Debug, Clone, Deserialize)]
pub struct SkillOutput {
    pub name: String,
    #[serde(rename = "type", default)]
    pub value_type: ValueType,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SkillSecurity {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for SkillSecurity {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}

/// A complete skill specification.
#[derive(Debug, Clone, Deserialize)]
pub struct SkillSpec {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub inputs: Vec<SkillInput>,
    #[serde(default)]
    pub outputs: Vec<SkillOutput>,
    /// Argv to run; defaults to `python3 <skills_dir>/<name>.py`.
    #[serde(default)]
    pub command: Option<Vec<String>>,
    #[serde(default)]
    pub security: SkillSecurity,
}

fn default_version() -> String {
    "1.0.0".to_string()
}

impl SkillSpec {
    pub fn from_yaml(yaml: &str) -> Result<Self, SkillError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SkillError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SkillError::NotFound(path.to_path_buf()));
        }
        let contents = std::fs::read_to_string(path).map_err(|source| SkillError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&contents)
    }

    /// Validate supplied inputs: fill defaults, reject missing required
    /// ones, coerce declared types. Undeclared inputs pass through.
    pub fn validate_inputs(
        &self,
        mut inputs: HashMap<String, Value>,
    ) -> Result<HashMap<String, Value>, SkillError> {
        for input in &self.inputs {
            match inputs.remove(&input.name) {
                Some(value) => {
                    let coerced = input.value_type.coerce(value, &input.name)?;
                    inputs.insert(input.name.clone(), coerced);
                }
                None => {
                    if let Some(default) = &input.default {
                        inputs.insert(input.name.clone(), default.clone());
                    } else if input.is_required() {
                        return Err(SkillError::MissingInput(input.name.clone()));
                    }
                }
            }
        }
        Ok(inputs)
    }
}

/// Listing entry for a discoverable skill.
#[derive(Debug, Clone)]
pub struct SkillSummary {
    pub name: String,
    pub description: String,
    pub version: String,
    pub path: PathBuf,
}

/// Enumerate the loadable skills in a directory.
pub fn list_skills(dir: &Path) -> Vec<SkillSummary> {
    let pattern = dir.join("*.yaml").to_string_lossy().to_string();
    let mut skills = Vec::new();
    let Ok(paths) = glob::glob(&pattern) else {
        return skills;
    };
    for path in paths.flatten() {
        match SkillSpec::from_file(&path) {
            Ok(spec) => skills.push(SkillSummary {
                name: spec.name,
                description: spec.description,
                version: spec.version,
                path,
            }),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "skipping unloadable skill");
            }
        }
    }
    skills.sort_by(|a, b| a.name.cmp(&b.name));
    skills
}

/// Runs a skill script inside its sandbox contract.
pub struct SkillEngine {
    spec: SkillSpec,
    skills_dir: PathBuf,
    sink: Option<Arc<dyn ProgressSink>>,
}

impl SkillEngine {
    pub fn new(spec: SkillSpec, skills_dir: impl Into<PathBuf>) -> Self {
        Self {
            spec,
            skills_dir: skills_dir.into(),
            sink: None,
        }
    }

    pub fn with_progress(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn spec(&self) -> &SkillSpec {
        &self.spec
    }

    /// Execute the skill with the given inputs.
    pub async fn execute(&self, inputs: HashMap<String, Value>) -> Result<Value, SkillError> {
        self.emit(ProgressEvent::new(
            ProgressKind::SkillStart,
            format!("Starting skill: {}", self.spec.name),
        ));

        match self.execute_inner(inputs).await {
            Ok(value) => {
                self.emit(ProgressEvent::new(
                    ProgressKind::SkillComplete,
                    format!("Completed skill: {}", self.spec.name),
                ));
                Ok(value)
            }
            Err(e) => {
                self.emit(ProgressEvent::new(
                    ProgressKind::SkillError,
                    format!("Skill '{}' failed: {}", self.spec.name, e),
                ));
                Err(e)
            }
        }
    }

    async fn execute_inner(&self, inputs: HashMap<String, Value>) -> Result<Value, SkillError> {
        let inputs = self.spec.validate_inputs(inputs)?;
        let payload = Value::Object(inputs.into_iter().collect()).to_string();

        let argv = match &self.spec.command {
            Some(argv) if !argv.is_empty() => argv.clone(),
            _ => {
                let script = self.skills_dir.join(format!("{}.py", self.spec.name));
                if !script.exists() {
                    return Err(SkillError::ScriptNotFound(script));
                }
                vec![
                    "python3".to_string(),
                    script.to_string_lossy().to_string(),
                ]
            }
        };

        tracing::debug!(skill = %self.spec.name, command = ?argv, "spawning skill process");

        let mut child = tokio::process::Command::new(&argv[0])
            .args(&argv[1..])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(SkillError::Spawn)?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(payload.as_bytes())
                .await
                .map_err(SkillError::Spawn)?;
            // Dropping stdin closes the pipe so the script sees EOF.
        }

        let timeout_secs = self.spec.security.timeout_secs;
        let output = tokio::time::timeout(
            Duration::from_secs(timeout_secs),
            child.wait_with_output(),
        )
        .await
        .map_err(|_| SkillError::Timeout {
            name: self.spec.name.clone(),
            timeout_secs,
        })?
        .map_err(SkillError::Spawn)?;

        if !output.status.success() {
            return Err(SkillError::Failed {
                name: self.spec.name.clone(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let result = match serde_json::from_str::<Value>(stdout.trim()) {
            Ok(value) => value,
            Err(_) => Value::String(stdout.trim().to_string()),
        };

        self.check_outputs(&result)?;
        Ok(result)
    }

    /// Structured results must contain every declared output; bare strings
    /// are always acceptable.
    fn check_outputs(&self, result: &Value) -> Result<(), SkillError> {
        let Value::Object(map) = result else {
            return Ok(());
        };
        for output in &self.spec.outputs {
            if !map.contains_key(&output.name) {
                return Err(SkillError::MissingOutput {
                    name: self.spec.name.clone(),
                    output: output.name.clone(),
                });
            }
        }
        Ok(())
    }

    fn emit(&self, event: ProgressEvent) {
        if let Some(sink) = &self.sink {
            sink.notify(&event);
        }
    }
}
