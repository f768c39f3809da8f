//! Prompt specs and runner.
//!
//! A prompt YAML names a model, carries system/user templates, and declares
//! typed parameters:
//!
//! ```yaml
//! provider: openai
//! model_name: gpt-4o-mini
//! system_prompt: "You are a terse research assistant."
//! user_prompt: "Summarize what is known about ${topic}."
//! parameters:
//!   - name: topic
//!     type: string
//!     required: true
//! generation_config:
//!   temperature: 0.2
//! ```
//!
//! A base config file is deep-merged underneath every prompt spec, so
//! provider/model defaults can live in one place and individual prompts
//! override only what they need.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use crate::client::{
    resolve_env_refs, ChatMessage, ClientError, GenerationConfig, LlmClient, Provider,
};
use crate::config;
use crate::progress::{ProgressEvent, ProgressKind, ProgressSink};
use crate::store::{ConversationStore, StoreError};
use crate::value::{display, CoercionError, ValueType};

/// Errors from prompt loading or execution.
#[derive(Debug, thiserror::Error)]
pub enum PromptError {
    #[error("prompt file not found: {0}")]
    NotFound(PathBuf),

    #[error("failed to read prompt file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid YAML in prompt file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("required parameter '{0}' is missing")]
    MissingParameter(String),

    #[error(transparent)]
    Coercion(#[from] CoercionError),

    #[error("unresolved placeholder '${{{0}}}' in prompt template")]
    UnresolvedPlaceholder(String),

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A declared prompt parameter.
#[derive(Debug, Clone, Deserialize)]
pub struct PromptParameter {
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

impl PromptParameter {
    /// Parameters with a default are optional unless marked otherwise.
    pub fn is_required(&self) -> bool {
        self.required.unwrap_or(self.default.is_none())
    }
}

/// A prompt specification, after base-config merging.
#[derive(Debug, Clone, Deserialize)]
pub struct PromptSpec {
    /// Filled from the file stem on load.
    #[serde(skip)]
    pub name: String,

    #[serde(default)]
    pub provider: Option<Provider>,
    #[serde(default)]
    pub base_url: Option<String>,
    /// May contain `${ENV_VAR}` references, resolved at client construction.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub model_name: Option<String>,

    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub user_prompt: String,

    #[serde(default)]
    pub parameters: Vec<PromptParameter>,
    #[serde(default)]
    pub generation_config: GenerationConfig,

    /// When true the prompt keeps conversation history between calls.
    #[serde(default)]
    pub conversation: bool,
}

impl PromptSpec {
    /// Parse a spec from YAML, without base-config merging.
    pub fn from_yaml(yaml: &str) -> Result<Self, PromptError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Load `<name>.yaml`, deep-merging the base config file (if any)
    /// underneath it. The file stem becomes the prompt name.
    pub fn from_file(
        path: impl AsRef<Path>,
        base_config: Option<&Path>,
    ) -> Result<Self, PromptError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(PromptError::NotFound(path.to_path_buf()));
        }
        let contents = std::fs::read_to_string(path).map_err(|source| PromptError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut doc: serde_yaml::Value = serde_yaml::from_str(&contents)?;

        if let Some(base_path) = base_config.filter(|p| p.exists()) {
            let base_contents =
                std::fs::read_to_string(base_path).map_err(|source| PromptError::Io {
                    path: base_path.to_path_buf(),
                    source,
                })?;
            let base: serde_yaml::Value = serde_yaml::from_str(&base_contents)?;
            doc = deep_merge(base, doc);
        }

        let mut spec: PromptSpec = serde_yaml::from_value(doc)?;
        spec.name = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        Ok(spec)
    }

    /// Validate supplied parameters against the declarations: fill defaults,
    /// reject missing required ones, coerce declared types. Undeclared
    /// parameters pass through untouched.
    pub fn validate_params(
        &self,
        mut params: HashMap<String, Value>,
    ) -> Result<HashMap<String, Value>, PromptError> {
        for parameter in &self.parameters {
            match params.remove(&parameter.name) {
                Some(value) => {
                    let coerced = parameter.value_type.coerce(value, &parameter.name)?;
                    params.insert(parameter.name.clone(), coerced);
                }
                None => {
                    if let Some(default) = &parameter.default {
                        params.insert(parameter.name.clone(), default.clone());
                    } else if parameter.is_required() {
                        return Err(PromptError::MissingParameter(parameter.name.clone()));
                    }
                }
            }
        }
        Ok(params)
    }
}

/// Substitute `${name}` placeholders from a parameter map.
pub fn render(template: &str, params: &HashMap<String, Value>) -> Result<String, PromptError> {
    use std::sync::OnceLock;
    static RE: OnceLock<regex::Regex> = OnceLock::new();
    let re = RE.get_or_init(|| regex::Regex::new(r"\$\{([^}]+)\}").unwrap());

    let mut missing: Option<String> = None;
    let rendered = re.replace_all(template, |caps: &regex::Captures| {
        let name = &caps[1];
        match params.get(name) {
            Some(value) => display(value),
            None => {
                if missing.is_none() {
                    missing = Some(name.to_string());
                }
                String::new()
            }
        }
    });

    match missing {
        Some(name) => Err(PromptError::UnresolvedPlaceholder(name)),
        None => Ok(rendered.into_owned()),
    }
}

/// Enumerate the loadable prompts in a directory.
pub fn list_prompts(dir: &Path) -> Vec<(String, PathBuf)> {
    let pattern = dir.join("*.yaml").to_string_lossy().to_string();
    let mut prompts = Vec::new();
    if let Ok(paths) = glob::glob(&pattern) {
        for path in paths.flatten() {
            if let Some(stem) = path.file_stem() {
                prompts.push((stem.to_string_lossy().to_string(), path.clone()));
            }
        }
    }
    prompts.sort();
    prompts
}

/// Executes a prompt spec: renders templates, calls the model, and
/// optionally threads conversation history through the store.
pub struct PromptRunner {
    spec: PromptSpec,
    client: LlmClient,
    history: Option<(ConversationStore, Option<String>)>,
    sink: Option<Arc<dyn ProgressSink>>,
}

impl PromptRunner {
    /// Build the runner, constructing a client from the spec's provider,
    /// base URL, and (env-expanded) API key.
    pub fn new(spec: PromptSpec) -> Result<Self, PromptError> {
        let provider = spec.provider.unwrap_or(Provider::OpenAi);
        let api_key = spec.api_key.as_deref().map(resolve_env_refs);
        let client = LlmClient::new(provider, spec.base_url.clone(), api_key)?;
        Ok(Self {
            spec,
            client,
            history: None,
            sink: None,
        })
    }

    /// Build the runner around an existing client (used by tests and by
    /// callers that manage client configuration themselves).
    pub fn with_client(spec: PromptSpec, client: LlmClient) -> Self {
        Self {
            spec,
            client,
            history: None,
            sink: None,
        }
    }

    /// Record exchanges in the store; `conversation_id` of `None` starts a
    /// fresh conversation on the first call.
    pub fn with_history(mut self, store: ConversationStore, conversation_id: Option<String>) -> Self {
        self.history = Some((store, conversation_id));
        self
    }

    pub fn with_progress(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn spec(&self) -> &PromptSpec {
        &self.spec
    }

    /// Run the prompt. Returns the parsed JSON object when the model
    /// answered with one, the raw text otherwise.
    pub async fn run(&self, params: HashMap<String, Value>) -> Result<Value, PromptError> {
        self.emit(ProgressEvent::new(
            ProgressKind::PromptStart,
            format!("Running prompt: {}", self.spec.name),
        ));

        match self.run_inner(params).await {
            Ok(value) => {
                self.emit(ProgressEvent::new(
                    ProgressKind::PromptComplete,
                    format!("Completed prompt: {}", self.spec.name),
                ));
                Ok(value)
            }
            Err(e) => {
                self.emit(ProgressEvent::new(
                    ProgressKind::PromptError,
                    format!("Prompt '{}' failed: {}", self.spec.name, e),
                ));
                Err(e)
            }
        }
    }

    async fn run_inner(&self, params: HashMap<String, Value>) -> Result<Value, PromptError> {
        let params = self.spec.validate_params(params)?;
        let user_prompt = render(&self.spec.user_prompt, &params)?;

        let mut messages = Vec::new();
        if let Some(system) = &self.spec.system_prompt {
            messages.push(ChatMessage::system(render(system, &params)?));
        }

        // Replay recent history for conversational prompts.
        let conversation_id = match &self.history {
            Some((store, conversation_id)) => {
                let id = store
                    .create_conversation(conversation_id.clone(), &self.spec.name)
                    .await?;
                for stored in store.messages(&id, Some(config::max_history())).await? {
                    messages.push(ChatMessage {
                        role: stored.role,
                        content: stored.content,
                    });
                }
                Some(id)
            }
            None => None,
        };

        messages.push(ChatMessage::user(user_prompt.clone()));

        let model = self
            .spec
            .model_name
            .clone()
            .unwrap_or_else(config::default_model);

        tracing::debug!(prompt = %self.spec.name, model = %model, "dispatching completion");
        let completion = self
            .client
            .complete(&model, &messages, &self.spec.generation_config)
            .await?;

        if let (Some((store, _)), Some(id)) = (&self.history, &conversation_id) {
            store.add_message(id, "user", &user_prompt).await?;
            store
                .add_message(id, "assistant", &completion.content)
                .await?;
        }

        Ok(shape_completion(completion.content))
    }

    fn emit(&self, event: ProgressEvent) {
        if let Some(sink) = &self.sink {
            sink.notify(&event);
        }
    }
}

/// Structured answers come back as objects, everything else as raw text.
fn shape_completion(content: String) -> Value {
    match serde_json::from_str::<Value>(&content) {
        Ok(Value::Object(map)) => Value::Object(map),
        _ => Value::String(content),
    }
}

fn deep_merge(base: serde_yaml::Value, overlay: serde_yaml::Value) -> serde_yaml::Value {
    match (base, overlay) {
        (serde_yaml::Value::Mapping(mut merged), serde_yaml::Value::Mapping(overlay)) => {
            for (key, value) in overlay {
                let value = match merged.remove(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => value,
                };
                merged.insert(key, value);
            }
            serde_yaml::Value::Mapping(merged)
        }
        (_, overlay) => overlay,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_prompt_spec() {
        let yaml = r#"
provider: openai
model_name: gpt-4o-mini
system_prompt: "Be terse."
user_prompt: "Tell me about ${topic}."
parameters:
  - name: topic
    required: true
  - name: limit
    type: int
    default: 3
generation_config:
  temperature: 0.5
  max_tokens: 256
"#;
        let spec = PromptSpec::from_yaml(yaml).unwrap();
        assert_eq!(spec.provider, Some(Provider::OpenAi));
        assert_eq!(spec.model_name.as_deref(), Some("gpt-4o-mini"));
        assert_eq!(spec.parameters.len(), 2);
        assert!(spec.parameters[0].is_required());
        assert!(!spec.parameters[1].is_required());
        assert_eq!(spec.generation_config.temperature, Some(0.5));
    }

    #[test]
    fn validate_params_fills_defaults_and_coerces() {
        let spec = PromptSpec::from_yaml(
            r#"
user_prompt: "x"
parameters:
  - name: topic
    required: true
  - name: limit
    type: int
    default: 3
"#,
        )
        .unwrap();

        let params = spec
            .validate_params(HashMap::from([("topic".to_string(), json!("bees"))]))
            .unwrap();
        assert_eq!(params["limit"], json!(3));

        let params = spec
            .validate_params(HashMap::from([
                ("topic".to_string(), json!("bees")),
                ("limit".to_string(), json!("7")),
            ]))
            .unwrap();
        assert_eq!(params["limit"], json!(7));

        assert!(matches!(
            spec.validate_params(HashMap::new()),
            Err(PromptError::MissingParameter(name)) if name == "topic"
        ));
    }

    #[test]
    fn render_substitutes_and_rejects_unknowns() {
        let params = HashMap::from([
            ("topic".to_string(), json!("bees")),
            ("limit".to_string(), json!(3)),
        ]);
        assert_eq!(
            render("About ${topic}, max ${limit}.", &params).unwrap(),
            "About bees, max 3."
        );
        assert!(matches!(
            render("${nope}", &params),
            Err(PromptError::UnresolvedPlaceholder(name)) if name == "nope"
        ));
    }

    #[test]
    fn base_config_merges_under_prompt() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("config.yaml");
        std::fs::write(
            &base,
            "provider: openrouter\nmodel_name: base-model\ngeneration_config:\n  temperature: 0.1\n",
        )
        .unwrap();
        let prompt = dir.path().join("greeter.yaml");
        std::fs::write(
            &prompt,
            "user_prompt: \"hi\"\nmodel_name: override-model\ngeneration_config:\n  max_tokens: 64\n",
        )
        .unwrap();

        let spec = PromptSpec::from_file(&prompt, Some(&base)).unwrap();
        assert_eq!(spec.name, "greeter");
        // Prompt overrides win; untouched base values survive, including
        // nested generation_config keys.
        assert_eq!(spec.model_name.as_deref(), Some("override-model"));
        assert_eq!(spec.provider, Some(Provider::OpenRouter));
        assert_eq!(spec.generation_config.temperature, Some(0.1));
        assert_eq!(spec.generation_config.max_tokens, Some(64));
    }

    #[test]
    fn completion_shaping_prefers_objects() {
        assert_eq!(
            shape_completion(r#"{"answer": 7}"#.to_string()),
            json!({"answer": 7})
        );
        assert_eq!(shape_completion("[1, 2]".to_string()), json!("[1, 2]"));
        assert_eq!(shape_completion("plain".to_string()), json!("plain"));
    }
}
