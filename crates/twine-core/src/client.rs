//! LLM completion client.
//!
//! Talks to any OpenAI-compatible `chat/completions` endpoint. Known
//! providers carry a default base URL and the name of the environment
//! variable holding their API key; a `custom` provider supplies both
//! explicitly.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A known completion-API provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    OpenAi,
    Google,
    Anthropic,
    Azure,
    OpenRouter,
    Custom,
}

impl Provider {
    /// Default endpoint for the provider, `None` when it must be supplied.
    pub fn default_base_url(&self) -> Option<&'static str> {
        match self {
            Provider::OpenAi => Some("https://api.openai.com/v1"),
            Provider::Google => Some("https://generativelanguage.googleapis.com/v1beta/openai"),
            Provider::Anthropic => Some("https://api.anthropic.com/v1"),
            Provider::OpenRouter => Some("https://openrouter.ai/api/v1"),
            Provider::Azure | Provider::Custom => None,
        }
    }

    /// Environment variable consulted for the provider's API key.
    pub fn key_env(&self) -> Option<&'static str> {
        match self {
            Provider::OpenAi => Some("OPENAI_API_KEY"),
            Provider::Google => Some("GOOGLE_API_KEY"),
            Provider::Anthropic => Some("ANTHROPIC_API_KEY"),
            Provider::Azure => Some("AZURE_OPENAI_KEY"),
            Provider::OpenRouter => Some("OPENROUTER_API_KEY"),
            Provider::Custom => None,
        }
    }
}

/// One message in a chat completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// Generation parameters passed through to the endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Structured-output request, passed through verbatim
    /// (e.g. `{"type": "json_object"}`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_format: Option<Value>,
}

/// Token accounting reported by the endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
}

/// A completed chat response.
#[derive(Debug, Clone)]
pub struct Completion {
    pub content: String,
    pub model: String,
    pub usage: Option<Usage>,
}

/// Errors from the completion client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("no API key found: set {env} or configure api_key")]
    MissingApiKey { env: String },

    #[error("no base URL configured for provider")]
    MissingBaseUrl,

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("malformed completion response: {0}")]
    MalformedResponse(String),
}

/// Client for an OpenAI-compatible chat completion endpoint.
#[derive(Debug)]
pub struct LlmClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl LlmClient {
    /// Resolve base URL and API key from explicit overrides, the provider's
    /// defaults, and its key environment variable, in that order.
    pub fn new(
        provider: Provider,
        base_url: Option<String>,
        api_key: Option<String>,
    ) -> Result<Self, ClientError> {
        let base_url = base_url
            .or_else(|| provider.default_base_url().map(str::to_string))
            .ok_or(ClientError::MissingBaseUrl)?;

        let api_key = match api_key {
            Some(key) if !key.is_empty() => key,
            _ => {
                let env = provider.key_env().unwrap_or("TWINE_API_KEY");
                std::env::var(env).map_err(|_| ClientError::MissingApiKey {
                    env: env.to_string(),
                })?
            }
        };

        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(300))
            .build()?;

        Ok(Self {
            http,
            base_url,
            api_key,
        })
    }

    /// POST a chat completion and extract the first choice.
    pub async fn complete(
        &self,
        model: &str,
        messages: &[ChatMessage],
        config: &GenerationConfig,
    ) -> Result<Completion, ClientError> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));

        let mut body = serde_json::json!({
            "model": model,
            "messages": messages,
        });
        if let Some(temperature) = config.temperature {
            body["temperature"] = serde_json::json!(temperature);
        }
        if let Some(max_tokens) = config.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }
        if let Some(response_format) = &config.response_format {
            body["response_format"] = response_format.clone();
        }

        tracing::info!(url = %url, model, "calling completion API");

        let response = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(ClientError::Api {
                status: status.as_u16(),
                body: text,
            });
        }

        let json: Value = serde_json::from_str(&text)
            .map_err(|e| ClientError::MalformedResponse(e.to_string()))?;

        let content = json
            .get("choices")
            .and_then(|c| c.as_array())
            .and_then(|arr| arr.first())
            .and_then(|choice| choice.get("message"))
            .and_then(|msg| msg.get("content"))
            .and_then(|c| c.as_str())
            .ok_or_else(|| {
                ClientError::MalformedResponse("no choices[0].message.content".to_string())
            })?
            .to_string();

        let usage = json.get("usage").map(|u| Usage {
            input_tokens: u
                .get("prompt_tokens")
                .or_else(|| u.get("input_tokens"))
                .and_then(Value::as_u64),
            output_tokens: u
                .get("completion_tokens")
                .or_else(|| u.get("output_tokens"))
                .and_then(Value::as_u64),
        });

        let model = json
            .get("model")
            .and_then(Value::as_str)
            .unwrap_or(model)
            .to_string();

        Ok(Completion {
            content,
            model,
            usage,
        })
    }
}

/// Resolve environment variable references in a string.
/// Supports `${ENV_VAR}` and `${ENV_VAR:-default}` syntax; unknown
/// variables are left as-is.
pub fn resolve_env_refs(input: &str) -> String {
    use std::sync::OnceLock;
    static RE: OnceLock<regex::Regex> = OnceLock::new();
    let re = RE.get_or_init(|| regex::Regex::new(r"\$\{([^}]+)\}").unwrap());

    re.replace_all(input, |caps: &regex::Captures| {
        let expr = &caps[1];
        if let Some(idx) = expr.find(":-") {
            let (name, fallback) = (&expr[..idx], &expr[idx + 2..]);
            std::env::var(name).unwrap_or_else(|_| fallback.to_string())
        } else {
            std::env::var(expr).unwrap_or_else(|_| format!("${{{}}}", expr))
        }
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_env_refs_expands_and_falls_back() {
        std::env::set_var("TWINE_CLIENT_TEST_VAR", "hello");
        assert_eq!(resolve_env_refs("${TWINE_CLIENT_TEST_VAR}"), "hello");
        assert_eq!(
            resolve_env_refs("pre-${TWINE_CLIENT_TEST_VAR}-post"),
            "pre-hello-post"
        );
        assert_eq!(resolve_env_refs("${TWINE_NO_SUCH_VAR:-fallback}"), "fallback");
        assert_eq!(resolve_env_refs("${TWINE_NO_SUCH_VAR}"), "${TWINE_NO_SUCH_VAR}");
        std::env::remove_var("TWINE_CLIENT_TEST_VAR");
    }

    #[test]
    fn provider_defaults_cover_known_endpoints() {
        assert_eq!(
            Provider::OpenAi.default_base_url(),
            Some("https://api.openai.com/v1")
        );
        assert_eq!(Provider::OpenAi.key_env(), Some("OPENAI_API_KEY"));
        assert_eq!(Provider::Custom.default_base_url(), None);
    }

    #[test]
    fn provider_parses_from_yaml() {
        let p: Provider = serde_yaml::from_str("openrouter").unwrap();
        assert_eq!(p, Provider::OpenRouter);
        let p: Provider = serde_yaml::from_str("anthropic").unwrap();
        assert_eq!(p, Provider::Anthropic);
    }

    #[test]
    fn custom_provider_requires_base_url() {
        let err = LlmClient::new(Provider::Custom, None, Some("key".to_string())).unwrap_err();
        assert!(matches!(err, ClientError::MissingBaseUrl));
    }

    #[test]
    fn explicit_key_skips_environment() {
        let client = LlmClient::new(
            Provider::Custom,
            Some("http://localhost:9999/v1".to_string()),
            Some("sekrit".to_string()),
        )
        .unwrap();
        assert_eq!(client.base_url, "http://localhost:9999/v1");
        assert_eq!(client.api_key, "sekrit");
    }
}
