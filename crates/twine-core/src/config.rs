//! Path resolution for flows, prompts, skills, and the history database.
//!
//! Every location can be overridden through an environment variable; the
//! defaults are relative to the working directory, except the history
//! database which lives under `~/.twine/`.

use std::path::PathBuf;

/// Directory containing flow YAML files (`TWINE_FLOWS_DIR`, default `flows`).
pub fn flows_dir() -> PathBuf {
    env_path("TWINE_FLOWS_DIR", "flows")
}

/// Directory containing prompt YAML files (`TWINE_PROMPTS_DIR`, default `prompts`).
pub fn prompts_dir() -> PathBuf {
    env_path("TWINE_PROMPTS_DIR", "prompts")
}

/// Directory containing skill specs and scripts (`TWINE_SKILLS_DIR`, default `skills`).
pub fn skills_dir() -> PathBuf {
    env_path("TWINE_SKILLS_DIR", "skills")
}

/// Base config file deep-merged under every prompt spec
/// (`TWINE_CONFIG_FILE`, default `config.yaml`).
pub fn config_file() -> PathBuf {
    env_path("TWINE_CONFIG_FILE", "config.yaml")
}

/// Location of the conversation history database
/// (`TWINE_HISTORY_DB`, default `~/.twine/history.db`).
pub fn history_db_path() -> PathBuf {
    if let Ok(p) = std::env::var("TWINE_HISTORY_DB") {
        return PathBuf::from(p);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".twine")
        .join("history.db")
}

/// Model used when neither the prompt spec nor the base config names one
/// (`TWINE_DEFAULT_MODEL`, default `gpt-4o-mini`).
pub fn default_model() -> String {
    std::env::var("TWINE_DEFAULT_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string())
}

/// Most recent messages replayed for conversational prompts
/// (`TWINE_MAX_HISTORY`, default 20).
pub fn max_history() -> usize {
    std::env::var("TWINE_MAX_HISTORY")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(20)
}

fn env_path(var: &str, default: &str) -> PathBuf {
    std::env::var(var)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(default))
}
