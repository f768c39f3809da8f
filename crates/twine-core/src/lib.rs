//! Twine Core — domain logic for the twine orchestration toolkit.
//!
//! This crate contains everything the CLI builds on, with no terminal or
//! transport dependency:
//!
//! - `flow` — the execution engine: spec loading, dependency graphs,
//!   deterministic planning, template resolution, step dispatch
//! - `prompt` — YAML prompt specs and the LLM-backed runner
//! - `skill` — YAML skill specs and the sandboxed script runner
//! - `client` — OpenAI-compatible chat completion client
//! - `store` — SQLite-backed conversation history
//! - `progress` — one-way progress event channel

pub mod client;
pub mod config;
pub mod db;
pub mod executor;
pub mod flow;
pub mod progress;
pub mod prompt;
pub mod skill;
pub mod store;
pub mod value;

// Convenience re-exports
pub use db::Database;
pub use executor::LocalExecutor;
pub use flow::{FlowEngine, FlowError, FlowOutcome, FlowSpec};
pub use progress::{ProgressEvent, ProgressKind, ProgressSink};
pub use store::ConversationStore;
