//! `twine prompt` — run a single prompt or list available ones.

use std::path::Path;
use std::sync::Arc;

use twine_core::config;
use twine_core::prompt::{self, PromptRunner, PromptSpec};
use twine_core::{ConversationStore, Database};

use super::progress::TerminalReporter;
use super::collect_params;

/// Run a prompt by name.
pub async fn run(
    prompts_dir: &Path,
    name: &str,
    params: &[String],
    conversation: Option<String>,
    verbose: bool,
) -> Result<(), String> {
    let path = prompts_dir.join(format!("{}.yaml", name));
    let base_config = config::config_file();
    let spec = PromptSpec::from_file(&path, Some(base_config.as_path()))
        .map_err(|e| e.to_string())?;

    let wants_history = conversation.is_some() || spec.conversation;
    let mut runner = PromptRunner::new(spec)
        .map_err(|e| e.to_string())?
        .with_progress(Arc::new(TerminalReporter::new(verbose)));

    if wants_history {
        let db = Database::open(config::history_db_path()).map_err(|e| e.to_string())?;
        runner = runner.with_history(ConversationStore::new(db), conversation);
    }

    let params = collect_params(params)?;
    let result = runner.run(params).await.map_err(|e| e.to_string())?;
    println!("{}", twine_core::value::display(&result));
    Ok(())
}

/// List the prompts available in a directory.
pub fn list(prompts_dir: &Path) -> Result<(), String> {
    let prompts = prompt::list_prompts(prompts_dir);
    if prompts.is_empty() {
        println!("No prompts found in {}", prompts_dir.display());
        return Ok(());
    }

    println!("\nAvailable prompts ({} total):", prompts.len());
    for (name, path) in prompts {
        println!("  {:<24} {}", name, path.display());
    }
    Ok(())
}
