//! Twine CLI — run YAML-defined prompt/skill flows from the terminal.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use twine_cli::commands;
use twine_cli::commands::flow::RunOptions;

/// Twine — chain prompts and skills into dependency-ordered flows
#[derive(Parser)]
#[command(name = "twine", version, about = "Twine — chain prompts and skills into dependency-ordered flows")]
pub struct Cli {
    /// Directory where flow YAML files live
    #[arg(long, env = "TWINE_FLOWS_DIR", default_value = "flows", global = true)]
    flows_dir: PathBuf,

    /// Directory where prompt YAML files live
    #[arg(long, env = "TWINE_PROMPTS_DIR", default_value = "prompts", global = true)]
    prompts_dir: PathBuf,

    /// Directory where skill specs and scripts live
    #[arg(long, env = "TWINE_SKILLS_DIR", default_value = "skills", global = true)]
    skills_dir: PathBuf,

    /// Suppress progress output
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Show prompt/skill level progress events
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Multi-step flows: execute, discover, and inspect
    Flow {
        #[command(subcommand)]
        action: FlowAction,
    },

    /// Single prompts
    Prompt {
        #[command(subcommand)]
        action: PromptAction,
    },

    /// Single skills
    Skill {
        #[command(subcommand)]
        action: SkillAction,
    },

    /// Stored conversation history
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },
}

#[derive(Subcommand)]
enum FlowAction {
    /// Execute a flow
    Run {
        /// Name of the flow to run
        name: String,
        /// Show the execution plan without running any step
        #[arg(long)]
        dry_run: bool,
        /// Write output to a file instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,
        /// Format the final output as JSON
        #[arg(long)]
        json: bool,
        /// Flow input as name=value (repeatable)
        #[arg(long = "param", short = 'p', value_name = "NAME=VALUE")]
        params: Vec<String>,
    },
    /// List all flows
    List,
    /// Show a flow's structure
    Show {
        /// Name of the flow to show
        name: String,
    },
    /// Show a flow's dependency graph
    Graph {
        /// Name of the flow to graph
        name: String,
    },
    /// Validate a flow without executing it
    Test {
        /// Name of the flow to validate
        name: String,
    },
}

#[derive(Subcommand)]
enum PromptAction {
    /// Run a prompt
    Run {
        /// Name of the prompt to run
        name: String,
        /// Prompt parameter as name=value (repeatable)
        #[arg(long = "param", short = 'p', value_name = "NAME=VALUE")]
        params: Vec<String>,
        /// Continue (or start) a stored conversation with this id
        #[arg(long)]
        conversation: Option<String>,
    },
    /// List available prompts
    List,
}

#[derive(Subcommand)]
enum SkillAction {
    /// Run a skill
    Run {
        /// Name of the skill to run
        name: String,
        /// Skill input as name=value (repeatable)
        #[arg(long = "param", short = 'p', value_name = "NAME=VALUE")]
        params: Vec<String>,
    },
    /// List available skills
    List,
}

#[derive(Subcommand)]
enum HistoryAction {
    /// List stored conversations
    List,
    /// Show one conversation's messages
    Show {
        /// Conversation id
        id: String,
    },
    /// Delete a conversation
    Delete {
        /// Conversation id
        id: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "twine_core=warn,twine_cli=info".into()),
        )
        .init();

    let result = match cli.command {
        Commands::Flow { action } => match action {
            FlowAction::Run {
                name,
                dry_run,
                output,
                json,
                params,
            } => {
                commands::flow::run(
                    &cli.flows_dir,
                    &cli.prompts_dir,
                    &cli.skills_dir,
                    &name,
                    RunOptions {
                        dry_run,
                        output,
                        json,
                        params,
                        quiet: cli.quiet,
                        verbose: cli.verbose,
                    },
                )
                .await
            }
            FlowAction::List => commands::flow::list(&cli.flows_dir),
            FlowAction::Show { name } => commands::flow::show(&cli.flows_dir, &name),
            FlowAction::Graph { name } => commands::flow::graph(&cli.flows_dir, &name),
            FlowAction::Test { name } => commands::flow::test(&cli.flows_dir, &name),
        },

        Commands::Prompt { action } => match action {
            PromptAction::Run {
                name,
                params,
                conversation,
            } => {
                commands::prompt::run(
                    &cli.prompts_dir,
                    &name,
                    &params,
                    conversation,
                    cli.verbose,
                )
                .await
            }
            PromptAction::List => commands::prompt::list(&cli.prompts_dir),
        },

        Commands::Skill { action } => match action {
            SkillAction::Run { name, params } => {
                commands::skill::run(&cli.skills_dir, &name, &params, cli.verbose).await
            }
            SkillAction::List => commands::skill::list(&cli.skills_dir),
        },

        Commands::History { action } => match action {
            HistoryAction::List => commands::history::list().await,
            HistoryAction::Show { id } => commands::history::show(&id).await,
            HistoryAction::Delete { id } => commands::history::delete(&id).await,
        },
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
