//! Terminal progress reporter.

use twine_core::progress::{ProgressEvent, ProgressKind, ProgressSink};

/// Prints flow/prompt/skill lifecycle events to stdout.
pub struct TerminalReporter {
    verbose: bool,
}

impl TerminalReporter {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl ProgressSink for TerminalReporter {
    fn notify(&self, event: &ProgressEvent) {
        let ts = event.timestamp.format("%H:%M:%S");
        match event.kind {
            ProgressKind::FlowStart => {
                println!("🚀 {} - {}", ts, event.message);
                if let Some(total) = event.total_steps {
                    println!("   Total steps: {}", total);
                }
            }
            ProgressKind::FlowStepStart => {
                match (event.current_step, event.total_steps) {
                    (Some(current), Some(total)) => {
                        println!("📝 {} - [{}/{}] {}", ts, current, total, event.message)
                    }
                    _ => println!("📝 {} - {}", ts, event.message),
                }
            }
            ProgressKind::FlowStepComplete => {
                println!(
                    "✅ {} - Step completed: {}",
                    ts,
                    event.step_name.as_deref().unwrap_or("unknown")
                );
            }
            ProgressKind::FlowComplete => println!("🎉 {} - {}", ts, event.message),
            ProgressKind::FlowError | ProgressKind::PromptError | ProgressKind::SkillError => {
                println!("❌ {} - {}", ts, event.message)
            }
            ProgressKind::PromptStart | ProgressKind::SkillStart => {
                if self.verbose {
                    println!("⏳ {} - {}", ts, event.message);
                }
            }
            ProgressKind::PromptComplete | ProgressKind::SkillComplete => {
                if self.verbose {
                    println!("✅ {} - {}", ts, event.message);
                }
            }
        }
    }
}
