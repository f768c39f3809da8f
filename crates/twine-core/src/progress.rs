//! Progress notification events.
//!
//! Engines emit `ProgressEvent`s through an optional [`ProgressSink`]. The
//! channel is strictly one-way: a sink can render or record events but has
//! no effect on control flow, and every engine behaves identically whether
//! or not a sink is attached.

use chrono::{DateTime, Local};

/// What kind of lifecycle moment an event marks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressKind {
    FlowStart,
    FlowStepStart,
    FlowStepComplete,
    FlowComplete,
    FlowError,
    PromptStart,
    PromptComplete,
    PromptError,
    SkillStart,
    SkillComplete,
    SkillError,
}

/// A single progress notification.
#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub kind: ProgressKind,
    pub message: String,
    /// 1-based position of the current step, when inside a flow.
    pub current_step: Option<usize>,
    pub total_steps: Option<usize>,
    pub step_name: Option<String>,
    pub timestamp: DateTime<Local>,
}

impl ProgressEvent {
    pub fn new(kind: ProgressKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            current_step: None,
            total_steps: None,
            step_name: None,
            timestamp: Local::now(),
        }
    }

    /// Attach step position info (1-based `current` out of `total`).
    pub fn with_step(mut self, name: &str, current: usize, total: usize) -> Self {
        self.step_name = Some(name.to_string());
        self.current_step = Some(current);
        self.total_steps = Some(total);
        self
    }

    pub fn with_total(mut self, total: usize) -> Self {
        self.total_steps = Some(total);
        self
    }

    /// Percentage of steps completed, when position info is present.
    pub fn percentage(&self) -> Option<f64> {
        match (self.current_step, self.total_steps) {
            (Some(cur), Some(total)) if total > 0 => Some(cur as f64 / total as f64 * 100.0),
            _ => None,
        }
    }
}

/// Receiver for progress events.
pub trait ProgressSink: Send + Sync {
    fn notify(&self, event: &ProgressEvent);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentage_requires_position() {
        let event = ProgressEvent::new(ProgressKind::FlowStart, "start");
        assert_eq!(event.percentage(), None);

        let event =
            ProgressEvent::new(ProgressKind::FlowStepComplete, "done").with_step("gather", 1, 4);
        assert_eq!(event.percentage(), Some(25.0));
    }
}
