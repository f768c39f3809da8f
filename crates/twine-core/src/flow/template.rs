//! The `${...}` placeholder micro-language.
//!
//! One pattern defines the syntax for both passes that consume it: reference
//! extraction (graph edges) and runtime resolution (value substitution).
//! Keeping a single definition means the two cannot drift apart.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;

use super::engine::ExecutionContext;
use super::error::TemplateError;
use crate::value::display;

fn placeholder() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$\{([^}]+)\}").unwrap())
}

/// Harvest the step names a template refers to.
///
/// The first segment of each `${path}` names the referenced step, unless it
/// is the reserved identifier `inputs`. No values are resolved here.
pub fn extract_step_references(template: &str) -> HashSet<String> {
    placeholder()
        .captures_iter(template)
        .filter_map(|caps| caps.get(1))
        .filter_map(|m| m.as_str().split('.').next())
        .filter(|first| !first.is_empty() && *first != "inputs")
        .map(str::to_string)
        .collect()
}

/// Substitute every `${path}` in `template` against the execution context.
///
/// Paths walk `inputs` or a completed step's results; any miss fails the
/// whole template with a [`TemplateError`] naming the unresolved path.
pub fn resolve(template: &str, context: &ExecutionContext) -> Result<String, TemplateError> {
    let mut unresolved: Option<String> = None;
    let resolved = placeholder().replace_all(template, |caps: &regex::Captures| {
        let path = &caps[1];
        match context.get(path) {
            Some(value) => display(&value),
            None => {
                if unresolved.is_none() {
                    unresolved = Some(path.to_string());
                }
                String::new()
            }
        }
    });

    match unresolved {
        Some(path) => Err(TemplateError { path }),
        None => Ok(resolved.into_owned()),
    }
}
