//! `twine skill` — run a single skill or list available ones.

use std::path::Path;
use std::sync::Arc;

use twine_core::skill::{self, SkillEngine, SkillSpec};

use super::progress::TerminalReporter;
use super::{collect_params, truncate};

/// Run a skill by name.
pub async fn run(
    skills_dir: &Path,
    name: &str,
    params: &[String],
    verbose: bool,
) -> Result<(), String> {
    let path = skills_dir.join(format!("{}.yaml", name));
    let spec = SkillSpec::from_file(&path).map_err(|e| e.to_string())?;

    let engine = SkillEngine::new(spec, skills_dir)
        .with_progress(Arc::new(TerminalReporter::new(verbose)));

    let inputs = collect_params(params)?;
    let result = engine.execute(inputs).await.map_err(|e| e.to_string())?;
    println!("{}", twine_core::value::display(&result));
    Ok(())
}

/// List the skills available in a directory.
pub fn list(skills_dir: &Path) -> Result<(), String> {
    let skills = skill::list_skills(skills_dir);
    if skills.is_empty() {
        println!("No skills found in {}", skills_dir.display());
        return Ok(());
    }

    println!("\nAvailable skills ({} total):", skills.len());
    println!("{:<20} {:<10} {:<50}", "Name", "Version", "Description");
    println!("{}", "-".repeat(80));
    for skill in skills {
        println!(
            "{:<20} {:<10} {:<50}",
            skill.name,
            skill.version,
            truncate(&skill.description, 50)
        );
    }
    Ok(())
}
