//! Integration tests for the twine CLI commands.
//!
//! These exercise the same code paths as the binary, against a temporary
//! workspace of skill-backed flows so no network access is needed.

use std::path::Path;

use twine_cli::commands;
use twine_cli::commands::flow::RunOptions;

fn write(path: &Path, contents: &str) {
    std::fs::write(path, contents).unwrap();
}

/// A workspace with one skill (`stamp`, wraps its input in JSON) and one
/// two-step flow chaining it.
fn setup(dir: &Path) {
    let skills = dir.join("skills");
    let flows = dir.join("flows");
    std::fs::create_dir_all(&skills).unwrap();
    std::fs::create_dir_all(&flows).unwrap();

    write(
        &skills.join("stamp.sh"),
        "#!/bin/sh\ninput=$(cat)\nprintf '{\"stamped\": %s}' \"$input\"\n",
    );
    write(
        &skills.join("stamp.yaml"),
        &format!(
            "name: stamp\ndescription: wraps input\noutputs:\n  - name: stamped\ncommand: [sh, \"{}\"]\n",
            skills.join("stamp.sh").display()
        ),
    );

    write(
        &flows.join("double.yaml"),
        r#"
name: double
description: stamp twice
inputs:
  - name: seed
    required: true
outputs:
  - name: final
    source: second.stamped
steps:
  first:
    skill: stamp
    inputs:
      value: "${inputs.seed}"
  second:
    skill: stamp
    inputs:
      value: "${first.stamped.value}"
"#,
    );
}

fn run_options(params: Vec<String>) -> RunOptions {
    RunOptions {
        dry_run: false,
        output: None,
        json: false,
        params,
        quiet: true,
        verbose: false,
    }
}

#[tokio::test]
async fn flow_run_writes_json_output_file() {
    let dir = tempfile::tempdir().unwrap();
    setup(dir.path());
    let out_file = dir.path().join("out.json");

    let mut options = run_options(vec!["seed=hello".to_string()]);
    options.json = true;
    options.output = Some(out_file.clone());

    commands::flow::run(
        &dir.path().join("flows"),
        &dir.path().join("prompts"),
        &dir.path().join("skills"),
        "double",
        options,
    )
    .await
    .unwrap();

    let written: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&out_file).unwrap()).unwrap();
    assert_eq!(written["final"], serde_json::json!({"value": "hello"}));
}

#[tokio::test]
async fn flow_run_dry_run_succeeds_without_scripts() {
    let dir = tempfile::tempdir().unwrap();
    setup(dir.path());
    std::fs::remove_file(dir.path().join("skills/stamp.sh")).unwrap();

    let mut options = run_options(vec!["seed=x".to_string()]);
    options.dry_run = true;

    commands::flow::run(
        &dir.path().join("flows"),
        &dir.path().join("prompts"),
        &dir.path().join("skills"),
        "double",
        options,
    )
    .await
    .unwrap();
}

#[tokio::test]
async fn flow_run_missing_required_input_errors() {
    let dir = tempfile::tempdir().unwrap();
    setup(dir.path());

    let err = commands::flow::run(
        &dir.path().join("flows"),
        &dir.path().join("prompts"),
        &dir.path().join("skills"),
        "double",
        run_options(Vec::new()),
    )
    .await
    .unwrap_err();
    assert!(err.contains("seed"));
}

#[tokio::test]
async fn flow_run_unknown_flow_errors() {
    let dir = tempfile::tempdir().unwrap();
    setup(dir.path());

    let err = commands::flow::run(
        &dir.path().join("flows"),
        &dir.path().join("prompts"),
        &dir.path().join("skills"),
        "ghost",
        run_options(Vec::new()),
    )
    .await
    .unwrap_err();
    assert!(err.contains("not found"));
}

#[test]
fn flow_inspection_commands_work() {
    let dir = tempfile::tempdir().unwrap();
    setup(dir.path());
    let flows = dir.path().join("flows");

    commands::flow::list(&flows).unwrap();
    commands::flow::show(&flows, "double").unwrap();
    commands::flow::graph(&flows, "double").unwrap();
    commands::flow::test(&flows, "double").unwrap();
}

#[test]
fn skill_list_reads_specs() {
    let dir = tempfile::tempdir().unwrap();
    setup(dir.path());
    commands::skill::list(&dir.path().join("skills")).unwrap();
}

#[tokio::test]
async fn skill_run_executes_by_name() {
    let dir = tempfile::tempdir().unwrap();
    setup(dir.path());

    commands::skill::run(
        &dir.path().join("skills"),
        "stamp",
        &["value=direct".to_string()],
        false,
    )
    .await
    .unwrap();
}
