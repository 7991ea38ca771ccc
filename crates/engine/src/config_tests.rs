// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tempfile::tempdir;

fn write_config(dir: &std::path::Path, yaml: &str) {
    let config_dir = dir.join("config");
    std::fs::create_dir_all(&config_dir).unwrap();
    std::fs::write(config_dir.join("workflow.yaml"), yaml).unwrap();
}

#[test]
fn test_missing_file_yields_defaults() {
    let dir = tempdir().unwrap();
    let config = load_runtime_config(dir.path()).unwrap();

    assert_eq!(config.max_concurrent_tasks, 4);
    assert_eq!(config.heartbeat_interval_s, 60);
    assert_eq!(config.candidate_abandon_threshold, 3);
    assert_eq!(config.termination_condition, "");
    assert_eq!(config.dispatcher, DispatcherKind::Default);
    assert!(config.agent.sandbox);
}

#[test]
fn test_recognized_keys_are_applied() {
    let dir = tempdir().unwrap();
    write_config(
        dir.path(),
        r#"
runtime:
  max_concurrent_tasks: 2
  heartbeat_interval_s: 1
  candidate_abandon_threshold: 5
  termination_condition: "accuracy>=0.9"
  presubmit_checks: ["true", "pixi run test"]
  dispatcher: planner
  task_timeout_s: 30
  eval_command: "sh eval.sh"
agent:
  command: "sh agent.sh"
  sandbox: false
  env_forward: ["GEMINI_API_KEY"]
"#,
    );

    let config = load_runtime_config(dir.path()).unwrap();
    assert_eq!(config.max_concurrent_tasks, 2);
    assert_eq!(config.heartbeat_interval_s, 1);
    assert_eq!(config.candidate_abandon_threshold, 5);
    assert_eq!(config.termination_condition, "accuracy>=0.9");
    assert_eq!(config.presubmit_checks, vec!["true", "pixi run test"]);
    assert_eq!(config.dispatcher, DispatcherKind::Planner);
    assert_eq!(config.task_timeout_s, 30);
    assert_eq!(config.eval_command, "sh eval.sh");
    assert_eq!(config.agent.command, "sh agent.sh");
    assert!(!config.agent.sandbox);
    assert_eq!(config.agent.env_forward, vec!["GEMINI_API_KEY"]);
}

#[test]
fn test_unknown_keys_are_dropped() {
    let dir = tempdir().unwrap();
    write_config(
        dir.path(),
        r#"
runtime:
  max_concurrent_tasks: 8
  frobnicate: true
  shiny_new_option: "yes"
"#,
    );

    let config = load_runtime_config(dir.path()).unwrap();
    assert_eq!(config.max_concurrent_tasks, 8);
}

#[test]
fn test_type_mismatch_keeps_default() {
    let dir = tempdir().unwrap();
    write_config(
        dir.path(),
        r#"
runtime:
  max_concurrent_tasks: "lots"
  presubmit_checks: "not-a-list"
"#,
    );

    let config = load_runtime_config(dir.path()).unwrap();
    assert_eq!(config.max_concurrent_tasks, 4);
    assert!(config.presubmit_checks.is_empty());
}

#[test]
fn test_unknown_dispatcher_keeps_default() {
    let dir = tempdir().unwrap();
    write_config(dir.path(), "runtime:\n  dispatcher: quantum\n");

    let config = load_runtime_config(dir.path()).unwrap();
    assert_eq!(config.dispatcher, DispatcherKind::Default);
}

#[test]
fn test_non_mapping_document_yields_defaults() {
    let dir = tempdir().unwrap();
    write_config(dir.path(), "- just\n- a\n- list\n");

    let config = load_runtime_config(dir.path()).unwrap();
    assert_eq!(config.max_concurrent_tasks, 4);
}

#[test]
fn test_invalid_yaml_is_an_error() {
    let dir = tempdir().unwrap();
    write_config(dir.path(), "runtime: [unclosed\n");

    assert!(load_runtime_config(dir.path()).is_err());
}
