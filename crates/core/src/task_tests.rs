// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;

#[test]
fn test_status_serializes_snake_case() {
    assert_eq!(
        serde_json::to_value(TaskStatus::Running).unwrap(),
        json!("running")
    );
    assert_eq!(
        serde_json::to_value(Component::Presubmit).unwrap(),
        json!("presubmit")
    );
}

#[test]
fn test_terminal_statuses() {
    assert!(!TaskStatus::Pending.is_terminal());
    assert!(!TaskStatus::Running.is_terminal());
    assert!(TaskStatus::Success.is_terminal());
    assert!(TaskStatus::Failed.is_terminal());
    assert!(TaskStatus::Cancelled.is_terminal());
}

#[test]
fn test_result_failed_sets_summary_and_error() {
    let result = TaskResult::failed("boom");
    assert!(result.is_err());
    assert_eq!(result.summary, "boom");
    assert_eq!(result.error.as_deref(), Some("boom"));
}

#[test]
fn test_task_round_trips_through_json() {
    let mut task = Task::new(
        "task-0001".to_string(),
        "thread-0001".to_string(),
        Component::Coder,
        "aurelia/cand-0001",
        "Improve the solution.",
    );
    task.context
        .insert("worktree_path".to_string(), json!("/tmp/wt"));
    task.status = TaskStatus::Running;
    task.started_at = Some(Utc::now());

    let json = serde_json::to_string(&task).unwrap();
    let restored: Task = serde_json::from_str(&json).unwrap();

    assert_eq!(restored.id, "task-0001");
    assert_eq!(restored.component, Component::Coder);
    assert_eq!(restored.status, TaskStatus::Running);
    assert_eq!(restored.context_str("worktree_path"), Some("/tmp/wt"));
    assert!(restored.started_at.is_some());
    assert!(restored.completed_at.is_none());
}

#[test]
fn test_usage_totals() {
    let usage = UsageStats {
        input_tokens: 120,
        output_tokens: 30,
        cost_usd: 0.01,
    };
    assert_eq!(usage.total_tokens(), 150);
}
