// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for runtime tests.

use super::Runtime;
use aurelia_core::{Candidate, Component, Task, TaskResult, TaskStatus};
use chrono::Utc;
use tempfile::{tempdir, TempDir};

/// A scratch project with an initialized git repo and a fresh runtime.
pub(crate) async fn setup() -> (TempDir, Runtime) {
    let dir = tempdir().unwrap();
    let project = dir.path().join("project");
    std::fs::create_dir_all(&project).unwrap();
    std::fs::write(project.join("README.md"), "Make it faster.\n").unwrap();

    let runtime = Runtime::new(&project).unwrap();
    runtime.git.init().await.unwrap();
    runtime
        .git
        .run(&["config", "user.email", "test@example.com"])
        .await
        .unwrap();
    runtime.git.run(&["config", "user.name", "Test"]).await.unwrap();
    (dir, runtime)
}

/// A task in the given lifecycle state, with timestamps and a default
/// result filled in for terminal states.
pub(crate) fn task_with_status(
    id: &str,
    component: Component,
    branch: &str,
    status: TaskStatus,
) -> Task {
    let mut task = Task::new(
        id.to_string(),
        format!("thread-{id}"),
        component,
        branch,
        "work",
    );
    task.status = status;
    if status != TaskStatus::Pending {
        task.started_at = Some(Utc::now());
    }
    if status.is_terminal() {
        task.completed_at = Some(Utc::now());
        task.result = match status {
            TaskStatus::Success => Some(TaskResult::ok("done")),
            TaskStatus::Failed => Some(TaskResult::failed("unknown")),
            _ => None,
        };
    }
    task
}

pub(crate) fn running_task(id: &str, component: Component, branch: &str) -> Task {
    task_with_status(id, component, branch, TaskStatus::Running)
}

pub(crate) fn live_candidate(id: &str, worktree: &str) -> Candidate {
    Candidate::new(
        id.to_string(),
        format!("aurelia/{id}"),
        "main".to_string(),
        worktree.to_string(),
    )
}
