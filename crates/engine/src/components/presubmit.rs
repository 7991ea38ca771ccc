// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Presubmit worker: lightweight validation before the evaluator.
//!
//! Runs the configured shell checks in the candidate worktree, in order,
//! each in its own process group with its own timeout. The first failure
//! or timeout stops the sequence and fails the task.

use super::{truncate, WorkerContext};
use aurelia_adapters::subprocess::run_shell_in_group;
use aurelia_core::TaskResult;
use serde_json::{json, Value};
use std::time::Duration;

/// Per-check timeout.
const CHECK_TIMEOUT: Duration = Duration::from_secs(120);

pub async fn run(ctx: WorkerContext) -> TaskResult {
    let task = &ctx.task;
    let Some(worktree) = ctx.worktree() else {
        return TaskResult::failed("presubmit task has no worktree_path in context");
    };

    let checks: Vec<String> = task
        .context
        .get("checks")
        .and_then(Value::as_array)
        .map(|list| {
            list.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_else(|| ctx.config.presubmit_checks.clone());

    ctx.events.emit(
        "presubmit.started",
        json!({
            "task_id": task.id,
            "worktree": worktree.display().to_string(),
            "checks": checks,
        }),
    );

    for check in &checks {
        let output = match run_shell_in_group(check, &worktree, &[], CHECK_TIMEOUT, &ctx.cancel)
            .await
        {
            Ok(output) => output,
            Err(error) => {
                ctx.events.emit(
                    "presubmit.failed",
                    json!({"task_id": task.id, "check": check, "error": error}),
                );
                return TaskResult::failed(error);
            }
        };

        if output.timed_out() {
            let error = format!(
                "Check '{}' timed out after {}s",
                check,
                CHECK_TIMEOUT.as_secs()
            );
            ctx.events.emit(
                "presubmit.failed",
                json!({"task_id": task.id, "check": check, "error": error}),
            );
            return TaskResult::failed(error);
        }

        if output.exit_code != 0 {
            let mut error = format!("Check '{}' failed (exit {})", check, output.exit_code);
            let detail = if output.stderr.is_empty() {
                &output.stdout
            } else {
                &output.stderr
            };
            if !detail.is_empty() {
                error.push_str(": ");
                error.push_str(&truncate(detail, 500));
            }
            ctx.events.emit(
                "presubmit.failed",
                json!({"task_id": task.id, "check": check, "error": error}),
            );
            return TaskResult::failed(error);
        }
    }

    ctx.events.emit(
        "presubmit.completed",
        json!({"task_id": task.id, "checks_passed": checks.len()}),
    );

    let summary = if checks.is_empty() {
        "No checks configured"
    } else {
        "All presubmit checks passed"
    };
    TaskResult::ok(summary)
}

#[cfg(test)]
#[path = "presubmit_tests.rs"]
mod tests;
