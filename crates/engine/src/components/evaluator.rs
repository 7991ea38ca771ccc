// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Evaluator worker: runs the evaluation command and parses metrics.
//!
//! The evaluation command must print a single JSON object of numeric
//! metrics to stdout. Human-readable output before the final JSON line is
//! tolerated: when the whole stdout is not valid JSON, the last non-empty
//! line is tried instead. Non-zero exits, timeouts, and unparseable
//! output all become failed results.
//!
//! A consolidated variant runs presubmit checks first when the task
//! context carries them; the runtime's pipeline uses the dedicated
//! presubmit component instead.

use super::{truncate, WorkerContext};
use aurelia_adapters::subprocess::run_shell_in_group;
use aurelia_core::TaskResult;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;

/// Timeout for the evaluation command and each presubmit check.
const EVAL_TIMEOUT: Duration = Duration::from_secs(120);

pub async fn run(ctx: WorkerContext) -> TaskResult {
    let task = &ctx.task;
    let Some(worktree) = ctx.worktree() else {
        return TaskResult::failed("evaluator task has no worktree_path in context");
    };

    let eval_command = task
        .context_str("eval_command")
        .unwrap_or(&ctx.config.eval_command)
        .to_string();

    // Consolidated variant: presubmit checks folded into the evaluator
    let checks: Vec<String> = task
        .context
        .get("presubmit_checks")
        .and_then(Value::as_array)
        .map(|list| {
            list.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    if !checks.is_empty() {
        ctx.events.emit(
            "eval.presubmit_started",
            json!({
                "task_id": task.id,
                "worktree": worktree.display().to_string(),
                "checks": checks,
            }),
        );
        for check in &checks {
            let output =
                match run_shell_in_group(check, &worktree, &[], EVAL_TIMEOUT, &ctx.cancel).await {
                    Ok(output) => output,
                    Err(error) => return presubmit_failure(&ctx, check, error),
                };
            if output.timed_out() {
                let error = format!("Presubmit check '{check}' timed out");
                return presubmit_failure(&ctx, check, error);
            }
            if output.exit_code != 0 {
                let mut error =
                    format!("Presubmit check '{}' failed (exit {})", check, output.exit_code);
                let detail = if output.stderr.is_empty() {
                    &output.stdout
                } else {
                    &output.stderr
                };
                if !detail.is_empty() {
                    error.push_str(": ");
                    error.push_str(&truncate(detail, 500));
                }
                return presubmit_failure(&ctx, check, error);
            }
        }
        ctx.events.emit(
            "eval.presubmit_passed",
            json!({"task_id": task.id, "checks_passed": checks.len()}),
        );
    }

    ctx.events.emit(
        "eval.started",
        json!({
            "task_id": task.id,
            "worktree": worktree.display().to_string(),
            "command": eval_command,
        }),
    );

    let output =
        match run_shell_in_group(&eval_command, &worktree, &[], EVAL_TIMEOUT, &ctx.cancel).await {
            Ok(output) => output,
            Err(error) => {
                ctx.events.emit(
                    "eval.failed",
                    json!({"task_id": task.id, "error": error}),
                );
                return TaskResult::failed(error);
            }
        };

    if output.timed_out() {
        let error = format!("Evaluation timed out after {}s", EVAL_TIMEOUT.as_secs());
        ctx.events
            .emit("eval.failed", json!({"task_id": task.id, "error": error}));
        return TaskResult::failed(error);
    }

    if output.exit_code != 0 {
        let detail = if output.stderr.is_empty() {
            &output.stdout
        } else {
            &output.stderr
        };
        let error = format!(
            "Evaluation failed (exit {}): {}",
            output.exit_code,
            truncate(detail, 500)
        );
        ctx.events
            .emit("eval.failed", json!({"task_id": task.id, "error": error}));
        return TaskResult::failed(error);
    }

    let Some(metrics) = parse_metrics(&output.stdout) else {
        let error = "Evaluation output not valid JSON".to_string();
        ctx.events
            .emit("eval.failed", json!({"task_id": task.id, "error": error}));
        return TaskResult {
            summary: error.clone(),
            error: Some(truncate(&output.stdout, 500)),
            ..TaskResult::default()
        };
    };

    ctx.events.emit(
        "eval.completed",
        json!({"task_id": task.id, "metrics": metrics}),
    );

    TaskResult {
        summary: output.stdout.trim().to_string(),
        metrics,
        ..TaskResult::default()
    }
}

fn presubmit_failure(ctx: &WorkerContext, check: &str, error: String) -> TaskResult {
    ctx.events.emit(
        "eval.presubmit_failed",
        json!({"task_id": ctx.task.id, "check": check, "error": error}),
    );
    TaskResult::failed(error)
}

/// Parse stdout as a JSON object of numeric metrics, falling back to the
/// last non-empty line.
fn parse_metrics(stdout: &str) -> Option<HashMap<String, f64>> {
    if let Some(metrics) = metrics_from_json(stdout.trim()) {
        return Some(metrics);
    }
    stdout
        .lines()
        .rev()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .and_then(metrics_from_json)
}

fn metrics_from_json(raw: &str) -> Option<HashMap<String, f64>> {
    let value: Value = serde_json::from_str(raw).ok()?;
    let object = value.as_object()?;
    Some(
        object
            .iter()
            .filter_map(|(k, v)| v.as_f64().map(|n| (k.clone(), n)))
            .collect(),
    )
}

#[cfg(test)]
#[path = "evaluator_tests.rs"]
mod tests;
