// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Coder worker: runs the external agent against a candidate worktree.
//!
//! The rendered system prompt goes into a sentinel file inside the
//! worktree; the agent finds it through the `AURELIA_SYSTEM_MD` env var.
//! The agent's stream-JSON transcript is captured to
//! `logs/transcripts/<task_id>.jsonl` and parsed for the final response
//! and token usage. Whatever the agent changed is committed on the
//! candidate branch so later candidates can fork from it.

use super::{truncate, WorkerContext};
use aurelia_adapters::agent::{self, AgentInvocation, SANDBOX_WORKDIR, SYSTEM_PROMPT_ENV};
use aurelia_adapters::{GitRepo, SandboxSpec};
use aurelia_core::TaskResult;
use serde_json::json;
use std::path::Path;
use tracing::{debug, warn};

pub async fn run(ctx: WorkerContext) -> TaskResult {
    let task = &ctx.task;
    let Some(worktree) = ctx.worktree() else {
        return TaskResult::failed("coder task has no worktree_path in context");
    };
    if !worktree.is_dir() {
        return TaskResult::failed(format!("worktree missing: {}", worktree.display()));
    }

    ctx.events.emit(
        "coder.started",
        json!({"task_id": task.id, "branch": task.branch}),
    );

    // Lazy image build before the first sandboxed run
    if ctx.config.agent.sandbox {
        if let Err(error) = ensure_image(&ctx).await {
            ctx.events.emit(
                "coder.failed",
                json!({"task_id": task.id, "error": error}),
            );
            return TaskResult::failed(error);
        }
    }

    // System prompt sentinel, removed again no matter how the run ends
    let workdir = if ctx.config.agent.sandbox {
        SANDBOX_WORKDIR.to_string()
    } else {
        worktree.display().to_string()
    };
    let prompt = crate::prompts::render_coder_prompt(
        task.context_str("problem_description").unwrap_or_default(),
        &task.branch,
        &workdir,
        &task.instruction,
        task.context_str("feedback").unwrap_or_default(),
    );
    let sentinel = worktree.join(crate::prompts::SYSTEM_PROMPT_FILE);
    if let Err(e) = std::fs::write(&sentinel, &prompt) {
        return TaskResult::failed(format!("failed to write system prompt: {e}"));
    }

    let result = run_agent_step(&ctx, &worktree, &workdir).await;

    // The sentinel must be gone before the commit below picks it up
    if let Err(e) = std::fs::remove_file(&sentinel) {
        debug!(error = %e, "sentinel already gone");
    }

    if !result.is_err() {
        // Commit whatever the agent changed so the branch tip reflects it
        // and later candidates can fork from this one
        if let Err(error) = commit_changes(&worktree, &task.id).await {
            warn!(task_id = %task.id, %error, "failed to commit agent changes");
        }
    }
    result
}

async fn run_agent_step(ctx: &WorkerContext, worktree: &Path, workdir: &str) -> TaskResult {
    let task = &ctx.task;
    let agent_config = &ctx.config.agent;

    let sentinel_for_agent = format!("{}/{}", workdir, crate::prompts::SYSTEM_PROMPT_FILE);
    let mut env = vec![(SYSTEM_PROMPT_ENV.to_string(), sentinel_for_agent)];
    for key in &agent_config.env_forward {
        if let Ok(value) = std::env::var(key) {
            env.push((key.clone(), value));
        }
    }

    let invocation = AgentInvocation {
        command: agent_config.command.clone(),
        worktree: worktree.to_path_buf(),
        env,
        sandbox: agent_config.sandbox.then(|| SandboxSpec {
            image: agent_config.image.clone(),
            memory_limit: agent_config.memory_limit.clone(),
            cpu_limit: agent_config.cpu_limit,
            network: agent_config.network,
            timeout_s: agent_config.timeout_s,
        }),
        timeout_s: agent_config.timeout_s,
    };

    let outcome = match agent::run_agent(&ctx.docker, &invocation, &ctx.cancel).await {
        Ok(outcome) => outcome,
        Err(error) => {
            ctx.events.emit(
                "coder.failed",
                json!({"task_id": task.id, "error": error}),
            );
            return TaskResult::failed(error);
        }
    };

    // Save the transcript before looking at the exit code; a failed run's
    // transcript is the main debugging artifact
    let transcript_path = save_transcript(ctx, &outcome.transcript);
    if let Some(path) = &transcript_path {
        ctx.events.emit(
            "coder.transcript",
            json!({"task_id": task.id, "path": path}),
        );
    }
    let artifacts: Vec<String> = transcript_path.into_iter().collect();

    let parsed = agent::parse_transcript(&outcome.transcript);

    if outcome.exit_code != 0 {
        let error = format!(
            "agent exited with code {}: {}",
            outcome.exit_code,
            truncate(&outcome.stderr, 500)
        );
        ctx.events.emit(
            "coder.failed",
            json!({"task_id": task.id, "exit_code": outcome.exit_code, "error": error}),
        );
        return TaskResult {
            summary: error.clone(),
            artifacts,
            error: Some(error),
            usage: Some(parsed.usage),
            ..TaskResult::default()
        };
    }

    let summary = parsed
        .response
        .unwrap_or_else(|| "No response from agent".to_string());
    ctx.events
        .emit("coder.completed", json!({"task_id": task.id}));

    TaskResult {
        summary,
        artifacts,
        usage: Some(parsed.usage),
        ..TaskResult::default()
    }
}

async fn ensure_image(ctx: &WorkerContext) -> Result<(), String> {
    let agent_config = &ctx.config.agent;
    match ctx.docker.image_exists(&agent_config.image).await {
        Ok(true) => Ok(()),
        Ok(false) => {
            let Some(dockerfile) = &agent_config.dockerfile else {
                return Err(format!(
                    "sandbox image '{}' missing and no dockerfile configured",
                    agent_config.image
                ));
            };
            ctx.events.emit(
                "coder.image_build.started",
                json!({"image": agent_config.image}),
            );
            ctx.docker
                .build_image(Path::new(dockerfile), &agent_config.image, None)
                .await
                .map_err(|e| e.to_string())?;
            ctx.events.emit(
                "coder.image_build.completed",
                json!({"image": agent_config.image}),
            );
            Ok(())
        }
        Err(e) => Err(e.to_string()),
    }
}

fn save_transcript(ctx: &WorkerContext, transcript: &str) -> Option<String> {
    let dir = ctx.aurelia_dir.join("logs").join("transcripts");
    if let Err(e) = std::fs::create_dir_all(&dir) {
        warn!(error = %e, "cannot create transcript directory");
        return None;
    }
    let path = dir.join(format!("{}.jsonl", ctx.task.id));
    match std::fs::write(&path, transcript) {
        Ok(()) => Some(path.display().to_string()),
        Err(e) => {
            warn!(error = %e, "cannot save transcript");
            None
        }
    }
}

#[cfg(test)]
#[path = "coder_tests.rs"]
mod tests;

/// Stage and commit everything in the worktree. A clean tree is not an
/// error.
async fn commit_changes(worktree: &Path, task_id: &str) -> Result<(), String> {
    let repo = GitRepo::new(worktree);
    repo.run(&["add", "-A"]).await.map_err(|e| e.to_string())?;

    let status = repo
        .run(&["status", "--porcelain"])
        .await
        .map_err(|e| e.to_string())?;
    if status.is_empty() {
        return Ok(());
    }

    let message = format!("aurelia: changes from {task_id}");
    repo.run(&["commit", "-m", &message])
        .await
        .map_err(|e| e.to_string())?;
    Ok(())
}
