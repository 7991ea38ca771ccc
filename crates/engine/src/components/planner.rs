// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Planner worker: runs the agent to produce `plan.json`.
//!
//! Operates in a temporary worktree forked from `main`. The planning
//! context document and plan schema are written into the worktree, the
//! agent runs with the same transcript capture as the coder, and the run
//! fails when no `plan.json` appears.

use super::WorkerContext;
use aurelia_adapters::agent::{self, AgentInvocation, SANDBOX_WORKDIR, SYSTEM_PROMPT_ENV};
use aurelia_adapters::SandboxSpec;
use aurelia_core::TaskResult;
use serde_json::json;
use std::path::Path;
use tracing::{debug, warn};

pub async fn run(ctx: WorkerContext) -> TaskResult {
    let task = &ctx.task;
    let Some(worktree) = ctx.worktree() else {
        return TaskResult::failed("planner task has no worktree_path in context");
    };
    if !worktree.is_dir() {
        return TaskResult::failed(format!("worktree missing: {}", worktree.display()));
    }

    ctx.events
        .emit("planner.started", json!({"task_id": task.id}));

    if ctx.config.agent.sandbox {
        if let Err(error) = ensure_image(&ctx).await {
            ctx.events.emit(
                "planner.failed",
                json!({"task_id": task.id, "error": error}),
            );
            return TaskResult::failed(error);
        }
    }

    // Context document, schema, and system prompt all live in the
    // worktree for the agent to read; removed again afterwards
    let planning_context = task
        .context
        .get("planning_context")
        .and_then(serde_json::Value::as_object)
        .cloned()
        .unwrap_or_default();
    let context_file = worktree.join(crate::prompts::PLANNING_CONTEXT_FILE);
    let schema_file = worktree.join(crate::prompts::PLAN_SCHEMA_FILE);
    let sentinel = worktree.join(crate::prompts::SYSTEM_PROMPT_FILE);

    let context_doc = crate::prompts::render_planning_context(&planning_context);
    let schema = match serde_json::to_string_pretty(&crate::prompts::plan_schema()) {
        Ok(schema) => schema,
        Err(e) => return TaskResult::failed(format!("cannot serialize plan schema: {e}")),
    };
    for (path, content) in [
        (&context_file, context_doc.as_str()),
        (&schema_file, schema.as_str()),
        (&sentinel, crate::prompts::planner_prompt()),
    ] {
        if let Err(e) = std::fs::write(path, content) {
            return TaskResult::failed(format!("failed to write {}: {e}", path.display()));
        }
    }

    let result = run_agent_step(&ctx, &worktree).await;

    for path in [&context_file, &schema_file, &sentinel] {
        if let Err(e) = std::fs::remove_file(path) {
            debug!(path = %path.display(), error = %e, "planner temp file already gone");
        }
    }
    result
}

async fn run_agent_step(ctx: &WorkerContext, worktree: &Path) -> TaskResult {
    let task = &ctx.task;
    let agent_config = &ctx.config.agent;

    let workdir = if agent_config.sandbox {
        SANDBOX_WORKDIR.to_string()
    } else {
        worktree.display().to_string()
    };
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
                "planner.failed",
                json!({"task_id": task.id, "error": error}),
            );
            return TaskResult::failed(error);
        }
    };

    let transcript_path = save_transcript(ctx, &outcome.transcript);
    let mut artifacts: Vec<String> = transcript_path.into_iter().collect();
    let parsed = agent::parse_transcript(&outcome.transcript);

    if outcome.exit_code != 0 {
        let error = format!(
            "planner agent exited with code {}: {}",
            outcome.exit_code,
            super::truncate(&outcome.stderr, 500)
        );
        ctx.events.emit(
            "planner.failed",
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

    let plan_file = worktree.join("plan.json");
    if !plan_file.is_file() {
        let error = "Planner did not produce plan.json".to_string();
        ctx.events.emit(
            "planner.failed",
            json!({"task_id": task.id, "error": error}),
        );
        return TaskResult {
            summary: error.clone(),
            artifacts,
            error: Some(error),
            usage: Some(parsed.usage),
            ..TaskResult::default()
        };
    }
    artifacts.push(plan_file.display().to_string());

    ctx.events.emit(
        "planner.completed",
        json!({"task_id": task.id, "has_plan": true}),
    );

    TaskResult {
        summary: parsed
            .response
            .unwrap_or_else(|| "Plan generated".to_string()),
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
                "planner.image_build.started",
                json!({"image": agent_config.image}),
            );
            ctx.docker
                .build_image(Path::new(dockerfile), &agent_config.image, None)
                .await
                .map_err(|e| e.to_string())?;
            ctx.events.emit(
                "planner.image_build.completed",
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
#[path = "planner_tests.rs"]
mod tests;
