// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Code-generation agent invocation and transcript parsing.
//!
//! The agent is an external CLI that emits a stream-JSON transcript on
//! stdout: one JSON object per line. A `result` event carries the final
//! `response` plus token `stats`; `assistant` messages carry incremental
//! text. The runtime saves the raw transcript and works only with the
//! parsed summary.

use crate::docker::{ContainerOutput, DockerClient, SandboxSpec};
use crate::subprocess::run_shell_in_group;
use aurelia_core::UsageStats;
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Env var through which the agent finds its system prompt sentinel file.
pub const SYSTEM_PROMPT_ENV: &str = "AURELIA_SYSTEM_MD";

/// Workdir inside the sandbox where the worktree is mounted.
pub const SANDBOX_WORKDIR: &str = "/workspace";

/// One prepared agent run.
#[derive(Debug, Clone)]
pub struct AgentInvocation {
    /// Shell command line for the agent.
    pub command: String,
    /// Worktree the agent operates on (and is mounted at
    /// [`SANDBOX_WORKDIR`] when sandboxed).
    pub worktree: PathBuf,
    /// Environment forwarded to the agent, including the sentinel path.
    pub env: Vec<(String, String)>,
    /// Sandbox settings; `None` runs the agent as a host subprocess.
    pub sandbox: Option<SandboxSpec>,
    pub timeout_s: u64,
}

/// Raw outcome of an agent run.
#[derive(Debug, Clone)]
pub struct AgentOutcome {
    pub exit_code: i32,
    /// The stream-JSON transcript (stdout).
    pub transcript: String,
    pub stderr: String,
}

/// What the transcript amounted to.
#[derive(Debug, Clone, Default)]
pub struct TranscriptSummary {
    /// Final response text: the `result` event's `response`, or the last
    /// `assistant` message when no result event is present.
    pub response: Option<String>,
    pub usage: UsageStats,
    /// Whether a `result` event was seen at all.
    pub has_result: bool,
}

/// Run the agent either in the sandbox or as a host subprocess.
pub async fn run_agent(
    docker: &DockerClient,
    invocation: &AgentInvocation,
    cancel: &CancellationToken,
) -> Result<AgentOutcome, String> {
    match &invocation.sandbox {
        Some(spec) => {
            let command = vec![
                "sh".to_string(),
                "-c".to_string(),
                invocation.command.clone(),
            ];
            let mounts = vec![(
                invocation.worktree.clone(),
                SANDBOX_WORKDIR.to_string(),
                false,
            )];
            let run = docker.run_container(spec, &command, SANDBOX_WORKDIR, &invocation.env, &mounts);
            tokio::pin!(run);
            let output = tokio::select! {
                result = &mut run => result.map_err(|e| e.to_string())?,
                _ = cancel.cancelled() => ContainerOutput {
                    exit_code: -1,
                    stdout: String::new(),
                    stderr: "agent run cancelled".to_string(),
                },
            };
            Ok(AgentOutcome {
                exit_code: output.exit_code,
                transcript: output.stdout,
                stderr: output.stderr,
            })
        }
        None => {
            let output = run_shell_in_group(
                &invocation.command,
                &invocation.worktree,
                &invocation.env,
                Duration::from_secs(invocation.timeout_s),
                cancel,
            )
            .await?;
            Ok(AgentOutcome {
                exit_code: output.exit_code,
                transcript: output.stdout,
                stderr: output.stderr,
            })
        }
    }
}

/// Parse a stream-JSON transcript into its final response and usage.
///
/// Unparseable lines are skipped; agents interleave logging with the
/// stream on some failures.
pub fn parse_transcript(transcript: &str) -> TranscriptSummary {
    let mut summary = TranscriptSummary::default();
    let mut last_assistant: Option<String> = None;

    for line in transcript.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let Ok(value) = serde_json::from_str::<Value>(line) else {
            continue;
        };

        match value.get("type").and_then(Value::as_str) {
            Some("result") => {
                summary.has_result = true;
                if let Some(response) = value.get("response").and_then(Value::as_str) {
                    summary.response = Some(response.to_string());
                }
                if let Some(stats) = value.get("stats") {
                    summary.usage = parse_stats(stats);
                }
            }
            Some("assistant") => {
                if let Some(text) = assistant_text(&value) {
                    last_assistant = Some(text);
                }
            }
            _ => {}
        }
    }

    if summary.response.is_none() {
        summary.response = last_assistant;
    }
    debug!(
        has_result = summary.has_result,
        tokens = summary.usage.total_tokens(),
        "parsed agent transcript"
    );
    summary
}

fn parse_stats(stats: &Value) -> UsageStats {
    UsageStats {
        input_tokens: stats
            .get("input_tokens")
            .and_then(Value::as_u64)
            .unwrap_or(0),
        output_tokens: stats
            .get("output_tokens")
            .and_then(Value::as_u64)
            .unwrap_or(0),
        cost_usd: stats.get("cost_usd").and_then(Value::as_f64).unwrap_or(0.0),
    }
}

/// Extract text from an `assistant` transcript event, which is either a
/// bare `"content": "text"` or a `content` array of `{type: "text"}` parts.
fn assistant_text(value: &Value) -> Option<String> {
    let content = value.get("message").unwrap_or(value).get("content")?;
    match content {
        Value::String(text) => Some(text.clone()),
        Value::Array(parts) => {
            let texts: Vec<&str> = parts
                .iter()
                .filter(|p| p.get("type").and_then(Value::as_str) == Some("text"))
                .filter_map(|p| p.get("text").and_then(Value::as_str))
                .collect();
            if texts.is_empty() {
                None
            } else {
                Some(texts.join("\n"))
            }
        }
        _ => None,
    }
}

#[cfg(test)]
#[path = "agent_tests.rs"]
mod tests;
