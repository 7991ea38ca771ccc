// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runtime and agent configuration.
//!
//! Values come from `.aurelia/config/workflow.yaml` and are immutable for
//! the life of a process.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which dispatcher strategy the runtime uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatcherKind {
    #[default]
    Default,
    Planner,
}

impl fmt::Display for DispatcherKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatcherKind::Default => write!(f, "default"),
            DispatcherKind::Planner => write!(f, "planner"),
        }
    }
}

/// External agent invocation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Shell command line that runs the agent in the worktree. The system
    /// prompt sentinel path is passed via the `AURELIA_SYSTEM_MD` env var.
    pub command: String,
    /// Run the agent in a Docker sandbox (host subprocess otherwise).
    pub sandbox: bool,
    /// Sandbox image tag.
    pub image: String,
    /// Dockerfile used to lazily build the image when it is missing.
    pub dockerfile: Option<String>,
    pub memory_limit: String,
    pub cpu_limit: f64,
    /// Network access inside the sandbox (disabled by default).
    pub network: bool,
    /// Host environment variables forwarded into the agent.
    pub env_forward: Vec<String>,
    pub timeout_s: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            command: "gemini -y -p \"Follow the system prompt and improve the solution.\" \
                      --output-format stream-json"
                .to_string(),
            sandbox: true,
            image: "aurelia-agent:latest".to_string(),
            dockerfile: None,
            memory_limit: "2g".to_string(),
            cpu_limit: 1.0,
            network: false,
            env_forward: Vec::new(),
            timeout_s: 300,
        }
    }
}

/// Configuration for the Aurelia runtime. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Caps both active candidates and running background tasks.
    pub max_concurrent_tasks: usize,
    pub heartbeat_interval_s: u64,
    /// Terminate after this many failed candidates.
    pub candidate_abandon_threshold: usize,
    /// String form `metric>=float[,metric>=float...]`; empty disables
    /// metric-based termination.
    pub termination_condition: String,
    /// Ordered shell commands run by the presubmit component.
    pub presubmit_checks: Vec<String>,
    pub dispatcher: DispatcherKind,
    pub task_timeout_s: u64,
    /// Evaluation command run in the candidate worktree.
    pub eval_command: String,
    /// Staleness knob exposed for observers; the runtime stores it but
    /// takes no action on it.
    pub heartbeat_stale_threshold_s: u64,
    pub agent: AgentConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: 4,
            heartbeat_interval_s: 60,
            candidate_abandon_threshold: 3,
            termination_condition: String::new(),
            presubmit_checks: Vec::new(),
            dispatcher: DispatcherKind::Default,
            task_timeout_s: 600,
            eval_command: "pixi run evaluate".to_string(),
            heartbeat_stale_threshold_s: 120,
            agent: AgentConfig::default(),
        }
    }
}
