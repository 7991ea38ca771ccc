// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workflow configuration loading.
//!
//! Reads `.aurelia/config/workflow.yaml`. Only recognized keys under the
//! `runtime:` and `agent:` sections are applied; unknown keys are warned
//! about and dropped, and type mismatches fall back to the defaults.
//! A missing file yields the default configuration.

use aurelia_core::{AgentConfig, DispatcherKind, RuntimeConfig};
use serde_yaml::Value;
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};

/// Errors loading the workflow configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid workflow.yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Load the runtime configuration from `<aurelia_dir>/config/workflow.yaml`.
pub fn load_runtime_config(aurelia_dir: &Path) -> Result<RuntimeConfig, ConfigError> {
    let path = aurelia_dir.join("config").join("workflow.yaml");
    if !path.exists() {
        return Ok(RuntimeConfig::default());
    }

    info!(path = %path.display(), "loading workflow config");
    let raw = std::fs::read_to_string(&path)?;
    let doc: Value = serde_yaml::from_str(&raw)?;

    let mut config = RuntimeConfig::default();
    let Some(doc) = doc.as_mapping() else {
        warn!("workflow.yaml is not a mapping; using defaults");
        return Ok(config);
    };

    if let Some(runtime) = doc.get("runtime") {
        apply_runtime_section(&mut config, runtime);
    }
    if let Some(agent) = doc.get("agent") {
        apply_agent_section(&mut config.agent, agent);
    }

    Ok(config)
}

fn apply_runtime_section(config: &mut RuntimeConfig, section: &Value) {
    let Some(map) = section.as_mapping() else {
        warn!("'runtime' key is not a mapping; ignoring");
        return;
    };

    for (key, value) in map {
        let Some(key) = key.as_str() else {
            warn!(?key, "non-string runtime config key; ignoring");
            continue;
        };
        match key {
            "max_concurrent_tasks" => {
                set_usize(key, value, &mut config.max_concurrent_tasks);
            }
            "heartbeat_interval_s" => set_u64(key, value, &mut config.heartbeat_interval_s),
            "candidate_abandon_threshold" => {
                set_usize(key, value, &mut config.candidate_abandon_threshold);
            }
            "termination_condition" => set_string(key, value, &mut config.termination_condition),
            "presubmit_checks" => set_string_list(key, value, &mut config.presubmit_checks),
            "dispatcher" => match value.as_str() {
                Some("default") => config.dispatcher = DispatcherKind::Default,
                Some("planner") => config.dispatcher = DispatcherKind::Planner,
                other => warn!(key, ?other, "unknown dispatcher; keeping default"),
            },
            "task_timeout_s" => set_u64(key, value, &mut config.task_timeout_s),
            "eval_command" => set_string(key, value, &mut config.eval_command),
            "heartbeat_stale_threshold_s" => {
                set_u64(key, value, &mut config.heartbeat_stale_threshold_s);
            }
            unknown => warn!(key = unknown, "ignoring unknown runtime config key"),
        }
    }
}

fn apply_agent_section(agent: &mut AgentConfig, section: &Value) {
    let Some(map) = section.as_mapping() else {
        warn!("'agent' key is not a mapping; ignoring");
        return;
    };

    for (key, value) in map {
        let Some(key) = key.as_str() else {
            warn!(?key, "non-string agent config key; ignoring");
            continue;
        };
        match key {
            "command" => set_string(key, value, &mut agent.command),
            "sandbox" => set_bool(key, value, &mut agent.sandbox),
            "image" => set_string(key, value, &mut agent.image),
            "dockerfile" => match value.as_str() {
                Some(path) => agent.dockerfile = Some(path.to_string()),
                None => warn!(key, "expected a string; ignoring"),
            },
            "memory_limit" => set_string(key, value, &mut agent.memory_limit),
            "cpu_limit" => match value.as_f64() {
                Some(v) => agent.cpu_limit = v,
                None => warn!(key, "expected a number; ignoring"),
            },
            "network" => set_bool(key, value, &mut agent.network),
            "env_forward" => set_string_list(key, value, &mut agent.env_forward),
            "timeout_s" => set_u64(key, value, &mut agent.timeout_s),
            unknown => warn!(key = unknown, "ignoring unknown agent config key"),
        }
    }
}

fn set_string(key: &str, value: &Value, target: &mut String) {
    match value.as_str() {
        Some(v) => *target = v.to_string(),
        None => warn!(key, "expected a string; ignoring"),
    }
}

fn set_bool(key: &str, value: &Value, target: &mut bool) {
    match value.as_bool() {
        Some(v) => *target = v,
        None => warn!(key, "expected a bool; ignoring"),
    }
}

fn set_u64(key: &str, value: &Value, target: &mut u64) {
    match value.as_u64() {
        Some(v) => *target = v,
        None => warn!(key, "expected a non-negative integer; ignoring"),
    }
}

fn set_usize(key: &str, value: &Value, target: &mut usize) {
    match value.as_u64() {
        Some(v) => *target = v as usize,
        None => warn!(key, "expected a non-negative integer; ignoring"),
    }
}

fn set_string_list(key: &str, value: &Value, target: &mut Vec<String>) {
    let Some(seq) = value.as_sequence() else {
        warn!(key, "expected a list of strings; ignoring");
        return;
    };
    let mut out = Vec::with_capacity(seq.len());
    for entry in seq {
        match entry.as_str() {
            Some(v) => out.push(v.to_string()),
            None => {
                warn!(key, "non-string list entry; ignoring list");
                return;
            }
        }
    }
    *target = out;
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
