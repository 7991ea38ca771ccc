// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-wide runtime state, persisted to `state/runtime.json`.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Orchestrator process status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeStatus {
    Stopped,
    Running,
}

impl fmt::Display for RuntimeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeStatus::Stopped => write!(f, "stopped"),
            RuntimeStatus::Running => write!(f, "running"),
        }
    }
}

fn default_next_event_seq() -> u64 {
    1
}

/// Mutable runtime state singleton.
///
/// `next_event_seq` and every counter in `next_seq` are monotone across
/// saves; they back the [`crate::IdGenerator`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeState {
    pub status: RuntimeStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stopped_at: Option<DateTime<Utc>>,

    // Global sequence counters (monotone, deterministic)
    #[serde(default = "default_next_event_seq")]
    pub next_event_seq: u64,
    #[serde(default)]
    pub next_seq: IndexMap<String, u64>,

    // Operational counters
    #[serde(default)]
    pub heartbeat_count: u64,
    #[serde(default)]
    pub total_tasks_dispatched: u64,
    #[serde(default)]
    pub total_tasks_completed: u64,
    #[serde(default)]
    pub total_tasks_failed: u64,
    #[serde(default)]
    pub total_tokens_used: u64,
    #[serde(default)]
    pub total_cost_usd: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_heartbeat_at: Option<DateTime<Utc>>,
}

impl Default for RuntimeState {
    fn default() -> Self {
        Self {
            status: RuntimeStatus::Stopped,
            started_at: None,
            stopped_at: None,
            next_event_seq: 1,
            next_seq: IndexMap::new(),
            heartbeat_count: 0,
            total_tasks_dispatched: 0,
            total_tasks_completed: 0,
            total_tasks_failed: 0,
            total_tokens_used: 0,
            total_cost_usd: 0.0,
            last_heartbeat_at: None,
        }
    }
}
