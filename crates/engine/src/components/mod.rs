// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Component workers.
//!
//! Each worker consumes a [`Task`] and returns a [`TaskResult`]. Faults
//! inside a worker become `TaskResult.error`, never a panic surfaced to
//! the runtime; the runtime only sees a crashed worker through its join
//! handle. Workers run on background tasks and emit events through the
//! [`EventSink`].

pub mod coder;
pub mod evaluator;
pub mod planner;
pub mod presubmit;

use crate::events::EventSink;
use aurelia_adapters::DockerClient;
use aurelia_core::{Component, RuntimeConfig, Task, TaskResult};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

/// Everything a worker needs, cloned out of the runtime at dispatch time.
pub struct WorkerContext {
    pub task: Task,
    pub config: RuntimeConfig,
    pub project_dir: PathBuf,
    pub aurelia_dir: PathBuf,
    pub events: EventSink,
    pub docker: DockerClient,
    pub cancel: CancellationToken,
}

impl WorkerContext {
    /// Worktree the task operates on, from the task context.
    pub(crate) fn worktree(&self) -> Option<PathBuf> {
        self.task.context_str("worktree_path").map(PathBuf::from)
    }
}

/// Run the task's component to completion.
pub async fn run_component(ctx: WorkerContext) -> TaskResult {
    match ctx.task.component {
        Component::Coder => coder::run(ctx).await,
        Component::Presubmit => presubmit::run(ctx).await,
        Component::Evaluator => evaluator::run(ctx).await,
        Component::Planner => planner::run(ctx).await,
    }
}

/// Truncate a string for inclusion in error messages.
pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        let mut end = max;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}…", &s[..end])
    }
}
