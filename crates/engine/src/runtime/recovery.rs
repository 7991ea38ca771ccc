// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Crash recovery.
//!
//! Runs at startup, after the PID sentinel check and before the runtime
//! transitions to running. Tasks left `running` by a dead orchestrator
//! are failed, their candidates follow, and orphaned candidate worktrees
//! are swept. Running recovery twice over the same state is a no-op the
//! second time.

use super::Runtime;
use crate::error::RuntimeError;
use aurelia_core::{Component, TaskResult, TaskStatus, BRANCH_PREFIX};
use chrono::Utc;
use serde_json::json;
use std::collections::HashSet;
use tracing::{info, warn};

/// Error string recorded on tasks failed by recovery.
const RECOVERY_ERROR: &str = "runtime_crash_recovery";

impl Runtime {
    /// Recover from an unclean previous shutdown.
    ///
    /// Returns the number of tasks that were rewritten.
    pub(crate) async fn recover(&mut self) -> Result<usize, RuntimeError> {
        let now = Utc::now();

        // 1. Every task still marked running was lost with the previous
        //    process
        let mut recovered: Vec<(String, Component)> = Vec::new();
        for task in &mut self.tasks {
            if task.status != TaskStatus::Running {
                continue;
            }
            warn!(task_id = %task.id, component = %task.component, "recovering interrupted task");
            task.status = TaskStatus::Failed;
            task.completed_at = Some(now);
            task.result = Some(TaskResult::failed(RECOVERY_ERROR));
            self.state.total_tasks_failed += 1;
            recovered.push((task.branch.clone(), task.component));
        }

        // 2. Candidates whose coder or evaluator died with the crash are
        //    unrecoverable
        for candidate in &mut self.candidates {
            if !candidate.status.is_live() {
                continue;
            }
            let lost = recovered.iter().any(|(branch, component)| {
                branch == &candidate.branch
                    && matches!(component, Component::Coder | Component::Evaluator)
            });
            if lost {
                info!(candidate_id = %candidate.id, "failing candidate after crash");
                candidate.status = aurelia_core::CandidateStatus::Failed;
            }
        }

        // 3. Sweep candidate worktrees nothing live owns any more
        let owned: HashSet<String> = self
            .candidates
            .iter()
            .filter(|c| c.status.is_live())
            .map(|c| c.branch.clone())
            .collect();
        for (branch, path) in self.worktrees.list_active().await? {
            if branch.starts_with(BRANCH_PREFIX) && !owned.contains(&branch) {
                info!(%branch, path = %path.display(), "removing orphaned worktree");
                if let Err(e) = self.worktrees.remove(&branch).await {
                    warn!(%branch, error = %e, "orphaned worktree not removed");
                }
            }
        }

        if recovered.is_empty() {
            return Ok(0);
        }

        // Crash diagnostics: started events with no terminal counterpart
        match self.event_log.find_unmatched("task.started", "task.completed") {
            Ok(unmatched) if !unmatched.is_empty() => {
                info!(count = unmatched.len(), "event log shows unfinished task starts");
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "could not scan event log for diagnostics"),
        }

        self.emit(
            "runtime.recovered",
            json!({"tasks_recovered": recovered.len()}),
        )?;
        self.persist()?;
        Ok(recovered.len())
    }
}

#[cfg(test)]
#[path = "recovery_tests.rs"]
mod tests;
