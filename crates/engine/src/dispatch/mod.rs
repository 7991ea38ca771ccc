// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pluggable dispatch strategies.
//!
//! A dispatcher decides what to work on next: which branch to fork from,
//! what instruction to give the coder, and when a planning phase is
//! needed. The runtime drives it through the callbacks below and owns all
//! persistence.

mod default;
mod plan;

use aurelia_core::{Candidate, DispatchRequest, Evaluation, Plan, RuntimeConfig, TaskResult};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

pub use default::DefaultDispatcher;
pub use plan::PlanDispatcher;

/// Context provided to a dispatcher during initialization.
#[derive(Debug, Clone, Default)]
pub struct DispatchContext {
    pub project_dir: PathBuf,
    /// Problem statement text (the project README).
    pub instruction: String,
    pub candidates: Vec<Candidate>,
    pub evaluations: Vec<Evaluation>,
    pub config: RuntimeConfig,
}

/// Strategy interface for selecting the next unit of work.
pub trait Dispatcher: Send {
    /// Called once at runtime start with the loaded state.
    fn initialize(&mut self, ctx: DispatchContext);

    /// Return the next work item, or `None` if nothing is dispatchable.
    fn select_next(&mut self) -> Option<DispatchRequest>;

    /// Record that a plan item was assigned to a candidate.
    fn mark_assigned(&mut self, _plan_item_id: &str, _candidate: &Candidate) {}

    /// Called when a candidate finishes, with its evaluation if one was
    /// recorded.
    fn on_candidate_completed(&mut self, candidate: &Candidate, evaluation: Option<&Evaluation>);

    /// Whether a planning phase should run before more work is selected.
    fn needs_planning(&self) -> bool {
        false
    }

    /// Context map handed to the planner component.
    fn get_planning_context(&self) -> Map<String, Value> {
        Map::new()
    }

    /// Called when a planning task finishes; `worktree_path` holds the
    /// planner's output files.
    fn on_planning_completed(&mut self, _result: &TaskResult, _worktree_path: &Path) {}

    /// The dispatcher's plan, if it maintains one (persisted by the
    /// runtime at the end of each tick).
    fn current_plan(&self) -> Option<&Plan> {
        None
    }
}
