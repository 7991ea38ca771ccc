// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Plan-driven dispatcher.
//!
//! Works from a structured plan produced by the planner agent. Each plan
//! item maps 1:1 to a candidate branch and progresses through
//! todo → assigned → complete/failed. Replanning merges a new `plan.json`
//! with the current plan, preserving every item that already left `todo`.

use super::{DispatchContext, Dispatcher};
use aurelia_core::{
    Candidate, CandidateStatus, DispatchRequest, Evaluation, Plan, PlanItem, PlanItemStatus,
    TaskResult,
};
use chrono::Utc;
use serde_json::{json, Map, Value};
use std::path::Path;
use tracing::{info, warn};

/// Dispatcher that selects dependency-resolved items from a plan.
#[derive(Default)]
pub struct PlanDispatcher {
    plan: Option<Plan>,
    instruction: String,
    evaluations: Vec<Evaluation>,
}

impl PlanDispatcher {
    /// `plan` is the persisted plan from a previous run, if any.
    pub fn new(plan: Option<Plan>) -> Self {
        Self {
            plan,
            instruction: String::new(),
            evaluations: Vec::new(),
        }
    }

    /// TODO items whose dependencies are all complete and whose parent
    /// branch is resolvable right now.
    fn eligible_items(&self) -> Vec<&PlanItem> {
        let Some(plan) = &self.plan else {
            return Vec::new();
        };

        let completed: Vec<&str> = plan
            .items
            .iter()
            .filter(|it| it.status == PlanItemStatus::Complete)
            .map(|it| it.id.as_str())
            .collect();

        plan.items
            .iter()
            .filter(|item| item.status == PlanItemStatus::Todo)
            .filter(|item| {
                item.depends_on
                    .iter()
                    .all(|dep| completed.contains(&dep.as_str()))
            })
            .filter(|item| self.resolve_branch(&item.parent_branch).is_some())
            .collect()
    }

    /// Resolve `$plan-XXXX` references to the referenced item's assigned
    /// branch. A reference resolves only when that item is complete.
    fn resolve_branch(&self, parent_branch: &str) -> Option<String> {
        let Some(ref_id) = parent_branch.strip_prefix('$') else {
            return Some(parent_branch.to_string());
        };

        let item = self.plan.as_ref()?.find_item(ref_id)?;
        if item.status != PlanItemStatus::Complete {
            return None;
        }
        item.assigned_branch.clone()
    }
}

impl Dispatcher for PlanDispatcher {
    fn initialize(&mut self, ctx: DispatchContext) {
        self.instruction = ctx.instruction;
        self.evaluations = ctx.evaluations;
    }

    fn select_next(&mut self) -> Option<DispatchRequest> {
        let mut eligible = self.eligible_items();
        eligible.sort_by_key(|item| item.priority);
        let item = eligible.first()?;

        let parent_branch = self.resolve_branch(&item.parent_branch)?;
        let mut context = Map::new();
        context.insert("plan_item_id".to_string(), json!(item.id));
        context.insert("plan_item_description".to_string(), json!(item.description));

        Some(DispatchRequest {
            parent_branch,
            instruction: item.instruction.clone(),
            context,
            plan_item_id: Some(item.id.clone()),
        })
    }

    fn mark_assigned(&mut self, plan_item_id: &str, candidate: &Candidate) {
        let Some(plan) = &mut self.plan else { return };
        if let Some(item) = plan.find_item_mut(plan_item_id) {
            item.status = PlanItemStatus::Assigned;
            item.assigned_candidate_id = Some(candidate.id.clone());
            item.assigned_branch = Some(candidate.branch.clone());
        }
    }

    fn on_candidate_completed(&mut self, candidate: &Candidate, evaluation: Option<&Evaluation>) {
        if let Some(evaluation) = evaluation {
            self.evaluations.push(evaluation.clone());
        }

        let Some(plan) = &mut self.plan else { return };
        let Some(item) = plan
            .items
            .iter_mut()
            .find(|it| it.assigned_candidate_id.as_deref() == Some(candidate.id.as_str()))
        else {
            return;
        };

        item.status = if candidate.status == CandidateStatus::Succeeded {
            PlanItemStatus::Complete
        } else {
            PlanItemStatus::Failed
        };
    }

    fn needs_planning(&self) -> bool {
        let Some(plan) = &self.plan else {
            return true;
        };

        let has_todo = plan
            .items
            .iter()
            .any(|it| it.status == PlanItemStatus::Todo);
        if !has_todo {
            return true;
        }

        if self.eligible_items().is_empty() {
            // Every TODO item is blocked; if nothing is assigned either,
            // the plan is deadlocked and must be replanned
            let has_assigned = plan
                .items
                .iter()
                .any(|it| it.status == PlanItemStatus::Assigned);
            return !has_assigned;
        }

        false
    }

    fn get_planning_context(&self) -> Map<String, Value> {
        let mut context = Map::new();
        context.insert("problem_description".to_string(), json!(self.instruction));

        if !self.evaluations.is_empty() {
            let history: Vec<Value> = self
                .evaluations
                .iter()
                .map(|ev| {
                    json!({
                        "candidate_branch": ev.candidate_branch,
                        "metrics": ev.metrics,
                        "passed": ev.passed,
                    })
                })
                .collect();
            context.insert("evaluation_history".to_string(), Value::Array(history));
        }

        if let Some(plan) = &self.plan {
            let items: Vec<Value> = plan
                .items
                .iter()
                .map(|it| {
                    json!({
                        "id": it.id,
                        "description": it.description,
                        "status": it.status.to_string(),
                        "assigned_branch": it.assigned_branch,
                    })
                })
                .collect();
            context.insert(
                "current_plan".to_string(),
                json!({
                    "summary": plan.summary,
                    "revision": plan.revision,
                    "items": items,
                }),
            );
        }

        context
    }

    fn on_planning_completed(&mut self, result: &TaskResult, worktree_path: &Path) {
        if let Some(error) = &result.error {
            warn!(%error, "planning failed; plan unchanged");
            return;
        }

        let plan_file = worktree_path.join("plan.json");
        let raw = match std::fs::read_to_string(&plan_file) {
            Ok(raw) => raw,
            Err(_) => {
                warn!(path = %plan_file.display(), "planner did not produce plan.json");
                return;
            }
        };
        let plan_data: Value = match serde_json::from_str(&raw) {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "invalid plan.json; plan unchanged");
                return;
            }
        };

        // Items that already left todo are preserved verbatim across
        // revisions, whether or not the new plan mentions them
        let (preserved, new_revision): (Vec<PlanItem>, u32) = match &self.plan {
            Some(plan) => (
                plan.items
                    .iter()
                    .filter(|it| it.status != PlanItemStatus::Todo)
                    .cloned()
                    .collect(),
                plan.revision + 1,
            ),
            None => (Vec::new(), 0),
        };

        let mut items: Vec<PlanItem> = Vec::new();
        let empty = Vec::new();
        for item_data in plan_data
            .get("items")
            .and_then(Value::as_array)
            .unwrap_or(&empty)
        {
            let id = item_data
                .get("id")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            if id.is_empty() {
                continue;
            }
            if let Some(existing) = preserved.iter().find(|it| it.id == id) {
                items.push(existing.clone());
                continue;
            }
            items.push(PlanItem {
                id,
                description: item_data
                    .get("description")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                instruction: item_data
                    .get("instruction")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                parent_branch: item_data
                    .get("parent_branch")
                    .and_then(Value::as_str)
                    .unwrap_or("main")
                    .to_string(),
                status: PlanItemStatus::Todo,
                priority: item_data
                    .get("priority")
                    .and_then(Value::as_i64)
                    .unwrap_or(0),
                depends_on: item_data
                    .get("depends_on")
                    .and_then(Value::as_array)
                    .map(|deps| {
                        deps.iter()
                            .filter_map(Value::as_str)
                            .map(str::to_string)
                            .collect()
                    })
                    .unwrap_or_default(),
                assigned_candidate_id: None,
                assigned_branch: None,
            });
        }

        // Preserved items dropped by the new plan still carry state the
        // dispatcher needs ($plan refs, completion history); keep them
        for item in preserved {
            if !items.iter().any(|it| it.id == item.id) {
                items.push(item);
            }
        }

        let item_count = items.len();
        self.plan = Some(Plan {
            id: format!("plan-{new_revision:04}"),
            summary: plan_data
                .get("summary")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            items,
            created_at: Utc::now(),
            revision: new_revision,
        });
        info!(revision = new_revision, items = item_count, "loaded plan");
    }

    fn current_plan(&self) -> Option<&Plan> {
        self.plan.as_ref()
    }
}

#[cfg(test)]
#[path = "plan_tests.rs"]
mod tests;
