// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Candidate pipeline advancement and work dispatch.
//!
//! Every candidate walks coder → presubmit → evaluator → finish, one step
//! per task. Pipeline steps are totally ordered within a candidate; there
//! is no cross-candidate ordering beyond event-log order.

use super::{Runtime, PLANNER_BRANCH};
use crate::error::RuntimeError;
use aurelia_adapters::GitNote;
use aurelia_core::{
    candidate_branch, Candidate, CandidateStatus, Component, DispatchRequest, Evaluation,
    IdGenerator, Task, TaskStatus,
};
use chrono::Utc;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

/// Pipeline steps in execution order.
const PIPELINE: [Component; 3] = [Component::Coder, Component::Presubmit, Component::Evaluator];

/// What the most recent task for a (branch, component) pair tells the
/// pipeline walk.
enum StepState {
    Missing,
    InFlight,
    Done { task_id: String },
    Faulted { error: String },
}

impl Runtime {
    /// Most recent task for a branch/component pair.
    fn step_state(&self, branch: &str, component: Component) -> StepState {
        let task = self
            .tasks
            .iter()
            .rev()
            .find(|t| t.branch == branch && t.component == component);
        match task {
            None => StepState::Missing,
            Some(t) => match t.status {
                TaskStatus::Pending | TaskStatus::Running => StepState::InFlight,
                TaskStatus::Success => StepState::Done {
                    task_id: t.id.clone(),
                },
                TaskStatus::Failed | TaskStatus::Cancelled => StepState::Faulted {
                    error: t
                        .result
                        .as_ref()
                        .and_then(|r| r.error.clone())
                        .unwrap_or_else(|| "unknown".to_string()),
                },
            },
        }
    }

    fn slots_free(&self) -> bool {
        self.running.len() < self.config.max_concurrent_tasks
    }

    /// Walk each live candidate one step along the pipeline.
    pub(crate) async fn advance_pipelines(&mut self) -> Result<(), RuntimeError> {
        for idx in 0..self.candidates.len() {
            if !self.candidates[idx].status.is_live() {
                continue;
            }
            let branch = self.candidates[idx].branch.clone();

            let mut fault: Option<String> = None;
            let mut dispatch_next: Option<Component> = None;
            let mut eval_task_id: Option<String> = None;

            for component in PIPELINE {
                match self.step_state(&branch, component) {
                    StepState::Missing => {
                        dispatch_next = Some(component);
                        break;
                    }
                    StepState::InFlight => break,
                    StepState::Faulted { error } => {
                        fault = Some(error);
                        break;
                    }
                    StepState::Done { task_id } => {
                        if component == Component::Evaluator {
                            eval_task_id = Some(task_id);
                        }
                    }
                }
            }

            if let Some(error) = fault {
                self.fail_candidate(idx, error).await?;
            } else if let Some(component) = dispatch_next {
                if self.slots_free() {
                    match component {
                        Component::Coder => {
                            // Normally dispatched at candidate creation;
                            // reconstruct a bare request if it vanished
                            let instruction =
                                format!("Improve the solution. {}", self.instruction.trim());
                            self.dispatch_coder(idx, instruction, serde_json::Map::new())?;
                        }
                        Component::Presubmit => self.dispatch_presubmit(idx)?,
                        Component::Evaluator => self.dispatch_evaluator(idx)?,
                        Component::Planner => {}
                    }
                } else {
                    debug!(%branch, "no free slot for next pipeline step");
                }
            } else if let Some(task_id) = eval_task_id {
                self.finish_candidate(idx, &task_id).await?;
            }
        }
        Ok(())
    }

    /// Record the evaluation for a fully-walked candidate and settle its
    /// final status.
    async fn finish_candidate(&mut self, idx: usize, eval_task_id: &str) -> Result<(), RuntimeError> {
        let branch = self.candidates[idx].branch.clone();
        let eval_result = self
            .tasks
            .iter()
            .find(|t| t.id == eval_task_id)
            .and_then(|t| t.result.clone())
            .unwrap_or_default();

        let metrics = eval_result.metrics.clone();
        // With no termination condition configured every successful
        // evaluation counts as passed
        let passed = self.condition.is_empty() || self.condition.satisfied_by(&metrics);

        let commit_sha = match self.git.log(&branch, 1).await {
            Ok(commits) => commits
                .first()
                .map(|c| c.sha.clone())
                .unwrap_or_else(|| "unknown".to_string()),
            Err(e) => {
                warn!(%branch, error = %e, "cannot resolve evaluated commit");
                "unknown".to_string()
            }
        };

        let eval_id = IdGenerator::next_id(&mut self.state, "eval");
        let evaluation = Evaluation {
            id: eval_id.clone(),
            task_id: eval_task_id.to_string(),
            candidate_branch: branch.clone(),
            commit_sha,
            metrics: metrics.clone(),
            raw_output: eval_result.summary,
            timestamp: Utc::now(),
            passed,
        };

        let candidate = &mut self.candidates[idx];
        candidate.evaluations.push(eval_id);
        candidate.status = if passed {
            CandidateStatus::Succeeded
        } else {
            CandidateStatus::Failed
        };
        let candidate_id = candidate.id.clone();

        self.emit(
            "candidate.evaluated",
            json!({
                "candidate_id": candidate_id,
                "branch": branch,
                "metrics": metrics,
                "passed": passed,
            }),
        )?;
        info!(%candidate_id, %branch, passed, "candidate evaluated");

        // Annotate the evaluated commit so the result travels with the
        // repository; annotation failures never fail the candidate
        if evaluation.commit_sha != "unknown" {
            let note = GitNote {
                author_component: "evaluator".to_string(),
                note_type: "evaluation".to_string(),
                content: serde_json::to_string(&evaluation.metrics).unwrap_or_default(),
                timestamp: evaluation.timestamp,
                metadata: serde_json::Map::from_iter([
                    ("evaluation_id".to_string(), json!(evaluation.id)),
                    ("passed".to_string(), json!(passed)),
                ]),
            };
            if let Err(e) = self
                .git
                .add_note(&evaluation.commit_sha, &note, "aurelia")
                .await
            {
                warn!(sha = %evaluation.commit_sha, error = %e, "could not attach evaluation note");
            }
        }

        self.evaluations.push(evaluation.clone());
        let snapshot = self.candidates[idx].clone();
        self.dispatcher
            .on_candidate_completed(&snapshot, Some(&evaluation));
        Ok(())
    }

    /// Fail a candidate after a pipeline fault and notify the dispatcher.
    async fn fail_candidate(&mut self, idx: usize, error: String) -> Result<(), RuntimeError> {
        let candidate = &mut self.candidates[idx];
        candidate.status = CandidateStatus::Failed;
        let candidate_id = candidate.id.clone();
        let branch = candidate.branch.clone();

        self.emit(
            "candidate.failed",
            json!({"candidate_id": candidate_id, "branch": branch, "error": error}),
        )?;
        info!(%candidate_id, %branch, %error, "candidate failed");

        let snapshot = self.candidates[idx].clone();
        self.dispatcher.on_candidate_completed(&snapshot, None);

        // In-run worktree cleanup is best-effort; startup recovery is the
        // authoritative sweep
        if let Err(e) = self.worktrees.remove(&branch).await {
            debug!(%branch, error = %e, "worktree cleanup deferred to recovery");
        }
        Ok(())
    }

    /// Create candidates and coder tasks until the concurrency cap is hit
    /// or the dispatcher runs dry.
    pub(crate) async fn fill_slots(&mut self) -> Result<(), RuntimeError> {
        loop {
            let active = self
                .candidates
                .iter()
                .filter(|c| c.status.is_live())
                .count();
            if active >= self.config.max_concurrent_tasks || !self.slots_free() {
                break;
            }
            let Some(request) = self.dispatcher.select_next() else {
                break;
            };
            self.create_candidate(request).await?;
        }
        Ok(())
    }

    /// Fork a branch + worktree for a dispatch request and start its coder.
    async fn create_candidate(&mut self, request: DispatchRequest) -> Result<(), RuntimeError> {
        let cand_id = IdGenerator::next_id(&mut self.state, "cand");
        let branch = candidate_branch(&cand_id);

        self.git.create_branch(&branch, &request.parent_branch).await?;
        let worktree = self.worktrees.create(&branch).await?;

        let candidate = Candidate::new(
            cand_id.clone(),
            branch.clone(),
            request.parent_branch.clone(),
            worktree.display().to_string(),
        );
        self.candidates.push(candidate.clone());
        self.emit(
            "candidate.created",
            json!({"candidate_id": cand_id, "branch": branch, "parent_branch": request.parent_branch}),
        )?;
        info!(candidate_id = %cand_id, %branch, parent = %request.parent_branch, "candidate created");

        if let Some(item_id) = &request.plan_item_id {
            self.dispatcher.mark_assigned(item_id, &candidate);
        }

        let idx = self.candidates.len() - 1;
        self.dispatch_coder(idx, request.instruction, request.context)?;
        Ok(())
    }

    fn dispatch_coder(
        &mut self,
        idx: usize,
        instruction: String,
        mut context: serde_json::Map<String, Value>,
    ) -> Result<(), RuntimeError> {
        let candidate = &self.candidates[idx];
        let branch = candidate.branch.clone();
        let worktree = candidate.worktree_path.clone().unwrap_or_default();

        context
            .entry("problem_description".to_string())
            .or_insert_with(|| json!(self.instruction));
        context
            .entry("attempt_number".to_string())
            .or_insert_with(|| json!(self.candidates.len()));
        context.insert("worktree_path".to_string(), json!(worktree));

        let mut task = Task::new(
            IdGenerator::next_id(&mut self.state, "task"),
            IdGenerator::next_id(&mut self.state, "thread"),
            Component::Coder,
            branch,
            instruction,
        );
        task.context = context.into_iter().collect();

        self.state.total_tasks_dispatched += 1;
        self.emit(
            "task.created",
            json!({"task_id": task.id, "component": "coder"}),
        )?;
        self.spawn_task(task)
    }

    fn dispatch_presubmit(&mut self, idx: usize) -> Result<(), RuntimeError> {
        let candidate = &self.candidates[idx];
        let branch = candidate.branch.clone();
        let worktree = candidate.worktree_path.clone().unwrap_or_default();

        let mut task = Task::new(
            IdGenerator::next_id(&mut self.state, "task"),
            IdGenerator::next_id(&mut self.state, "thread"),
            Component::Presubmit,
            branch,
            "Run presubmit checks",
        );
        task.context.insert("worktree_path".to_string(), json!(worktree));
        task.context
            .insert("checks".to_string(), json!(self.config.presubmit_checks));

        self.state.total_tasks_dispatched += 1;
        self.emit(
            "task.created",
            json!({"task_id": task.id, "component": "presubmit"}),
        )?;
        self.spawn_task(task)
    }

    fn dispatch_evaluator(&mut self, idx: usize) -> Result<(), RuntimeError> {
        let candidate = &mut self.candidates[idx];
        candidate.status = CandidateStatus::Evaluating;
        let branch = candidate.branch.clone();
        let worktree = candidate.worktree_path.clone().unwrap_or_default();

        let mut task = Task::new(
            IdGenerator::next_id(&mut self.state, "task"),
            IdGenerator::next_id(&mut self.state, "thread"),
            Component::Evaluator,
            branch,
            "Run evaluation",
        );
        task.context.insert("worktree_path".to_string(), json!(worktree));
        task.context
            .insert("eval_command".to_string(), json!(self.config.eval_command));

        self.state.total_tasks_dispatched += 1;
        self.emit(
            "task.created",
            json!({"task_id": task.id, "component": "evaluator"}),
        )?;
        self.spawn_task(task)
    }

    /// Drive the planning cycle when the dispatcher asks for it.
    pub(crate) async fn run_planning(&mut self) -> Result<(), RuntimeError> {
        if !self.dispatcher.needs_planning() {
            return Ok(());
        }

        if let Some(task_id) = self.planner_task_id.clone() {
            let status = self
                .tasks
                .iter()
                .find(|t| t.id == task_id)
                .map(|t| t.status);
            match status {
                Some(TaskStatus::Pending) | Some(TaskStatus::Running) => return Ok(()),
                Some(TaskStatus::Success) => {
                    let (result, worktree) = self
                        .tasks
                        .iter()
                        .find(|t| t.id == task_id)
                        .map(|t| {
                            (
                                t.result.clone().unwrap_or_default(),
                                t.context_str("worktree_path").unwrap_or_default().to_string(),
                            )
                        })
                        .unwrap_or_default();
                    self.dispatcher
                        .on_planning_completed(&result, std::path::Path::new(&worktree));
                    self.cleanup_planner_branch().await;
                    // Clearing the record lets future planning cycles run
                    self.planner_task_id = None;
                    return Ok(());
                }
                Some(TaskStatus::Failed) | Some(TaskStatus::Cancelled) | None => {
                    self.cleanup_planner_branch().await;
                    self.planner_task_id = None;
                    // Fall through and dispatch a fresh planning round
                }
            }
        }

        if self.slots_free() {
            self.dispatch_planner().await?;
        }
        Ok(())
    }

    /// Run the planner in a fresh worktree forked from main on the
    /// reserved branch.
    async fn dispatch_planner(&mut self) -> Result<(), RuntimeError> {
        self.cleanup_planner_branch().await;
        self.git.create_branch(PLANNER_BRANCH, "main").await?;
        let worktree = self.worktrees.create(PLANNER_BRANCH).await?;

        let mut task = Task::new(
            IdGenerator::next_id(&mut self.state, "task"),
            IdGenerator::next_id(&mut self.state, "thread"),
            Component::Planner,
            PLANNER_BRANCH,
            "Produce an improvement plan",
        );
        task.context
            .insert("worktree_path".to_string(), json!(worktree.display().to_string()));
        task.context.insert(
            "planning_context".to_string(),
            Value::Object(self.dispatcher.get_planning_context()),
        );

        self.state.total_tasks_dispatched += 1;
        self.emit(
            "task.created",
            json!({"task_id": task.id, "component": "planner"}),
        )?;
        self.planner_task_id = Some(task.id.clone());
        self.spawn_task(task)
    }

    /// Remove the reserved planner branch and worktree. Best-effort; a
    /// fresh round recreates both.
    async fn cleanup_planner_branch(&mut self) {
        if let Err(e) = self.worktrees.remove(PLANNER_BRANCH).await {
            debug!(error = %e, "planner worktree not removed");
        }
        if let Err(e) = self.git.delete_branch(PLANNER_BRANCH).await {
            debug!(error = %e, "planner branch not removed");
        }
    }
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
