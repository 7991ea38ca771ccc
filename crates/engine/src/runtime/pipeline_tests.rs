// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::dispatch::PlanDispatcher;
use crate::runtime::test_support::{live_candidate, setup, task_with_status};
use aurelia_core::{TaskResult, TerminationCondition};

const BRANCH: &str = "aurelia/cand-0001";

fn success(id: &str, component: Component) -> Task {
    task_with_status(id, component, BRANCH, TaskStatus::Success)
}

fn event_kinds(runtime: &Runtime) -> Vec<String> {
    runtime
        .event_log
        .read_all()
        .unwrap()
        .into_iter()
        .map(|e| e.kind)
        .collect()
}

#[tokio::test]
async fn test_coder_success_dispatches_presubmit() {
    let (_dir, mut runtime) = setup().await;
    runtime.candidates.push(live_candidate("cand-0001", "/tmp/none"));
    runtime.tasks.push(success("task-0001", Component::Coder));

    runtime.advance_pipelines().await.unwrap();

    let presubmit = runtime
        .tasks
        .iter()
        .find(|t| t.component == Component::Presubmit)
        .unwrap();
    assert_eq!(presubmit.branch, BRANCH);
    assert_eq!(presubmit.status, TaskStatus::Running);
    assert!(runtime.running.contains_key(&presubmit.id));
    assert_eq!(runtime.candidates[0].status, CandidateStatus::Active);
    assert!(event_kinds(&runtime).contains(&"task.created".to_string()));
}

#[tokio::test]
async fn test_in_flight_step_blocks_the_walk() {
    let (_dir, mut runtime) = setup().await;
    runtime.candidates.push(live_candidate("cand-0001", "/tmp/none"));
    runtime
        .tasks
        .push(task_with_status("task-0001", Component::Coder, BRANCH, TaskStatus::Running));

    runtime.advance_pipelines().await.unwrap();

    assert_eq!(runtime.tasks.len(), 1);
    assert!(runtime.running.is_empty());
    assert_eq!(runtime.candidates[0].status, CandidateStatus::Active);
}

#[tokio::test]
async fn test_presubmit_success_dispatches_evaluator() {
    let (_dir, mut runtime) = setup().await;
    runtime.candidates.push(live_candidate("cand-0001", "/tmp/none"));
    runtime.tasks.push(success("task-0001", Component::Coder));
    runtime.tasks.push(success("task-0002", Component::Presubmit));

    runtime.advance_pipelines().await.unwrap();

    let evaluator = runtime
        .tasks
        .iter()
        .find(|t| t.component == Component::Evaluator)
        .unwrap();
    assert_eq!(evaluator.branch, BRANCH);
    assert_eq!(evaluator.status, TaskStatus::Running);
    assert_eq!(runtime.candidates[0].status, CandidateStatus::Evaluating);
}

#[tokio::test]
async fn test_coder_fault_fails_candidate() {
    let (_dir, mut runtime) = setup().await;
    runtime.candidates.push(live_candidate("cand-0001", "/tmp/none"));
    let mut coder = task_with_status("task-0001", Component::Coder, BRANCH, TaskStatus::Failed);
    coder.result = Some(TaskResult::failed("agent exploded"));
    runtime.tasks.push(coder);

    runtime.advance_pipelines().await.unwrap();

    assert_eq!(runtime.candidates[0].status, CandidateStatus::Failed);
    let events = runtime.event_log.read_all().unwrap();
    let failed = events.iter().find(|e| e.kind == "candidate.failed").unwrap();
    assert_eq!(failed.data_str("error"), Some("agent exploded"));
}

#[tokio::test]
async fn test_presubmit_fault_fails_candidate() {
    let (_dir, mut runtime) = setup().await;
    runtime.candidates.push(live_candidate("cand-0001", "/tmp/none"));
    runtime.tasks.push(success("task-0001", Component::Coder));
    let mut presubmit =
        task_with_status("task-0002", Component::Presubmit, BRANCH, TaskStatus::Failed);
    presubmit.result = Some(TaskResult::failed("Check 'lint' failed (exit 1)"));
    runtime.tasks.push(presubmit);

    runtime.advance_pipelines().await.unwrap();

    assert_eq!(runtime.candidates[0].status, CandidateStatus::Failed);
    assert!(runtime.running.is_empty());
    let events = runtime.event_log.read_all().unwrap();
    let failed = events.iter().find(|e| e.kind == "candidate.failed").unwrap();
    assert_eq!(failed.data_str("error"), Some("Check 'lint' failed (exit 1)"));
}

#[tokio::test]
async fn test_evaluator_fault_fails_candidate() {
    let (_dir, mut runtime) = setup().await;
    let mut candidate = live_candidate("cand-0001", "/tmp/none");
    candidate.status = CandidateStatus::Evaluating;
    runtime.candidates.push(candidate);
    runtime.tasks.push(success("task-0001", Component::Coder));
    runtime.tasks.push(success("task-0002", Component::Presubmit));
    let mut evaluator =
        task_with_status("task-0003", Component::Evaluator, BRANCH, TaskStatus::Failed);
    evaluator.result = Some(TaskResult::failed("Evaluation failed (exit 7)"));
    runtime.tasks.push(evaluator);

    runtime.advance_pipelines().await.unwrap();

    assert_eq!(runtime.candidates[0].status, CandidateStatus::Failed);
    assert!(runtime.evaluations.is_empty());
}

#[tokio::test]
async fn test_cancelled_step_also_faults_the_candidate() {
    let (_dir, mut runtime) = setup().await;
    runtime.candidates.push(live_candidate("cand-0001", "/tmp/none"));
    runtime
        .tasks
        .push(task_with_status("task-0001", Component::Coder, BRANCH, TaskStatus::Cancelled));

    runtime.advance_pipelines().await.unwrap();

    assert_eq!(runtime.candidates[0].status, CandidateStatus::Failed);
}

#[tokio::test]
async fn test_finish_candidate_records_passed_evaluation() {
    let (_dir, mut runtime) = setup().await;
    runtime.git.create_branch(BRANCH, "main").await.unwrap();
    let mut candidate = live_candidate("cand-0001", "/tmp/none");
    candidate.status = CandidateStatus::Evaluating;
    runtime.candidates.push(candidate);
    runtime.tasks.push(success("task-0001", Component::Coder));
    runtime.tasks.push(success("task-0002", Component::Presubmit));
    let mut evaluator = success("task-0003", Component::Evaluator);
    let mut result = TaskResult::ok("{\"accuracy\": 0.95}");
    result.metrics.insert("accuracy".to_string(), 0.95);
    evaluator.result = Some(result);
    runtime.tasks.push(evaluator);

    runtime.advance_pipelines().await.unwrap();

    assert_eq!(runtime.candidates[0].status, CandidateStatus::Succeeded);
    assert_eq!(runtime.candidates[0].evaluations, vec!["eval-0001".to_string()]);

    let evaluation = &runtime.evaluations[0];
    assert_eq!(evaluation.task_id, "task-0003");
    assert_eq!(evaluation.metrics.get("accuracy"), Some(&0.95));
    // Empty termination condition: the evaluation counts as passed
    assert!(evaluation.passed);
    assert_eq!(evaluation.commit_sha.len(), 40);
    assert_eq!(evaluation.raw_output, "{\"accuracy\": 0.95}");

    let events = runtime.event_log.read_all().unwrap();
    let evaluated = events.iter().find(|e| e.kind == "candidate.evaluated").unwrap();
    assert_eq!(evaluated.data["passed"], serde_json::json!(true));

    // The evaluated commit carries a structured note
    let notes = runtime
        .git
        .read_notes(&evaluation.commit_sha, "aurelia")
        .await
        .unwrap();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].note_type, "evaluation");

    // The dispatcher saw the completion: the next request forks from it
    let request = runtime.dispatcher.select_next().unwrap();
    assert_eq!(request.parent_branch, BRANCH);
}

#[tokio::test]
async fn test_finish_candidate_fails_when_condition_unmet() {
    let (_dir, mut runtime) = setup().await;
    runtime.condition = TerminationCondition::parse("accuracy>=0.99");
    runtime.git.create_branch(BRANCH, "main").await.unwrap();
    let mut candidate = live_candidate("cand-0001", "/tmp/none");
    candidate.status = CandidateStatus::Evaluating;
    runtime.candidates.push(candidate);
    runtime.tasks.push(success("task-0001", Component::Coder));
    runtime.tasks.push(success("task-0002", Component::Presubmit));
    let mut evaluator = success("task-0003", Component::Evaluator);
    let mut result = TaskResult::ok("{\"accuracy\": 0.5}");
    result.metrics.insert("accuracy".to_string(), 0.5);
    evaluator.result = Some(result);
    runtime.tasks.push(evaluator);

    runtime.advance_pipelines().await.unwrap();

    assert_eq!(runtime.candidates[0].status, CandidateStatus::Failed);
    assert!(!runtime.evaluations[0].passed);
}

#[tokio::test]
async fn test_fill_slots_creates_candidates_up_to_cap() {
    let (_dir, mut runtime) = setup().await;
    runtime.config.max_concurrent_tasks = 1;
    runtime.config.agent.sandbox = false;
    runtime.config.agent.command = "true".to_string();

    runtime.fill_slots().await.unwrap();

    assert_eq!(runtime.candidates.len(), 1);
    let candidate = &runtime.candidates[0];
    assert_eq!(candidate.branch, BRANCH);
    assert_eq!(candidate.parent_branch.as_deref(), Some("main"));
    assert!(runtime.worktrees.path_for(BRANCH).exists());

    let coder = runtime
        .tasks
        .iter()
        .find(|t| t.component == Component::Coder)
        .unwrap();
    assert_eq!(coder.status, TaskStatus::Running);
    assert_eq!(runtime.running.len(), 1);

    // Cap reached: a second pass creates nothing
    runtime.fill_slots().await.unwrap();
    assert_eq!(runtime.candidates.len(), 1);
}

#[tokio::test]
async fn test_fill_slots_stops_when_dispatcher_is_dry() {
    let (_dir, mut runtime) = setup().await;
    // A plan dispatcher with no plan has nothing to hand out
    runtime.dispatcher = Box::new(PlanDispatcher::new(None));

    runtime.fill_slots().await.unwrap();

    assert!(runtime.candidates.is_empty());
    assert!(runtime.running.is_empty());
}

#[tokio::test]
async fn test_no_dispatch_without_a_free_slot() {
    let (_dir, mut runtime) = setup().await;
    runtime.config.max_concurrent_tasks = 1;
    runtime.candidates.push(live_candidate("cand-0001", "/tmp/none"));
    runtime.tasks.push(success("task-0001", Component::Coder));
    let occupied = tokio::spawn(std::future::pending::<TaskResult>());
    runtime.running.insert("task-9999".to_string(), occupied);

    runtime.advance_pipelines().await.unwrap();

    assert!(!runtime.tasks.iter().any(|t| t.component == Component::Presubmit));
    if let Some(handle) = runtime.running.remove("task-9999") {
        handle.abort();
    }
}
