// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use aurelia_core::CandidateStatus;
use chrono::Utc;

fn candidate(id: &str, status: CandidateStatus, eval_ids: &[&str]) -> Candidate {
    Candidate {
        id: id.to_string(),
        branch: format!("aurelia/{id}"),
        parent_branch: Some("main".to_string()),
        status,
        evaluations: eval_ids.iter().map(|s| s.to_string()).collect(),
        created_at: Utc::now(),
        worktree_path: None,
    }
}

fn evaluation(id: &str, branch: &str, passed: bool, metrics: &[(&str, f64)]) -> Evaluation {
    Evaluation {
        id: id.to_string(),
        task_id: "task-0001".to_string(),
        candidate_branch: branch.to_string(),
        commit_sha: "deadbeef".to_string(),
        metrics: metrics.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
        raw_output: "{\"accuracy\": 0.9}".to_string(),
        timestamp: Utc::now(),
        passed,
    }
}

fn initialized(candidates: Vec<Candidate>, evaluations: Vec<Evaluation>) -> DefaultDispatcher {
    let mut dispatcher = DefaultDispatcher::new();
    dispatcher.initialize(DispatchContext {
        instruction: "Make sorting faster.".to_string(),
        candidates,
        evaluations,
        ..DispatchContext::default()
    });
    dispatcher
}

#[test]
fn test_empty_project_branches_from_main() {
    let mut dispatcher = initialized(Vec::new(), Vec::new());

    let request = dispatcher.select_next().unwrap();
    assert_eq!(request.parent_branch, "main");
    assert!(request.instruction.contains("Make sorting faster."));
    assert_eq!(request.context["attempt_number"], serde_json::json!(1));
    assert_eq!(request.context["feedback"], serde_json::json!(""));
}

#[test]
fn test_branches_from_best_mean_metric() {
    let candidates = vec![
        candidate("cand-0001", CandidateStatus::Succeeded, &["eval-0001"]),
        candidate("cand-0002", CandidateStatus::Succeeded, &["eval-0002"]),
    ];
    let evaluations = vec![
        evaluation("eval-0001", "aurelia/cand-0001", true, &[("accuracy", 0.5)]),
        evaluation("eval-0002", "aurelia/cand-0002", true, &[("accuracy", 0.9)]),
    ];
    let mut dispatcher = initialized(candidates, evaluations);

    let request = dispatcher.select_next().unwrap();
    assert_eq!(request.parent_branch, "aurelia/cand-0002");
}

#[test]
fn test_failed_and_unpassed_candidates_are_not_best() {
    let candidates = vec![
        candidate("cand-0001", CandidateStatus::Failed, &["eval-0001"]),
        candidate("cand-0002", CandidateStatus::Succeeded, &["eval-0002"]),
    ];
    let evaluations = vec![
        evaluation("eval-0001", "aurelia/cand-0001", true, &[("accuracy", 1.0)]),
        evaluation("eval-0002", "aurelia/cand-0002", false, &[("accuracy", 0.9)]),
    ];
    let mut dispatcher = initialized(candidates, evaluations);

    // Failed candidate is skipped; succeeded one has no passed evaluation
    let request = dispatcher.select_next().unwrap();
    assert_eq!(request.parent_branch, "main");
}

#[test]
fn test_feedback_lists_prior_attempts() {
    let candidates = vec![candidate(
        "cand-0001",
        CandidateStatus::Succeeded,
        &["eval-0001"],
    )];
    let evaluations = vec![evaluation(
        "eval-0001",
        "aurelia/cand-0001",
        true,
        &[("accuracy", 0.8)],
    )];
    let mut dispatcher = initialized(candidates, evaluations);

    let request = dispatcher.select_next().unwrap();
    let feedback = request.context["feedback"].as_str().unwrap();
    assert!(feedback.contains("### Attempt 1"));
    assert!(feedback.contains("PASSED"));
    assert!(feedback.contains("accuracy"));
    assert!(feedback.contains("Output:"));
}

#[test]
fn test_on_candidate_completed_updates_view() {
    let mut dispatcher = initialized(Vec::new(), Vec::new());

    let done = candidate("cand-0001", CandidateStatus::Succeeded, &["eval-0001"]);
    let ev = evaluation("eval-0001", "aurelia/cand-0001", true, &[("accuracy", 0.7)]);
    dispatcher.on_candidate_completed(&done, Some(&ev));

    let request = dispatcher.select_next().unwrap();
    assert_eq!(request.parent_branch, "aurelia/cand-0001");
    assert_eq!(request.context["attempt_number"], serde_json::json!(2));
}

#[test]
fn test_never_needs_planning() {
    let dispatcher = initialized(Vec::new(), Vec::new());
    assert!(!dispatcher.needs_planning());
    assert!(dispatcher.current_plan().is_none());
}

#[test]
fn test_mean_metric_used_for_ranking() {
    let ev = evaluation("eval-0001", "aurelia/cand-0001", true, &[("a", 1.0), ("b", 0.0)]);
    assert!((ev.mean_metric().unwrap() - 0.5).abs() < 1e-9);
}
