// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use aurelia_core::CandidateStatus;
use tempfile::tempdir;

fn item(id: &str, parent: &str, priority: i64, deps: &[&str]) -> PlanItem {
    PlanItem {
        id: id.to_string(),
        description: format!("do {id}"),
        instruction: format!("implement {id}"),
        parent_branch: parent.to_string(),
        status: PlanItemStatus::Todo,
        priority,
        depends_on: deps.iter().map(|s| s.to_string()).collect(),
        assigned_candidate_id: None,
        assigned_branch: None,
    }
}

fn plan_with(items: Vec<PlanItem>) -> Plan {
    Plan {
        id: "plan-0000".to_string(),
        summary: "test plan".to_string(),
        items,
        created_at: Utc::now(),
        revision: 0,
    }
}

fn candidate(id: &str, status: CandidateStatus) -> Candidate {
    Candidate {
        id: id.to_string(),
        branch: format!("aurelia/{id}"),
        parent_branch: Some("main".to_string()),
        status,
        evaluations: Vec::new(),
        created_at: Utc::now(),
        worktree_path: None,
    }
}

#[test]
fn test_no_plan_needs_planning_and_selects_nothing() {
    let mut dispatcher = PlanDispatcher::new(None);
    assert!(dispatcher.needs_planning());
    assert!(dispatcher.select_next().is_none());
}

#[test]
fn test_selects_lowest_priority_eligible_item() {
    let mut dispatcher = PlanDispatcher::new(Some(plan_with(vec![
        item("plan-0002", "main", 5, &[]),
        item("plan-0001", "main", 1, &[]),
    ])));

    let request = dispatcher.select_next().unwrap();
    assert_eq!(request.plan_item_id.as_deref(), Some("plan-0001"));
    assert_eq!(request.parent_branch, "main");
    assert_eq!(request.instruction, "implement plan-0001");
    assert_eq!(
        request.context["plan_item_description"],
        serde_json::json!("do plan-0001")
    );
}

#[test]
fn test_dependencies_gate_eligibility() {
    let mut dispatcher = PlanDispatcher::new(Some(plan_with(vec![
        item("plan-0001", "main", 0, &[]),
        item("plan-0002", "main", 0, &["plan-0001"]),
    ])));

    // Only the dependency-free item is eligible
    let request = dispatcher.select_next().unwrap();
    assert_eq!(request.plan_item_id.as_deref(), Some("plan-0001"));

    dispatcher.mark_assigned("plan-0001", &candidate("cand-0001", CandidateStatus::Active));
    assert!(dispatcher.select_next().is_none());

    dispatcher
        .on_candidate_completed(&candidate("cand-0001", CandidateStatus::Succeeded), None);

    let request = dispatcher.select_next().unwrap();
    assert_eq!(request.plan_item_id.as_deref(), Some("plan-0002"));
}

#[test]
fn test_plan_reference_resolves_after_completion() {
    // Scenario: item B forks from A's result branch via $plan reference
    let mut dispatcher = PlanDispatcher::new(Some(plan_with(vec![
        item("plan-0001", "main", 0, &[]),
        item("plan-0002", "$plan-0001", 1, &["plan-0001"]),
    ])));

    let request = dispatcher.select_next().unwrap();
    assert_eq!(request.plan_item_id.as_deref(), Some("plan-0001"));

    dispatcher.mark_assigned("plan-0001", &candidate("cand-0001", CandidateStatus::Active));
    dispatcher
        .on_candidate_completed(&candidate("cand-0001", CandidateStatus::Succeeded), None);

    let request = dispatcher.select_next().unwrap();
    assert_eq!(request.plan_item_id.as_deref(), Some("plan-0002"));
    assert_eq!(request.parent_branch, "aurelia/cand-0001");
}

#[test]
fn test_unresolved_reference_is_ineligible() {
    let mut dispatcher = PlanDispatcher::new(Some(plan_with(vec![item(
        "plan-0002",
        "$plan-0001",
        0,
        &[],
    )])));

    // Referenced item does not exist, so nothing is dispatchable
    assert!(dispatcher.select_next().is_none());
}

#[test]
fn test_failed_candidate_fails_item() {
    let mut dispatcher =
        PlanDispatcher::new(Some(plan_with(vec![item("plan-0001", "main", 0, &[])])));

    dispatcher.mark_assigned("plan-0001", &candidate("cand-0001", CandidateStatus::Active));
    dispatcher.on_candidate_completed(&candidate("cand-0001", CandidateStatus::Failed), None);

    let plan = dispatcher.current_plan().unwrap();
    assert_eq!(plan.items[0].status, PlanItemStatus::Failed);
}

#[test]
fn test_needs_planning_when_todo_exhausted() {
    let mut exhausted = plan_with(vec![item("plan-0001", "main", 0, &[])]);
    exhausted.items[0].status = PlanItemStatus::Complete;

    let dispatcher = PlanDispatcher::new(Some(exhausted));
    assert!(dispatcher.needs_planning());
}

#[test]
fn test_deadlock_triggers_replanning() {
    // TODO item depends on a failed item; nothing assigned → deadlock
    let mut plan = plan_with(vec![
        item("plan-0001", "main", 0, &[]),
        item("plan-0002", "main", 0, &["plan-0001"]),
    ]);
    plan.items[0].status = PlanItemStatus::Failed;

    let dispatcher = PlanDispatcher::new(Some(plan));
    assert!(dispatcher.needs_planning());
}

#[test]
fn test_no_replanning_while_work_is_assigned() {
    let mut plan = plan_with(vec![
        item("plan-0001", "main", 0, &[]),
        item("plan-0002", "main", 0, &["plan-0001"]),
    ]);
    plan.items[0].status = PlanItemStatus::Assigned;

    let dispatcher = PlanDispatcher::new(Some(plan));
    assert!(!dispatcher.needs_planning());
}

#[test]
fn test_planning_completed_parses_plan_json() {
    let dir = tempdir().unwrap();
    std::fs::write(
        dir.path().join("plan.json"),
        r#"{
            "summary": "two-step improvement",
            "items": [
                {"id": "plan-0001", "description": "a", "instruction": "do a"},
                {"id": "plan-0002", "description": "b", "instruction": "do b",
                 "parent_branch": "$plan-0001", "priority": 2, "depends_on": ["plan-0001"]}
            ]
        }"#,
    )
    .unwrap();

    let mut dispatcher = PlanDispatcher::new(None);
    dispatcher.initialize(DispatchContext::default());
    dispatcher.on_planning_completed(&TaskResult::ok("planned"), dir.path());

    let plan = dispatcher.current_plan().unwrap();
    assert_eq!(plan.revision, 0);
    assert_eq!(plan.id, "plan-0000");
    assert_eq!(plan.summary, "two-step improvement");
    assert_eq!(plan.items.len(), 2);
    assert_eq!(plan.items[1].parent_branch, "$plan-0001");
    assert_eq!(plan.items[1].depends_on, vec!["plan-0001"]);
}

#[test]
fn test_missing_plan_json_leaves_plan_unchanged() {
    let dir = tempdir().unwrap();
    let mut dispatcher =
        PlanDispatcher::new(Some(plan_with(vec![item("plan-0001", "main", 0, &[])])));

    dispatcher.on_planning_completed(&TaskResult::ok("planned"), dir.path());

    let plan = dispatcher.current_plan().unwrap();
    assert_eq!(plan.revision, 0);
    assert_eq!(plan.items.len(), 1);
}

#[test]
fn test_failed_planning_leaves_plan_unchanged() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("plan.json"), r#"{"summary": "x", "items": []}"#).unwrap();

    let mut dispatcher =
        PlanDispatcher::new(Some(plan_with(vec![item("plan-0001", "main", 0, &[])])));
    dispatcher.on_planning_completed(&TaskResult::failed("agent died"), dir.path());

    assert_eq!(dispatcher.current_plan().unwrap().items.len(), 1);
}

#[test]
fn test_replanning_preserves_non_todo_items() {
    let dir = tempdir().unwrap();
    std::fs::write(
        dir.path().join("plan.json"),
        r#"{
            "summary": "revised",
            "items": [
                {"id": "plan-0001", "description": "changed text", "instruction": "changed"},
                {"id": "plan-0003", "description": "new", "instruction": "do new"}
            ]
        }"#,
    )
    .unwrap();

    let mut plan = plan_with(vec![
        item("plan-0001", "main", 0, &[]),
        item("plan-0002", "main", 0, &[]),
    ]);
    plan.items[0].status = PlanItemStatus::Complete;
    plan.items[0].assigned_candidate_id = Some("cand-0001".to_string());
    plan.items[0].assigned_branch = Some("aurelia/cand-0001".to_string());
    plan.items[1].status = PlanItemStatus::Assigned;
    plan.items[1].assigned_candidate_id = Some("cand-0002".to_string());

    let mut dispatcher = PlanDispatcher::new(Some(plan));
    dispatcher.on_planning_completed(&TaskResult::ok("planned"), dir.path());

    let merged = dispatcher.current_plan().unwrap();
    assert_eq!(merged.revision, 1);
    assert_eq!(merged.id, "plan-0001");

    // plan-0001 kept verbatim (status, linkage, original description)
    let kept = merged.find_item("plan-0001").unwrap();
    assert_eq!(kept.status, PlanItemStatus::Complete);
    assert_eq!(kept.assigned_branch.as_deref(), Some("aurelia/cand-0001"));
    assert_eq!(kept.description, "do plan-0001");

    // plan-0002 was dropped by the planner but is assigned → still present
    let kept = merged.find_item("plan-0002").unwrap();
    assert_eq!(kept.status, PlanItemStatus::Assigned);

    // plan-0003 is a fresh todo item
    let fresh = merged.find_item("plan-0003").unwrap();
    assert_eq!(fresh.status, PlanItemStatus::Todo);
}
