// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `aurelia report` - human summary of the last run.

use super::aurelia_dir;
use anyhow::{bail, Result};
use aurelia_core::{Candidate, Evaluation};
use aurelia_storage::StateStore;
use std::path::Path;

pub fn run(project_dir: &Path) -> Result<()> {
    let aurelia_dir = aurelia_dir(project_dir);
    if !aurelia_dir.join("state").join("runtime.json").exists() {
        bail!("no runtime state found (has `aurelia start` ever run here?)");
    }

    let store = StateStore::new(&aurelia_dir);
    let state = store.load_runtime();
    let candidates = store.load_candidates();
    let evaluations = store.load_evaluations();

    println!("# Aurelia run report");
    println!();
    println!("status: {}", state.status);
    println!(
        "heartbeats: {}  tasks: {} dispatched / {} completed / {} failed",
        state.heartbeat_count,
        state.total_tasks_dispatched,
        state.total_tasks_completed,
        state.total_tasks_failed
    );
    println!(
        "tokens: {}  cost: ${:.4}",
        state.total_tokens_used, state.total_cost_usd
    );
    println!();

    if candidates.is_empty() {
        println!("no candidates were created");
        return Ok(());
    }

    println!("## Candidates");
    println!();
    for candidate in &candidates {
        print_candidate(candidate, &evaluations);
    }

    if let Some((candidate, evaluation)) = best_candidate(&candidates, &evaluations) {
        println!("## Best candidate");
        println!();
        println!(
            "{} ({}) at {} — mean metric {:.4}",
            candidate.id,
            candidate.branch,
            evaluation.commit_sha,
            evaluation.mean_metric().unwrap_or(0.0)
        );
    }
    Ok(())
}

fn print_candidate(candidate: &Candidate, evaluations: &[Evaluation]) {
    println!(
        "- {} [{}] parent={}",
        candidate.id,
        candidate.status,
        candidate.parent_branch.as_deref().unwrap_or("?")
    );
    for eval_id in &candidate.evaluations {
        if let Some(evaluation) = evaluations.iter().find(|e| &e.id == eval_id) {
            let verdict = if evaluation.passed { "PASS" } else { "FAIL" };
            let metrics = serde_json::to_string(&evaluation.metrics).unwrap_or_default();
            println!("    {} {} {}", evaluation.id, verdict, metrics);
        }
    }
}

/// Highest mean metric among passed evaluations of succeeded candidates.
fn best_candidate<'a>(
    candidates: &'a [Candidate],
    evaluations: &'a [Evaluation],
) -> Option<(&'a Candidate, &'a Evaluation)> {
    let mut best: Option<(&Candidate, &Evaluation, f64)> = None;
    for candidate in candidates {
        if candidate.status != aurelia_core::CandidateStatus::Succeeded {
            continue;
        }
        for eval_id in &candidate.evaluations {
            let Some(evaluation) = evaluations.iter().find(|e| &e.id == eval_id) else {
                continue;
            };
            if !evaluation.passed {
                continue;
            }
            let Some(score) = evaluation.mean_metric() else {
                continue;
            };
            if best.map_or(true, |(_, _, best_score)| score > best_score) {
                best = Some((candidate, evaluation, score));
            }
        }
    }
    best.map(|(candidate, evaluation, _)| (candidate, evaluation))
}
