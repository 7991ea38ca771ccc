// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Default dispatcher: always branch from the best candidate.

use super::{DispatchContext, Dispatcher};
use aurelia_core::{Candidate, CandidateStatus, DispatchRequest, Evaluation};
use serde_json::{json, Map, Value};

/// Branches every new candidate from the best succeeded candidate so far
/// (highest mean of numeric metrics over passed evaluations), or from
/// `main` while nothing has succeeded. The coder context carries the full
/// problem description plus a feedback block summarizing prior attempts.
#[derive(Default)]
pub struct DefaultDispatcher {
    instruction: String,
    candidates: Vec<Candidate>,
    evaluations: Vec<Evaluation>,
}

impl DefaultDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Find the succeeded candidate with the highest average metric.
    fn best_candidate(&self) -> Option<&Candidate> {
        let mut best: Option<(&Candidate, f64)> = None;
        for candidate in &self.candidates {
            if candidate.status != CandidateStatus::Succeeded {
                continue;
            }
            for eval_id in &candidate.evaluations {
                let Some(evaluation) = self.evaluations.iter().find(|e| &e.id == eval_id) else {
                    continue;
                };
                if !evaluation.passed {
                    continue;
                }
                let Some(score) = evaluation.mean_metric() else {
                    continue;
                };
                if best.map_or(true, |(_, best_score)| score > best_score) {
                    best = Some((candidate, score));
                }
            }
        }
        best.map(|(candidate, _)| candidate)
    }

    /// Format previous attempts into feedback for the coder.
    fn feedback_text(&self) -> String {
        if self.evaluations.is_empty() {
            return String::new();
        }

        let mut lines = Vec::new();
        for (attempt, candidate) in self.candidates.iter().enumerate() {
            for eval_id in &candidate.evaluations {
                let Some(evaluation) = self.evaluations.iter().find(|e| &e.id == eval_id) else {
                    continue;
                };
                lines.push(format!("### Attempt {}", attempt + 1));
                lines.push(format!(
                    "- Status: {}",
                    if evaluation.passed { "PASSED" } else { "FAILED" }
                ));
                lines.push(format!(
                    "- Metrics: {}",
                    serde_json::to_string(&evaluation.metrics).unwrap_or_default()
                ));
                if !evaluation.raw_output.is_empty() {
                    let truncated: String = evaluation.raw_output.chars().take(200).collect();
                    lines.push(format!("- Output: {truncated}"));
                }
                lines.push(String::new());
            }
        }
        lines.join("\n")
    }
}

impl Dispatcher for DefaultDispatcher {
    fn initialize(&mut self, ctx: DispatchContext) {
        self.instruction = ctx.instruction;
        self.candidates = ctx.candidates;
        self.evaluations = ctx.evaluations;
    }

    fn select_next(&mut self) -> Option<DispatchRequest> {
        let parent_branch = self
            .best_candidate()
            .map(|c| c.branch.clone())
            .unwrap_or_else(|| "main".to_string());

        let mut context = Map::new();
        context.insert(
            "problem_description".to_string(),
            Value::String(self.instruction.clone()),
        );
        context.insert("feedback".to_string(), Value::String(self.feedback_text()));
        context.insert(
            "attempt_number".to_string(),
            json!(self.candidates.len() + 1),
        );

        Some(DispatchRequest {
            parent_branch,
            instruction: format!("Improve the solution. {}", self.instruction),
            context,
            plan_item_id: None,
        })
    }

    fn on_candidate_completed(&mut self, candidate: &Candidate, evaluation: Option<&Evaluation>) {
        match self.candidates.iter_mut().find(|c| c.id == candidate.id) {
            Some(existing) => *existing = candidate.clone(),
            None => self.candidates.push(candidate.clone()),
        }
        if let Some(evaluation) = evaluation {
            self.evaluations.push(evaluation.clone());
        }
    }
}

#[cfg(test)]
#[path = "default_tests.rs"]
mod tests;
