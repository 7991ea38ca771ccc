// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Candidate solution branches.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateStatus {
    /// Coder/presubmit pipeline in progress.
    Active,
    /// Evaluation dispatched.
    Evaluating,
    Succeeded,
    Failed,
    Abandoned,
}

impl CandidateStatus {
    /// Active or evaluating candidates own a branch and a worktree on disk.
    pub fn is_live(&self) -> bool {
        matches!(self, CandidateStatus::Active | CandidateStatus::Evaluating)
    }
}

impl fmt::Display for CandidateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CandidateStatus::Active => write!(f, "active"),
            CandidateStatus::Evaluating => write!(f, "evaluating"),
            CandidateStatus::Succeeded => write!(f, "succeeded"),
            CandidateStatus::Failed => write!(f, "failed"),
            CandidateStatus::Abandoned => write!(f, "abandoned"),
        }
    }
}

/// A solution branch in the project repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub id: String,
    /// Always `aurelia/<id>`.
    pub branch: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_branch: Option<String>,
    pub status: CandidateStatus,
    /// Evaluation IDs linked to this candidate, in recording order.
    #[serde(default)]
    pub evaluations: Vec<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worktree_path: Option<String>,
}

impl Candidate {
    pub fn new(id: String, branch: String, parent_branch: String, worktree_path: String) -> Self {
        Self {
            id,
            branch,
            parent_branch: Some(parent_branch),
            status: CandidateStatus::Active,
            evaluations: Vec::new(),
            created_at: Utc::now(),
            worktree_path: Some(worktree_path),
        }
    }
}
