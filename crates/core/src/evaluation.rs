// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Evaluation records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Result of running the evaluation script against a candidate at a
/// specific commit. Immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evaluation {
    pub id: String,
    pub task_id: String,
    pub candidate_branch: String,
    pub commit_sha: String,
    pub metrics: HashMap<String, f64>,
    pub raw_output: String,
    pub timestamp: DateTime<Utc>,
    pub passed: bool,
}

impl Evaluation {
    /// Mean of the numeric metric values, used for candidate ranking.
    pub fn mean_metric(&self) -> Option<f64> {
        if self.metrics.is_empty() {
            return None;
        }
        let sum: f64 = self.metrics.values().sum();
        Some(sum / self.metrics.len() as f64)
    }
}
