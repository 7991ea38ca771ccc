// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Structured improvement plans and dispatch requests.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Status of a plan item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanItemStatus {
    Todo,
    Assigned,
    Complete,
    Failed,
}

impl fmt::Display for PlanItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanItemStatus::Todo => write!(f, "todo"),
            PlanItemStatus::Assigned => write!(f, "assigned"),
            PlanItemStatus::Complete => write!(f, "complete"),
            PlanItemStatus::Failed => write!(f, "failed"),
        }
    }
}

fn default_parent_branch() -> String {
    "main".to_string()
}

/// A single actionable item in an improvement plan.
///
/// `parent_branch` is `"main"`, a literal branch name, or `"$plan-XXXX"`
/// referencing another item; a reference resolves only once the referenced
/// item is complete and has an assigned branch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanItem {
    pub id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub instruction: String,
    #[serde(default = "default_parent_branch")]
    pub parent_branch: String,
    #[serde(default)]
    pub status: PlanItemStatus,
    /// Lower numbers execute first.
    #[serde(default)]
    pub priority: i64,
    #[serde(default)]
    pub depends_on: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_candidate_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_branch: Option<String>,
}

impl Default for PlanItemStatus {
    fn default() -> Self {
        PlanItemStatus::Todo
    }
}

/// A structured improvement plan produced by the planner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub id: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub items: Vec<PlanItem>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub revision: u32,
}

impl Plan {
    pub fn find_item(&self, item_id: &str) -> Option<&PlanItem> {
        self.items.iter().find(|it| it.id == item_id)
    }

    pub fn find_item_mut(&mut self, item_id: &str) -> Option<&mut PlanItem> {
        self.items.iter_mut().find(|it| it.id == item_id)
    }
}

/// A request from a dispatcher to create a new candidate.
#[derive(Debug, Clone)]
pub struct DispatchRequest {
    pub parent_branch: String,
    pub instruction: String,
    pub context: Map<String, Value>,
    pub plan_item_id: Option<String>,
}

#[cfg(test)]
#[path = "plan_tests.rs"]
mod tests;
