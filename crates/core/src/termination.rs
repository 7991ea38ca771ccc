// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Termination condition parsing and evaluation.
//!
//! Syntax: `metric>=number[,metric>=number...]`. The empty string is the
//! empty condition: evaluations always count as passed and the runtime
//! never terminates on metrics.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::warn;

/// One `metric >= threshold` clause.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricThreshold {
    pub metric: String,
    pub threshold: f64,
}

/// A parsed termination condition: the conjunction of its clauses.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TerminationCondition {
    clauses: Vec<MetricThreshold>,
}

impl TerminationCondition {
    /// Parse the string form. An invalid clause invalidates the whole
    /// condition: it is warned about and treated as "no condition"
    /// (configuration errors never abort the runtime).
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.is_empty() {
            return Self::default();
        }

        let mut clauses = Vec::new();
        for part in raw.split(',') {
            let part = part.trim();
            let Some((metric, threshold)) = part.split_once(">=") else {
                warn!(condition = raw, clause = part, "invalid termination condition, ignoring");
                return Self::default();
            };
            let metric = metric.trim();
            let threshold = match threshold.trim().parse::<f64>() {
                Ok(v) => v,
                Err(_) => {
                    warn!(condition = raw, clause = part, "invalid threshold, ignoring condition");
                    return Self::default();
                }
            };
            if metric.is_empty() {
                warn!(condition = raw, clause = part, "empty metric name, ignoring condition");
                return Self::default();
            }
            clauses.push(MetricThreshold {
                metric: metric.to_string(),
                threshold,
            });
        }

        Self { clauses }
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Check whether `metrics` satisfies every clause.
    ///
    /// The empty condition is satisfied by anything: with no condition
    /// configured, every successful evaluation counts as passed.
    pub fn satisfied_by(&self, metrics: &HashMap<String, f64>) -> bool {
        self.clauses
            .iter()
            .all(|c| metrics.get(&c.metric).is_some_and(|v| *v >= c.threshold))
    }
}

impl fmt::Display for TerminationCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .clauses
            .iter()
            .map(|c| format!("{}>={}", c.metric, c.threshold))
            .collect();
        write!(f, "{}", parts.join(","))
    }
}

#[cfg(test)]
#[path = "termination_tests.rs"]
mod tests;
