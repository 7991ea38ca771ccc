// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Prompt templates for the coder and planner agents.
//!
//! Templates are plain text with `{name}` substitutions. The rendered
//! system prompt is written to a sentinel file in the worktree and the
//! agent finds it through the `AURELIA_SYSTEM_MD` environment variable.

use serde_json::{json, Value};

/// Sentinel file name for the rendered system prompt.
pub const SYSTEM_PROMPT_FILE: &str = ".aurelia_system.md";

/// Context document written for the planner.
pub const PLANNING_CONTEXT_FILE: &str = "_planning_context.md";

/// Plan schema file written for the planner.
pub const PLAN_SCHEMA_FILE: &str = "plan_schema.json";

const CODER_SYSTEM_TEMPLATE: &str = "\
You are an autonomous software engineer working on one candidate solution.

# Problem

{problem_description}

# Where you are

You are on branch `{branch}` with a full checkout at `{workdir}`.
Modify the solution files in place. Do not create new branches and do not
touch version control; your changes are committed for you when you finish.

# Task

{instruction}

# History

{history}
";

const PLANNER_SYSTEM_TEMPLATE: &str = "\
You are the planning agent for an autonomous code-improvement run.

Read `_planning_context.md` for the problem statement, the evaluation
history so far, and the current plan state. Read `plan_schema.json` for
the required output shape.

Produce a file named `plan.json` in the working directory: a concrete,
dependency-ordered set of improvement items. Reference another item's
resulting branch as \"$<item-id>\" in `parent_branch` when an item builds
on it. Lower `priority` numbers run first.
";

/// Render the coder system prompt.
pub fn render_coder_prompt(
    problem_description: &str,
    branch: &str,
    workdir: &str,
    instruction: &str,
    feedback: &str,
) -> String {
    let history = if feedback.trim().is_empty() {
        "This is the first attempt.".to_string()
    } else {
        format!("Results of previous attempts:\n\n{}", feedback.trim())
    };

    CODER_SYSTEM_TEMPLATE
        .replace("{problem_description}", problem_description)
        .replace("{branch}", branch)
        .replace("{workdir}", workdir)
        .replace("{instruction}", instruction)
        .replace("{history}", &history)
}

/// The planner system prompt (no substitutions; context travels in files).
pub fn planner_prompt() -> &'static str {
    PLANNER_SYSTEM_TEMPLATE
}

/// JSON schema for `plan.json`, written alongside the planning context.
pub fn plan_schema() -> Value {
    json!({
        "type": "object",
        "required": ["summary", "items"],
        "properties": {
            "summary": {
                "type": "string",
                "description": "High-level strategy description"
            },
            "items": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["id", "description", "instruction"],
                    "properties": {
                        "id": {
                            "type": "string",
                            "description": "Unique item ID, e.g. plan-0001"
                        },
                        "description": {
                            "type": "string",
                            "description": "What this improvement does"
                        },
                        "instruction": {
                            "type": "string",
                            "description": "Detailed instruction for the coder agent"
                        },
                        "parent_branch": {
                            "type": "string",
                            "description": "Branch to fork from: \"main\", an existing branch, or \"$plan-XXXX\" to reference another plan item",
                            "default": "main"
                        },
                        "priority": {
                            "type": "integer",
                            "description": "Lower numbers execute first",
                            "default": 0
                        },
                        "depends_on": {
                            "type": "array",
                            "items": {"type": "string"},
                            "description": "Plan item IDs that must complete first",
                            "default": []
                        }
                    }
                }
            }
        }
    })
}

/// Render the planning context document from the dispatcher's context map.
pub fn render_planning_context(context: &serde_json::Map<String, Value>) -> String {
    let mut sections = Vec::new();

    let problem = context
        .get("problem_description")
        .and_then(Value::as_str)
        .unwrap_or_default();
    sections.push(format!("# Problem\n\n{problem}\n"));

    if let Some(history) = context.get("evaluation_history").and_then(Value::as_array) {
        sections.push("# Evaluation History\n".to_string());
        for entry in history {
            let branch = entry
                .get("candidate_branch")
                .and_then(Value::as_str)
                .unwrap_or("?");
            let status = if entry.get("passed").and_then(Value::as_bool) == Some(true) {
                "PASS"
            } else {
                "FAIL"
            };
            let metrics = entry.get("metrics").cloned().unwrap_or(json!({}));
            sections.push(format!("- {branch}: {status} — {metrics}"));
        }
        sections.push(String::new());
    }

    if let Some(plan) = context.get("current_plan") {
        sections.push("# Current Plan State\n".to_string());
        if let Some(items) = plan.get("items").and_then(Value::as_array) {
            for item in items {
                let id = item.get("id").and_then(Value::as_str).unwrap_or("?");
                let status = item.get("status").and_then(Value::as_str).unwrap_or("?");
                let description = item
                    .get("description")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                sections.push(format!("- [{status}] {id}: {description}"));
            }
        }
        sections.push(String::new());
    }

    sections.join("\n")
}

#[cfg(test)]
#[path = "prompts_tests.rs"]
mod tests;
