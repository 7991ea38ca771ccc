// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Async wrapper around a local git repository.

use crate::subprocess::{run_with_timeout, GIT_TIMEOUT};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

/// Record separator used in `git log` pretty formats.
const RECORD_SEP: &str = "---AURELIA_RECORD_SEP---";

/// Errors from git operations
#[derive(Debug, Error)]
pub enum GitError {
    #[error("git {args} failed (exit {exit_code}): {stderr}")]
    CommandFailed {
        args: String,
        exit_code: i32,
        stderr: String,
    },
    #[error("git {0}")]
    Subprocess(String),
    #[error("invalid note payload: {0}")]
    NotePayload(#[from] serde_json::Error),
}

/// One commit from `git log`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitRecord {
    pub sha: String,
    pub author: String,
    pub date: String,
    pub message: String,
}

/// Structured annotation attached to a commit in a notes namespace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitNote {
    pub author_component: String,
    pub note_type: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// A local git repository rooted at a project directory.
#[derive(Debug, Clone)]
pub struct GitRepo {
    project_dir: PathBuf,
}

impl GitRepo {
    pub fn new(project_dir: impl Into<PathBuf>) -> Self {
        Self {
            project_dir: project_dir.into(),
        }
    }

    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    /// Run a git command and return trimmed stdout. Non-zero exit raises
    /// with the stderr content included.
    pub async fn run(&self, args: &[&str]) -> Result<String, GitError> {
        let mut cmd = Command::new("git");
        cmd.arg("-C").arg(&self.project_dir).args(args);
        debug!(?args, "git command");

        let output = run_with_timeout(cmd, GIT_TIMEOUT, "git")
            .await
            .map_err(GitError::Subprocess)?;

        if !output.status.success() {
            return Err(GitError::CommandFailed {
                args: args.join(" "),
                exit_code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Initialise a repository with an empty root commit on `main` if
    /// absent. Idempotent.
    pub async fn init(&self) -> Result<(), GitError> {
        std::fs::create_dir_all(&self.project_dir)
            .map_err(|e| GitError::Subprocess(e.to_string()))?;

        self.run(&["init", "-b", "main"]).await?;

        if self.run(&["rev-parse", "HEAD"]).await.is_err() {
            // No commits yet; branches need a root to fork from
            self.run(&["commit", "--allow-empty", "-m", "Initial commit"])
                .await?;
        }
        Ok(())
    }

    /// Create `name` from `from_branch`.
    pub async fn create_branch(&self, name: &str, from_branch: &str) -> Result<(), GitError> {
        self.run(&["branch", name, from_branch]).await?;
        Ok(())
    }

    /// Force-delete a branch.
    pub async fn delete_branch(&self, name: &str) -> Result<(), GitError> {
        self.run(&["branch", "-D", name]).await?;
        Ok(())
    }

    /// List local branches with the given prefix.
    pub async fn list_branches(&self, prefix: &str) -> Result<Vec<String>, GitError> {
        let raw = self
            .run(&["branch", "--list", "--format=%(refname:short)"])
            .await?;
        Ok(raw
            .lines()
            .map(str::trim)
            .filter(|b| b.starts_with(prefix))
            .map(str::to_string)
            .collect())
    }

    /// Stage `paths`, commit on `branch`, and return the commit SHA.
    pub async fn commit(
        &self,
        branch: &str,
        message: &str,
        paths: &[PathBuf],
    ) -> Result<String, GitError> {
        self.run(&["checkout", branch]).await?;

        let mut args = vec!["add".to_string(), "--".to_string()];
        args.extend(paths.iter().map(|p| p.display().to_string()));
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        self.run(&arg_refs).await?;

        self.run(&["commit", "-m", message]).await?;
        self.run(&["rev-parse", "HEAD"]).await
    }

    /// Latest commit SHA on `branch`.
    pub async fn head_sha(&self, branch: &str) -> Result<String, GitError> {
        self.run(&["rev-parse", branch]).await
    }

    /// Return the last `n` commits on `branch`.
    pub async fn log(&self, branch: &str, n: usize) -> Result<Vec<CommitRecord>, GitError> {
        let count = format!("-n{n}");
        let fmt = format!("--format=%H%n%an%n%aI%n%s%n{RECORD_SEP}");
        let raw = self.run(&["log", branch, &count, &fmt]).await?;

        let mut entries = Vec::new();
        for block in raw.split(RECORD_SEP) {
            let block = block.trim();
            if block.is_empty() {
                continue;
            }
            let mut lines = block.lines();
            let (Some(sha), Some(author), Some(date), Some(message)) =
                (lines.next(), lines.next(), lines.next(), lines.next())
            else {
                continue;
            };
            entries.push(CommitRecord {
                sha: sha.to_string(),
                author: author.to_string(),
                date: date.to_string(),
                message: message.to_string(),
            });
        }
        Ok(entries)
    }

    /// Unified diff between `base` and `branch`.
    pub async fn diff(&self, branch: &str, base: &str) -> Result<String, GitError> {
        let range = format!("{base}...{branch}");
        self.run(&["diff", &range]).await
    }

    /// Attach a structured note to `commit_sha`, appending to the
    /// JSON-array payload stored under `namespace`.
    pub async fn add_note(
        &self,
        commit_sha: &str,
        note: &GitNote,
        namespace: &str,
    ) -> Result<(), GitError> {
        let mut existing = self.read_notes_raw(commit_sha, namespace).await?;
        existing.push(serde_json::to_value(note)?);

        let payload = serde_json::to_string(&existing)?;
        let ns = format!("--ref={namespace}");
        self.run(&["notes", &ns, "add", "-f", "-m", &payload, commit_sha])
            .await?;
        Ok(())
    }

    /// Read all notes attached to `commit_sha` in `namespace`.
    pub async fn read_notes(
        &self,
        commit_sha: &str,
        namespace: &str,
    ) -> Result<Vec<GitNote>, GitError> {
        let raw = self.read_notes_raw(commit_sha, namespace).await?;
        let mut notes = Vec::with_capacity(raw.len());
        for entry in raw {
            notes.push(serde_json::from_value(entry)?);
        }
        Ok(notes)
    }

    async fn read_notes_raw(
        &self,
        commit_sha: &str,
        namespace: &str,
    ) -> Result<Vec<Value>, GitError> {
        let ns = format!("--ref={namespace}");
        let raw = match self.run(&["notes", &ns, "show", commit_sha]).await {
            Ok(raw) => raw,
            // No note on this commit yet
            Err(GitError::CommandFailed { .. }) => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Array(list)) => Ok(list),
            Ok(other) => Ok(vec![other]),
            Err(_) => Ok(Vec::new()),
        }
    }

    /// Contents of `path` at the tip of `branch`.
    pub async fn show(&self, branch: &str, path: &str) -> Result<Vec<u8>, GitError> {
        let spec = format!("{branch}:{path}");
        let mut cmd = Command::new("git");
        cmd.arg("-C").arg(&self.project_dir).arg("show").arg(&spec);

        let output = run_with_timeout(cmd, GIT_TIMEOUT, "git show")
            .await
            .map_err(GitError::Subprocess)?;
        if !output.status.success() {
            return Err(GitError::CommandFailed {
                args: format!("show {spec}"),
                exit_code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(output.stdout)
    }
}

#[cfg(test)]
#[path = "repo_tests.rs"]
mod tests;
