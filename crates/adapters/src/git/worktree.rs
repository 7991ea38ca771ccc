// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Git worktree management for parallel candidate branches.
//!
//! Each live candidate gets its own worktree so that concurrent coder and
//! evaluator tasks never contend for checkouts on the same branch.

use super::repo::{GitError, GitRepo};
use std::path::{Path, PathBuf};
use tracing::info;

/// Creates, removes, and enumerates worktrees under a base directory.
#[derive(Debug, Clone)]
pub struct WorktreeManager {
    repo: GitRepo,
    worktree_base: PathBuf,
}

impl WorktreeManager {
    pub fn new(repo: GitRepo, worktree_base: impl Into<PathBuf>) -> Self {
        Self {
            repo,
            worktree_base: worktree_base.into(),
        }
    }

    /// Path a worktree for `branch` would live at.
    pub fn path_for(&self, branch: &str) -> PathBuf {
        self.worktree_base.join(branch)
    }

    /// Create a worktree for `branch` at `<base>/<branch>`.
    pub async fn create(&self, branch: &str) -> Result<PathBuf, GitError> {
        let wt_path = self.path_for(branch);
        if let Some(parent) = wt_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| GitError::Subprocess(e.to_string()))?;
        }

        let path_str = wt_path.display().to_string();
        self.repo
            .run(&["worktree", "add", &path_str, branch])
            .await?;
        info!(%branch, path = %wt_path.display(), "created worktree");
        Ok(wt_path)
    }

    /// Remove the worktree associated with `branch`.
    pub async fn remove(&self, branch: &str) -> Result<(), GitError> {
        let path_str = self.path_for(branch).display().to_string();
        self.repo
            .run(&["worktree", "remove", "--force", &path_str])
            .await?;
        info!(%branch, "removed worktree");
        Ok(())
    }

    /// Return `(branch, path)` pairs parsed from the porcelain listing.
    ///
    /// Detached or bare entries carry no branch line and are skipped.
    pub async fn list_active(&self) -> Result<Vec<(String, PathBuf)>, GitError> {
        let raw = self.repo.run(&["worktree", "list", "--porcelain"]).await?;

        let mut results = Vec::new();
        let mut current_path: Option<PathBuf> = None;
        for line in raw.lines() {
            if let Some(path) = line.strip_prefix("worktree ") {
                current_path = Some(PathBuf::from(path.trim()));
            } else if let Some(branch_ref) = line.strip_prefix("branch ") {
                let branch = branch_ref
                    .trim()
                    .strip_prefix("refs/heads/")
                    .unwrap_or(branch_ref.trim());
                if let Some(path) = current_path.take() {
                    results.push((branch.to_string(), path));
                }
            }
        }
        Ok(results)
    }

    pub fn worktree_base(&self) -> &Path {
        &self.worktree_base
    }
}

#[cfg(test)]
#[path = "worktree_tests.rs"]
mod tests;
