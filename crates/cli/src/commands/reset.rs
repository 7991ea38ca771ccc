// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `aurelia reset` - wipe run state: worktrees, aurelia/* branches,
//! state snapshots, and logs. The workflow config is preserved.

use super::aurelia_dir;
use anyhow::{bail, Result};
use aurelia_adapters::{GitRepo, WorktreeManager};
use aurelia_core::BRANCH_PREFIX;
use std::path::Path;

pub async fn run(project_dir: &Path) -> Result<()> {
    let aurelia_dir = aurelia_dir(project_dir);
    if !aurelia_dir.exists() {
        bail!("nothing to reset (no .aurelia directory)");
    }

    let repo = GitRepo::new(project_dir);
    let worktrees = WorktreeManager::new(repo.clone(), aurelia_dir.join("worktrees"));

    // Worktrees first; a branch with a checkout cannot be deleted
    if let Ok(active) = worktrees.list_active().await {
        for (branch, _path) in active {
            if branch.starts_with(BRANCH_PREFIX) {
                match worktrees.remove(&branch).await {
                    Ok(()) => println!("removed worktree for {branch}"),
                    Err(e) => eprintln!("warning: could not remove worktree for {branch}: {e}"),
                }
            }
        }
    }

    match repo.list_branches(BRANCH_PREFIX).await {
        Ok(branches) => {
            for branch in branches {
                match repo.delete_branch(&branch).await {
                    Ok(()) => println!("deleted branch {branch}"),
                    Err(e) => eprintln!("warning: could not delete branch {branch}: {e}"),
                }
            }
        }
        Err(e) => eprintln!("warning: could not list branches: {e}"),
    }

    for name in ["state", "logs", "worktrees", "cache", "reports"] {
        let dir = aurelia_dir.join(name);
        if dir.exists() {
            std::fs::remove_dir_all(&dir)?;
            println!("removed {}", dir.display());
        }
    }

    println!("reset complete");
    Ok(())
}
