// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Atomic JSON state store with backup rotation and corruption recovery.
//!
//! One pretty-printed JSON file per entity kind under `state/`. Every
//! write rotates `.bak.1 → .bak.2 → .bak.3` (dropping the oldest), moves
//! the current primary to `.bak.1`, writes a sibling temp file, fsyncs,
//! and renames into place. The primary is never partially overwritten and
//! at least three prior versions stay recoverable.
//!
//! Reads try the primary first and fall through the backups in order,
//! returning the first valid parse, or the entity's empty default when
//! everything is missing or corrupt.

use aurelia_core::{Candidate, Evaluation, Plan, RuntimeState, Task};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

const MAX_BACKUPS: u32 = 3;

/// Errors that can occur in state store operations
#[derive(Debug, Error)]
pub enum StateStoreError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// State store rooted at a project's `.aurelia` directory.
pub struct StateStore {
    aurelia_dir: PathBuf,
    state_dir: PathBuf,
}

impl StateStore {
    pub fn new(aurelia_dir: impl Into<PathBuf>) -> Self {
        let aurelia_dir = aurelia_dir.into();
        let state_dir = aurelia_dir.join("state");
        Self {
            aurelia_dir,
            state_dir,
        }
    }

    /// Ensure the `.aurelia` working subdirectories exist.
    pub fn initialize(&self) -> Result<(), StateStoreError> {
        for name in ["state", "logs", "cache", "reports", "config"] {
            fs::create_dir_all(self.aurelia_dir.join(name))?;
        }
        Ok(())
    }

    pub fn state_dir(&self) -> &Path {
        &self.state_dir
    }

    /// Path of the PID sentinel.
    pub fn pid_path(&self) -> PathBuf {
        self.state_dir.join("pid")
    }

    // -- Typed accessors ---------------------------------------------------

    pub fn load_runtime(&self) -> RuntimeState {
        self.load_or_default("runtime.json")
    }

    pub fn save_runtime(&self, state: &RuntimeState) -> Result<(), StateStoreError> {
        self.save("runtime.json", state)
    }

    pub fn load_tasks(&self) -> Vec<Task> {
        self.load_or_default("tasks.json")
    }

    pub fn save_tasks(&self, tasks: &[Task]) -> Result<(), StateStoreError> {
        self.save("tasks.json", &tasks)
    }

    pub fn load_candidates(&self) -> Vec<Candidate> {
        self.load_or_default("candidates.json")
    }

    pub fn save_candidates(&self, candidates: &[Candidate]) -> Result<(), StateStoreError> {
        self.save("candidates.json", &candidates)
    }

    pub fn load_evaluations(&self) -> Vec<Evaluation> {
        self.load_or_default("evaluations.json")
    }

    pub fn save_evaluations(&self, evaluations: &[Evaluation]) -> Result<(), StateStoreError> {
        self.save("evaluations.json", &evaluations)
    }

    pub fn load_plan(&self) -> Option<Plan> {
        self.load_file(&self.state_dir.join("plan.json"))
    }

    pub fn save_plan(&self, plan: &Plan) -> Result<(), StateStoreError> {
        self.save("plan.json", plan)
    }

    // -- Internals ---------------------------------------------------------

    fn load_or_default<T: DeserializeOwned + Default>(&self, name: &str) -> T {
        self.load_file(&self.state_dir.join(name))
            .unwrap_or_default()
    }

    /// Load JSON from `path`, falling back to backups on missing or
    /// corrupt files. Returns `None` when no readable copy exists.
    fn load_file<T: DeserializeOwned>(&self, path: &Path) -> Option<T> {
        let mut candidates = vec![path.to_path_buf()];
        for i in 1..=MAX_BACKUPS {
            candidates.push(bak_path(path, i));
        }

        for (i, candidate) in candidates.iter().enumerate() {
            match try_read_json(candidate) {
                Some(value) => {
                    if i > 0 {
                        warn!(
                            primary = %path.display(),
                            backup = %candidate.display(),
                            "primary state file unreadable, loaded backup"
                        );
                    }
                    return Some(value);
                }
                None => continue,
            }
        }
        None
    }

    /// Rotate backups, then atomically replace the primary.
    fn save<T: Serialize>(&self, name: &str, value: &T) -> Result<(), StateStoreError> {
        let path = self.state_dir.join(name);
        fs::create_dir_all(&self.state_dir)?;

        // .bak.3 is dropped, .bak.2 → .bak.3, .bak.1 → .bak.2
        for i in (2..=MAX_BACKUPS).rev() {
            let src = bak_path(&path, i - 1);
            if src.exists() {
                fs::rename(&src, bak_path(&path, i))?;
            }
        }
        if path.exists() {
            fs::rename(&path, bak_path(&path, 1))?;
        }

        // Atomic write via tmp + fsync + rename
        let tmp_path = path.with_extension("json.tmp");
        {
            let mut file = File::create(&tmp_path)?;
            file.write_all(serde_json::to_string_pretty(value)?.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, &path)?;

        debug!(path = %path.display(), "state snapshot saved");
        Ok(())
    }
}

fn bak_path(path: &Path, n: u32) -> PathBuf {
    let mut os = path.as_os_str().to_owned();
    os.push(format!(".bak.{n}"));
    PathBuf::from(os)
}

fn try_read_json<T: DeserializeOwned>(path: &Path) -> Option<T> {
    let raw = fs::read_to_string(path).ok()?;
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "unreadable state file");
            None
        }
    }
}

#[cfg(test)]
#[path = "state_store_tests.rs"]
mod tests;
