// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only JSONL event log.
//!
//! Each entry is a single line of JSON followed by a newline, fsynced
//! after every append. Records are parseable independently; malformed or
//! blank lines encountered on read are silently skipped so the log
//! tolerates partial writes after a crash. The `seq` field of events
//! appended by a single process is strictly increasing and file order
//! matches `seq` order.

use aurelia_core::Event;
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

/// Errors that can occur in event log operations
#[derive(Debug, Error)]
pub enum EventLogError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Append-only, fsync-backed JSONL event log.
pub struct EventLog {
    path: PathBuf,
}

impl EventLog {
    /// Create a handle for the log at `path`. Parent directories are
    /// created on the first append.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Serialize `event` to JSON, append as a single line, and fsync.
    ///
    /// I/O errors propagate; the durability point is the fsync.
    pub fn append(&self, event: &Event) -> Result<(), EventLogError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut line = serde_json::to_vec(event)?;
        line.push(b'\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(&line)?;
        file.sync_all()?;
        Ok(())
    }

    /// Return every parseable event in file order.
    pub fn read_all(&self) -> Result<Vec<Event>, EventLogError> {
        let file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut events = Vec::new();
        let mut reader = BufReader::new(file);
        let mut line = String::new();
        let mut line_no = 0usize;

        loop {
            line.clear();
            match reader.read_line(&mut line) {
                Ok(0) => break,
                Ok(_) => {}
                // Torn final write after a crash; everything before it is good.
                Err(e) if e.kind() == io::ErrorKind::InvalidData => break,
                Err(e) => return Err(e.into()),
            }
            line_no += 1;

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            match serde_json::from_str::<Event>(trimmed) {
                Ok(event) => events.push(event),
                Err(e) => {
                    warn!(line = line_no, error = %e, "skipping malformed event log line");
                    continue;
                }
            }
        }

        Ok(events)
    }

    /// Return events whose `seq` is >= `seq`.
    pub fn read_since(&self, seq: u64) -> Result<Vec<Event>, EventLogError> {
        Ok(self
            .read_all()?
            .into_iter()
            .filter(|e| e.seq >= seq)
            .collect())
    }

    /// Find `start_type` events whose `data.task_id` has no matching
    /// `end_type` event anywhere in the log. Used for crash diagnostics.
    pub fn find_unmatched(
        &self,
        start_type: &str,
        end_type: &str,
    ) -> Result<Vec<Event>, EventLogError> {
        let events = self.read_all()?;

        let completed: std::collections::HashSet<String> = events
            .iter()
            .filter(|e| e.kind == end_type)
            .filter_map(|e| e.data_str("task_id").map(str::to_string))
            .collect();

        Ok(events
            .into_iter()
            .filter(|e| {
                e.kind == start_type
                    && e.data_str("task_id")
                        .is_some_and(|id| !completed.contains(id))
            })
            .collect())
    }
}

#[cfg(test)]
#[path = "event_log_tests.rs"]
mod tests;
