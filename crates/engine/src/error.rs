// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the engine runtime

use thiserror::Error;

/// Errors that can occur in the runtime
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("another orchestrator is already running (pid {pid})")]
    AlreadyRunning { pid: i32 },
    #[error("config error: {0}")]
    Config(#[from] crate::config::ConfigError),
    #[error("state store error: {0}")]
    StateStore(#[from] aurelia_storage::StateStoreError),
    #[error("event log error: {0}")]
    EventLog(#[from] aurelia_storage::EventLogError),
    #[error("git error: {0}")]
    Git(#[from] aurelia_adapters::GitError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid pid sentinel: {0}")]
    PidSentinel(String),
}
