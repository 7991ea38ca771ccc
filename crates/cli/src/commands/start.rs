// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `aurelia start` - run the orchestrator in the foreground.

use anyhow::{Context, Result};
use aurelia_engine::Runtime;
use std::path::Path;
use tracing_subscriber::EnvFilter;

pub async fn run(project_dir: &Path) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let mut runtime = Runtime::new(project_dir).context("failed to load project state")?;
    runtime.start().await.context("runtime failed")?;
    Ok(())
}
