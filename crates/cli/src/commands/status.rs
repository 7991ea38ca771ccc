// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `aurelia status` - print fields from the runtime snapshot.

use super::aurelia_dir;
use anyhow::{bail, Result};
use aurelia_storage::StateStore;
use std::path::Path;

pub fn run(project_dir: &Path) -> Result<()> {
    let aurelia_dir = aurelia_dir(project_dir);
    if !aurelia_dir.join("state").join("runtime.json").exists() {
        bail!("no runtime state found (has `aurelia start` ever run here?)");
    }

    let store = StateStore::new(&aurelia_dir);
    let state = store.load_runtime();

    println!("status:            {}", state.status);
    if let Some(started_at) = state.started_at {
        println!("started_at:        {started_at}");
    }
    if let Some(stopped_at) = state.stopped_at {
        println!("stopped_at:        {stopped_at}");
    }
    if let Some(last_heartbeat) = state.last_heartbeat_at {
        println!("last_heartbeat_at: {last_heartbeat}");
    }
    println!("heartbeats:        {}", state.heartbeat_count);
    println!("tasks dispatched:  {}", state.total_tasks_dispatched);
    println!("tasks completed:   {}", state.total_tasks_completed);
    println!("tasks failed:      {}", state.total_tasks_failed);
    println!("tokens used:       {}", state.total_tokens_used);
    println!("cost (usd):        {:.4}", state.total_cost_usd);
    Ok(())
}
