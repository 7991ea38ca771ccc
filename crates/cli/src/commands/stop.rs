// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `aurelia stop` - signal the running orchestrator via the PID sentinel.

use super::aurelia_dir;
use anyhow::{bail, Context, Result};
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use std::path::Path;

pub fn run(project_dir: &Path) -> Result<()> {
    let pid_path = aurelia_dir(project_dir).join("state").join("pid");
    let raw = match std::fs::read_to_string(&pid_path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            bail!("no orchestrator is running (no pid sentinel)");
        }
        Err(e) => return Err(e).context("cannot read pid sentinel"),
    };

    let pid: i32 = raw
        .trim()
        .parse()
        .with_context(|| format!("invalid pid sentinel: {raw:?}"))?;

    kill(Pid::from_raw(pid), Signal::SIGTERM)
        .with_context(|| format!("cannot signal pid {pid} (is the orchestrator alive?)"))?;

    println!("sent SIGTERM to orchestrator (pid {pid})");
    Ok(())
}
