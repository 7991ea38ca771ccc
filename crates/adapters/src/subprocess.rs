// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Subprocess execution helpers

use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Default timeout for git subprocess operations.
pub const GIT_TIMEOUT: Duration = Duration::from_secs(60);

/// Default timeout for docker CLI queries (inspect, info).
pub const DOCKER_QUERY_TIMEOUT: Duration = Duration::from_secs(30);

/// Default timeout for docker image builds.
pub const DOCKER_BUILD_TIMEOUT: Duration = Duration::from_secs(600);

/// Captured output of a shell command run in its own process group.
#[derive(Debug, Clone)]
pub struct ShellOutput {
    /// Exit code; `-1` means the command timed out (or died without a code)
    /// and its process group was killed.
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ShellOutput {
    pub fn timed_out(&self) -> bool {
        self.exit_code == -1
    }
}

/// Run a subprocess command with a timeout.
///
/// Wraps `Command::output()` with `tokio::time::timeout`, converting
/// timeout expiration into a descriptive error message. The child process
/// is killed automatically if the timeout elapses (via the tokio `Child`
/// drop implementation).
pub async fn run_with_timeout(
    mut cmd: Command,
    timeout: Duration,
    description: &str,
) -> Result<Output, String> {
    cmd.kill_on_drop(true);
    match tokio::time::timeout(timeout, cmd.output()).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(io_err)) => Err(format!("{} failed: {}", description, io_err)),
        Err(_elapsed) => Err(format!(
            "{} timed out after {}s",
            description,
            timeout.as_secs()
        )),
    }
}

/// Run a shell command in `dir` inside a fresh process group, with a
/// timeout that kills the whole tree.
///
/// The command runs via `sh -c` with `process_group(0)` so that a timeout
/// or a cancellation can take down every descendant, not just the direct
/// child: SIGTERM to the group first, then SIGKILL. Both outcomes are
/// reported as exit code `-1` with a message in stderr, mirroring the
/// sandbox executor's contract.
pub async fn run_shell_in_group(
    command: &str,
    dir: &std::path::Path,
    env: &[(String, String)],
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<ShellOutput, String> {
    let mut cmd = Command::new("sh");
    cmd.arg("-c")
        .arg(command)
        .current_dir(dir)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .process_group(0)
        .kill_on_drop(true);
    for (key, value) in env {
        cmd.env(key, value);
    }

    debug!(command, dir = %dir.display(), "running shell command");

    let child = cmd
        .spawn()
        .map_err(|e| format!("failed to spawn '{}': {}", command, e))?;
    let pid = child.id().map(|id| Pid::from_raw(id as i32));

    let wait = child.wait_with_output();
    tokio::pin!(wait);

    tokio::select! {
        result = &mut wait => match result {
            Ok(output) => Ok(ShellOutput {
                exit_code: output.status.code().unwrap_or(-1),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            }),
            Err(io_err) => Err(format!("'{}' failed: {}", command, io_err)),
        },
        _ = tokio::time::sleep(timeout) => {
            if let Some(pid) = pid {
                kill_process_group(pid);
            }
            Ok(ShellOutput {
                exit_code: -1,
                stdout: String::new(),
                stderr: format!(
                    "Command '{}' timed out after {}s",
                    command,
                    timeout.as_secs()
                ),
            })
        }
        _ = cancel.cancelled() => {
            if let Some(pid) = pid {
                kill_process_group(pid);
            }
            Ok(ShellOutput {
                exit_code: -1,
                stdout: String::new(),
                stderr: format!("Command '{}' cancelled", command),
            })
        }
    }
}

/// Kill a process group, first with SIGTERM then SIGKILL.
pub fn kill_process_group(pgid: Pid) {
    if killpg(pgid, Signal::SIGTERM).is_err() {
        // Group already gone
        return;
    }
    let _ = killpg(pgid, Signal::SIGKILL);
}

/// Check whether a PID names a live process (signal 0 probe).
pub fn process_alive(pid: i32) -> bool {
    nix::sys::signal::kill(Pid::from_raw(pid), None).is_ok()
}

#[cfg(test)]
#[path = "subprocess_tests.rs"]
mod tests;
