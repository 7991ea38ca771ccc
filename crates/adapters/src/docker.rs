// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Docker sandbox executor.
//!
//! Runs commands in isolated containers with resource caps, optional
//! network, explicit env forwarding, and bind mounts. Timeouts kill the
//! container and surface as exit code `-1` with a timeout message.

use crate::subprocess::{run_with_timeout, DOCKER_BUILD_TIMEOUT, DOCKER_QUERY_TIMEOUT};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info};

/// Errors from sandbox operations
#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("docker not available: {0}")]
    NotAvailable(String),
    #[error("image build failed for {image}: {detail}")]
    BuildFailed { image: String, detail: String },
    #[error("docker {0}")]
    Subprocess(String),
}

/// Resource and isolation settings for one container run.
#[derive(Debug, Clone)]
pub struct SandboxSpec {
    pub image: String,
    pub memory_limit: String,
    pub cpu_limit: f64,
    /// Network access; disabled maps to `--network none`.
    pub network: bool,
    pub timeout_s: u64,
}

/// Result of running a container to completion.
#[derive(Debug, Clone)]
pub struct ContainerOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

/// Async wrapper around the Docker CLI.
#[derive(Debug, Clone, Default)]
pub struct DockerClient;

impl DockerClient {
    pub fn new() -> Self {
        Self
    }

    /// Verify the Docker daemon is reachable.
    pub async fn is_available(&self) -> Result<(), SandboxError> {
        let (code, _, stderr) = self.run_docker(&["info"], DOCKER_QUERY_TIMEOUT).await?;
        if code != 0 {
            return Err(SandboxError::NotAvailable(stderr));
        }
        Ok(())
    }

    /// Check whether an image exists locally.
    pub async fn image_exists(&self, image: &str) -> Result<bool, SandboxError> {
        let (code, _, _) = self
            .run_docker(&["image", "inspect", image], DOCKER_QUERY_TIMEOUT)
            .await?;
        Ok(code == 0)
    }

    /// Build an image from a Dockerfile; the build context defaults to the
    /// Dockerfile's directory.
    pub async fn build_image(
        &self,
        dockerfile: &Path,
        image_tag: &str,
        context_dir: Option<&Path>,
    ) -> Result<(), SandboxError> {
        let ctx = context_dir
            .map(Path::to_path_buf)
            .or_else(|| dockerfile.parent().map(Path::to_path_buf))
            .unwrap_or_else(|| PathBuf::from("."));

        let dockerfile_str = dockerfile.display().to_string();
        let ctx_str = ctx.display().to_string();
        let (code, stdout, stderr) = self
            .run_docker(
                &["build", "-f", &dockerfile_str, "-t", image_tag, &ctx_str],
                DOCKER_BUILD_TIMEOUT,
            )
            .await?;

        if code != 0 {
            return Err(SandboxError::BuildFailed {
                image: image_tag.to_string(),
                detail: if stderr.is_empty() { stdout } else { stderr },
            });
        }
        info!(image = image_tag, "built docker image");
        Ok(())
    }

    /// Run a container to completion and capture its output.
    ///
    /// `mounts` are `(host, container, read_only)` bind mounts. Only the
    /// variables in `env` reach the container; nothing else is forwarded.
    pub async fn run_container(
        &self,
        spec: &SandboxSpec,
        command: &[String],
        workdir: &str,
        env: &[(String, String)],
        mounts: &[(PathBuf, String, bool)],
    ) -> Result<ContainerOutput, SandboxError> {
        let args = build_run_args(spec, command, workdir, env, mounts);

        debug!(image = %spec.image, ?command, "running container");

        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        let timeout = Duration::from_secs(spec.timeout_s);
        match self.run_docker(&arg_refs, timeout).await {
            Ok((code, stdout, stderr)) => Ok(ContainerOutput {
                exit_code: code,
                stdout,
                stderr,
            }),
            // Timeout: the container was killed with the CLI process
            Err(SandboxError::Subprocess(msg)) if msg.contains("timed out") => {
                Ok(ContainerOutput {
                    exit_code: -1,
                    stdout: String::new(),
                    stderr: format!("Container timed out after {}s", spec.timeout_s),
                })
            }
            Err(e) => Err(e),
        }
    }

    pub(crate) async fn run_docker(
        &self,
        args: &[&str],
        timeout: Duration,
    ) -> Result<(i32, String, String), SandboxError> {
        let mut cmd = Command::new("docker");
        cmd.args(args);

        let output = run_with_timeout(cmd, timeout, "docker")
            .await
            .map_err(SandboxError::Subprocess)?;

        Ok((
            output.status.code().unwrap_or(-1),
            String::from_utf8_lossy(&output.stdout).into_owned(),
            String::from_utf8_lossy(&output.stderr).into_owned(),
        ))
    }
}

/// Assemble the full `docker run` argument list for a sandboxed command.
fn build_run_args(
    spec: &SandboxSpec,
    command: &[String],
    workdir: &str,
    env: &[(String, String)],
    mounts: &[(PathBuf, String, bool)],
) -> Vec<String> {
    let mut args: Vec<String> = vec!["run".into(), "--rm".into()];

    args.push("--memory".into());
    args.push(spec.memory_limit.clone());
    args.push("--cpus".into());
    args.push(spec.cpu_limit.to_string());

    if !spec.network {
        args.push("--network".into());
        args.push("none".into());
    }

    args.push("-w".into());
    args.push(workdir.to_string());

    for (key, value) in env {
        args.push("-e".into());
        args.push(format!("{key}={value}"));
    }

    for (host, container, read_only) in mounts {
        let mut mount = format!("{}:{}", host.display(), container);
        if *read_only {
            mount.push_str(":ro");
        }
        args.push("-v".into());
        args.push(mount);
    }

    args.push(spec.image.clone());
    args.extend(command.iter().cloned());
    args
}

#[cfg(test)]
#[path = "docker_tests.rs"]
mod tests;
