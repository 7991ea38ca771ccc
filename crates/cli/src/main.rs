// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! aurelia - autonomous code-improvement runtime CLI

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "aurelia",
    version,
    about = "Aurelia - autonomous code-improvement runtime"
)]
struct Cli {
    /// Project directory (defaults to the current directory)
    #[arg(short = 'C', global = true, value_name = "DIR")]
    directory: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the orchestrator in the foreground
    Start,
    /// Signal a running orchestrator to shut down
    Stop,
    /// Print runtime status from the state snapshot
    Status,
    /// Remove state, logs, worktrees, and aurelia/* branches
    Reset,
    /// Summarize the last run
    Report,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let project_dir = match cli.directory {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };

    match cli.command {
        Commands::Start => commands::start::run(&project_dir).await,
        Commands::Stop => commands::stop::run(&project_dir),
        Commands::Status => commands::status::run(&project_dir),
        Commands::Reset => commands::reset::run(&project_dir).await,
        Commands::Report => commands::report::run(&project_dir),
    }
}
