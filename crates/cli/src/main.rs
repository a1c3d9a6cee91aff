// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! stagerun: execute one phase of a pipeline stage.
//!
//! Exit status 0 means the adapter reached a terminal state; whether the
//! stage succeeded is told by the `complete`, `errors` or `assert` files.
//! Status 1 means the adapter could not start.

mod stages;

use anyhow::Context as _;
use clap::Parser;
use sr_engine::{logging, Invocation};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "stagerun", version, about = "Run one phase of a pipeline stage")]
struct Cli {
    /// Path or name of the stage logic
    stage: String,
    /// split, main or join
    phase: String,
    /// Directory holding the `_<key>` metadata files
    metadata_dir: PathBuf,
    /// Directory for stage output files
    files_dir: PathBuf,
    /// Journal file prefix (empty disables journaling)
    run_file: String,
}

impl From<Cli> for Invocation {
    fn from(cli: Cli) -> Self {
        Invocation {
            stage_path: cli.stage,
            phase: cli.phase,
            metadata_dir: cli.metadata_dir,
            files_dir: cli.files_dir,
            run_file: cli.run_file,
        }
    }
}

fn main() {
    logging::init();
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        tracing::error!(error = %e, "cannot start");
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let invocation = Invocation::from(cli);
    let metadata_dir = invocation.metadata_dir.display().to_string();
    sr_engine::run(invocation, &stages::registry())
        .with_context(|| format!("stage adapter for {metadata_dir} could not start"))
}
