// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared helpers for the stagerun specs.

pub use assert_cmd::Command;
pub use serde_json::{json, Value};
pub use std::time::Duration;

use std::path::{Path, PathBuf};
use std::process::{Child, ExitStatus, Stdio};
use tempfile::TempDir;

/// Upper bound for anything a spec waits on.
pub const SPEC_WAIT_MAX_MS: u64 = 10_000;

/// Poll `check` every 10ms until it holds or `max_ms` elapses.
pub fn wait_for(max_ms: u64, mut check: impl FnMut() -> bool) -> bool {
    let deadline = std::time::Instant::now() + Duration::from_millis(max_ms);
    loop {
        if check() {
            return true;
        }
        if std::time::Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
}

const RUN_FILE: &str = "ID.pipe.STAGE.fork0.chnk0";

/// One seeded stage invocation: metadata, files and journal directories.
pub struct Run {
    dir: TempDir,
}

impl Run {
    pub fn new(jobinfo: Value, args: Value, outs: Value) -> Self {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("files")).unwrap();
        std::fs::create_dir(dir.path().join("journal")).unwrap();
        let run = Self { dir };
        run.seed("jobinfo", jobinfo);
        run.seed("args", args);
        run.seed("outs", outs);
        run
    }

    /// Default resources, given args and outs.
    pub fn job(args: Value, outs: Value) -> Self {
        Self::new(json!({"threads": 1, "memGB": 1}), args, outs)
    }

    pub fn seed(&self, key: &str, value: Value) {
        std::fs::write(self.path(key), value.to_string()).unwrap();
    }

    pub fn remove(&self, key: &str) {
        std::fs::remove_file(self.path(key)).unwrap();
    }

    pub fn path(&self, key: &str) -> PathBuf {
        self.dir.path().join(format!("_{key}"))
    }

    pub fn metadata_dir(&self) -> &Path {
        self.dir.path()
    }

    pub fn run_file(&self) -> String {
        format!("{}/journal/{RUN_FILE}", self.dir.path().display())
    }

    fn args(&self, stage: &str, phase: &str) -> Vec<String> {
        vec![
            format!("/opt/stages/{stage}"),
            phase.to_string(),
            self.dir.path().display().to_string(),
            self.dir.path().join("files").display().to_string(),
            self.run_file(),
        ]
    }

    /// `stagerun` for `stage` and `phase` against this run.
    pub fn stagerun(&self, stage: &str, phase: &str) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_stagerun"));
        cmd.args(self.args(stage, phase));
        cmd
    }

    /// Start `stagerun` in the background.
    pub fn spawn(&self, stage: &str, phase: &str, envs: &[(&str, &str)]) -> Child {
        std::process::Command::new(env!("CARGO_BIN_EXE_stagerun"))
            .args(self.args(stage, phase))
            .envs(envs.iter().copied())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .unwrap()
    }

    pub fn has(&self, key: &str) -> bool {
        self.path(key).exists()
    }

    pub fn text(&self, key: &str) -> String {
        std::fs::read_to_string(self.path(key))
            .unwrap_or_else(|e| panic!("reading _{key}: {e}"))
    }

    pub fn read(&self, key: &str) -> Value {
        serde_json::from_str(&self.text(key)).unwrap()
    }

    pub fn journal(&self, name: &str) -> bool {
        self.dir.path().join("journal").join(format!("{RUN_FILE}.{name}")).exists()
    }
}

/// Wait for `child` to exit on its own.
pub fn wait_exit(child: &mut Child) -> ExitStatus {
    let mut status = None;
    let exited = wait_for(SPEC_WAIT_MAX_MS, || {
        status = child.try_wait().unwrap();
        status.is_some()
    });
    if !exited {
        let _ = child.kill();
        panic!("stagerun did not exit");
    }
    status.unwrap()
}
