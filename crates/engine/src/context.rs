// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The adapter as seen from stage code.

use crate::env;
use crate::exec;
use crate::profiler::LineTargets;
use crate::stage::{StageError, StageResult};
use serde::Serialize;
use serde_json::{json, Value};
use sr_core::JobInfo;
use sr_storage::MetadataStore;
use std::ffi::OsStr;
use std::path::PathBuf;
use std::process::{Child, Command};
use std::sync::Arc;

/// Handle passed to every stage entry point.
///
/// Logging and progress failures are reported on stderr and otherwise
/// ignored: a full disk must not turn a diagnostic into a stage failure.
#[derive(Clone)]
pub struct StageContext {
    store: Arc<MetadataStore>,
    jobinfo: Arc<JobInfo>,
    line_targets: LineTargets,
}

impl StageContext {
    pub fn new(store: Arc<MetadataStore>, jobinfo: Arc<JobInfo>, line_targets: LineTargets) -> Self {
        Self { store, jobinfo, line_targets }
    }

    fn log(&self, level: &str, message: &str) {
        if let Err(e) = self.store.log(level, message) {
            tracing::warn!(level, error = %e, "failed to write stage log");
        }
    }

    pub fn log_info(&self, message: impl AsRef<str>) {
        self.log("info", message.as_ref());
    }

    pub fn log_warn(&self, message: impl AsRef<str>) {
        self.log("warn", message.as_ref());
    }

    pub fn log_time(&self, message: impl AsRef<str>) {
        self.log("time", message.as_ref());
    }

    /// Log `{"label": label, "object": value}` as compact JSON.
    pub fn log_json<T: Serialize + ?Sized>(&self, label: &str, value: &T) {
        match serde_json::to_value(value) {
            Ok(object) => self.log("json", &json!({"label": label, "object": object}).to_string()),
            Err(e) => tracing::warn!(label, error = %e, "unserializable log_json value"),
        }
    }

    pub fn update_progress(&self, message: impl AsRef<str>) {
        if let Err(e) = self.store.progress(message.as_ref()) {
            tracing::warn!(error = %e, "failed to write progress");
        }
    }

    pub fn alarm(&self, message: impl AsRef<str>) {
        if let Err(e) = self.store.alarm(message.as_ref()) {
            tracing::warn!(error = %e, "failed to write alarm");
        }
    }

    /// Path for a stage output file.
    pub fn make_path(&self, name: &str) -> PathBuf {
        self.store.file_path(name)
    }

    pub fn invocation_args(&self) -> Option<&Value> {
        self.jobinfo.invocation_args()
    }

    pub fn invocation_call(&self) -> Option<&str> {
        self.jobinfo.invocation_call()
    }

    pub fn martian_version(&self) -> Option<&str> {
        self.jobinfo.martian_version()
    }

    pub fn pipelines_version(&self) -> Option<&str> {
        self.jobinfo.pipelines_version()
    }

    pub fn threads(&self) -> f64 {
        self.jobinfo.threads
    }

    pub fn mem_gb(&self) -> f64 {
        self.jobinfo.mem_gb
    }

    pub fn pipestance_uuid(&self) -> String {
        env::pipestance_uuid()
    }

    /// Opt the span named `span_name` in to line profiling.
    pub fn profile(&self, span_name: impl Into<String>) {
        self.line_targets.add(span_name);
    }

    /// A command whose child dies with the adapter.
    pub fn command(&self, program: impl AsRef<OsStr>) -> Command {
        exec::command(program)
    }

    /// Log the command line and start it.
    pub fn spawn(&self, cmd: &mut Command) -> std::io::Result<Child> {
        self.log("exec", &exec::command_line(cmd));
        cmd.spawn()
    }

    /// Log the command line, run it to completion, and fail on non-zero exit.
    pub fn check_call(&self, cmd: &mut Command) -> StageResult<()> {
        let line = exec::command_line(cmd);
        self.log("exec", &line);
        let status = cmd.status()?;
        if status.success() {
            Ok(())
        } else {
            Err(StageError::failed(format!("command `{line}` failed: {status}")))
        }
    }

    /// Stop the job with an assertion: `return Err(ctx.exit("..."))`.
    pub fn exit(&self, message: impl Into<String>) -> StageError {
        StageError::Assertion(message.into())
    }
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod tests;
