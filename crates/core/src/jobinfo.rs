// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cached, read-only view of the parent's job configuration.

use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Errors decoding the `jobinfo` document
#[derive(Debug, Error)]
pub enum JobInfoError {
    #[error("jobinfo is not a JSON object")]
    NotAnObject,

    #[error("jobinfo field `{0}` is missing")]
    Missing(&'static str),

    #[error("jobinfo field `{field}` must be {expected}")]
    Invalid { field: &'static str, expected: &'static str },
}

/// In-process profiling requested for the job.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ProfileMode {
    #[default]
    Disable,
    Cpu,
    Line,
    Mem,
    /// A profiler that attaches from outside the process (`perf`, `pyflame`, ...).
    External(String),
}

impl ProfileMode {
    pub fn parse(value: &str) -> Self {
        match value {
            "" | "disable" => ProfileMode::Disable,
            "cpu" => ProfileMode::Cpu,
            "line" => ProfileMode::Line,
            "mem" => ProfileMode::Mem,
            other => ProfileMode::External(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ProfileMode::Disable => "disable",
            ProfileMode::Cpu => "cpu",
            ProfileMode::Line => "line",
            ProfileMode::Mem => "mem",
            ProfileMode::External(name) => name,
        }
    }
}

impl fmt::Display for ProfileMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Subset of `jobinfo` read once at startup and never re-read.
#[derive(Debug, Clone, PartialEq)]
pub struct JobInfo {
    pub profile_mode: ProfileMode,
    /// Dump span fields with the stack on failure.
    pub stackvars: bool,
    /// Run the memory ceiling monitor.
    pub monitor: bool,
    /// The stage invocation descriptor (`{"call": ..., "args": ...}`).
    pub invocation: Value,
    /// `{"martian": ..., "pipelines": ...}`
    pub version: Value,
    pub threads: f64,
    pub mem_gb: f64,
}

impl JobInfo {
    pub fn from_document(document: &Value) -> Result<Self, JobInfoError> {
        let map = document.as_object().ok_or(JobInfoError::NotAnObject)?;

        let profile_mode = match map.get("profile_mode") {
            None | Some(Value::Null) => ProfileMode::Disable,
            Some(Value::String(mode)) => ProfileMode::parse(mode),
            Some(_) => {
                return Err(JobInfoError::Invalid { field: "profile_mode", expected: "a string" })
            }
        };

        Ok(Self {
            profile_mode,
            stackvars: flag(map.get("stackvars_flag"), "stackvars"),
            monitor: flag(map.get("monitor_flag"), "monitor"),
            invocation: map.get("invocation").cloned().unwrap_or(Value::Null),
            version: map.get("version").cloned().unwrap_or(Value::Null),
            threads: number(map.get("threads"), "threads")?,
            mem_gb: number(map.get("memGB"), "memGB")?,
        })
    }

    /// Memory ceiling in KB, the unit reported by `getrusage`.
    pub fn memory_limit_kb(&self) -> u64 {
        convert_gb_to_kb(self.mem_gb)
    }

    pub fn invocation_args(&self) -> Option<&Value> {
        self.invocation.get("args")
    }

    pub fn invocation_call(&self) -> Option<&str> {
        self.invocation.get("call").and_then(Value::as_str)
    }

    pub fn martian_version(&self) -> Option<&str> {
        self.version.get("martian").and_then(Value::as_str)
    }

    pub fn pipelines_version(&self) -> Option<&str> {
        self.version.get("pipelines").and_then(Value::as_str)
    }
}

/// Convert GB to KB (binary units).
pub fn convert_gb_to_kb(mem_gb: f64) -> u64 {
    if mem_gb.is_finite() && mem_gb > 0.0 {
        (mem_gb * 1024.0 * 1024.0).round() as u64
    } else {
        0
    }
}

fn flag(value: Option<&Value>, enabled: &str) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s == enabled,
        _ => false,
    }
}

fn number(value: Option<&Value>, field: &'static str) -> Result<f64, JobInfoError> {
    value
        .ok_or(JobInfoError::Missing(field))?
        .as_f64()
        .ok_or(JobInfoError::Invalid { field, expected: "a number" })
}

#[cfg(test)]
#[path = "jobinfo_tests.rs"]
mod tests;
