// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the adapter.

use serde_json::{json, Value};
use std::time::Duration;

/// Runtime identity recorded in jobinfo (from Cargo.toml and build.rs)
pub const RUNTIME_VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), "+", env!("BUILD_GIT_HASH"));

fn millis(name: &str) -> Option<Duration> {
    std::env::var(name).ok().and_then(|s| s.parse::<u64>().ok()).map(Duration::from_millis)
}

/// Heartbeat journal interval (default 2 min, `SR_HEARTBEAT_INTERVAL_MS`).
pub fn heartbeat_interval() -> Duration {
    millis("SR_HEARTBEAT_INTERVAL_MS").unwrap_or(Duration::from_secs(120))
}

/// Memory monitor poll interval (default 5s, `SR_MONITOR_INTERVAL_MS`).
pub fn monitor_interval() -> Duration {
    millis("SR_MONITOR_INTERVAL_MS").unwrap_or(Duration::from_secs(5))
}

/// Grace period for an external profiler to attach (default 500ms).
pub fn profiler_attach_delay() -> Duration {
    millis("SR_PROFILER_ATTACH_DELAY_MS").unwrap_or(Duration::from_millis(500))
}

/// Tracing filter directive for adapter diagnostics
pub fn log_filter() -> String {
    std::env::var("SR_LOG").ok().filter(|s| !s.is_empty()).unwrap_or_else(|| "info".to_string())
}

/// Pipeline instance UUID: MRO_UUID > MRO_FORCE_UUID > empty
pub fn pipestance_uuid() -> String {
    ["MRO_UUID", "MRO_FORCE_UUID"]
        .iter()
        .filter_map(|name| std::env::var(name).ok())
        .find(|s| !s.is_empty())
        .unwrap_or_default()
}

pub fn hostname() -> String {
    nix::unistd::gethostname()
        .ok()
        .and_then(|name| name.into_string().ok())
        .unwrap_or_default()
}

/// Grid Engine job description, present only when running under SGE.
pub fn sge_info() -> Option<Value> {
    std::env::var("SGE_ARCH").ok()?;
    let var = |name: &str| std::env::var(name).ok();
    Some(json!({
        "root": var("SGE_ROOT"),
        "cell": var("SGE_CELL"),
        "queue": var("QUEUE"),
        "jobid": var("JOB_ID"),
        "jobname": var("JOB_NAME"),
        "sub_host": var("SGE_O_HOST"),
        "sub_user": var("SGE_O_LOGNAME"),
        "exec_host": var("HOSTNAME"),
        "exec_user": var("LOGNAME"),
    }))
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
