// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Done transition and the terminal writes that precede it.

use crate::rusage::rusage_report;
use crate::termination::{ProcessExit, TerminationClaim, TerminationFlag};
use serde_json::{json, Map, Value};
use sr_core::{format_timestamp, Clock};
use sr_storage::{keys, MetadataStore};
use std::sync::Arc;
use std::time::{Instant, SystemTime};
use tokio_util::sync::CancellationToken;

/// A terminal failure artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Failure {
    /// Written to `errors`, optionally with a `stackvars` dump.
    Error { trace: String, stackvars: Option<String> },
    /// Written to `assert`.
    Assertion(String),
}

impl Failure {
    pub fn error(trace: impl Into<String>) -> Self {
        Failure::Error { trace: trace.into(), stackvars: None }
    }
}

/// Owns the termination flag and everything Done needs.
pub struct Terminator {
    flag: TerminationFlag,
    store: Arc<MetadataStore>,
    started: Instant,
    started_wall: SystemTime,
    background: CancellationToken,
    exit: Arc<dyn ProcessExit>,
}

impl Terminator {
    pub fn new(store: Arc<MetadataStore>, exit: Arc<dyn ProcessExit>) -> Self {
        let clock = store.clock();
        Self {
            flag: TerminationFlag::new(),
            started: clock.now(),
            started_wall: clock.wall(),
            store,
            background: CancellationToken::new(),
            exit,
        }
    }

    pub fn store(&self) -> &Arc<MetadataStore> {
        &self.store
    }

    /// Cancelled as the first step of Done.
    pub fn background(&self) -> &CancellationToken {
        &self.background
    }

    pub fn claim(&self) -> Option<TerminationClaim> {
        self.flag.claim()
    }

    /// Give up the current thread after losing the claim.
    pub fn abandon(&self) {
        self.exit.abandon();
    }

    /// Mark success: `complete` timestamp, then Done.
    pub fn complete(&self) {
        let Some(claim) = self.claim() else {
            return self.abandon();
        };
        if let Err(e) = self.store.write_time(keys::COMPLETE) {
            tracing::error!(error = %e, "failed to write completion time");
        }
        self.done(claim);
    }

    /// Persist `failure` and run Done, unless another context got there first.
    pub fn fail(&self, failure: &Failure) {
        let Some(claim) = self.claim() else {
            return self.abandon();
        };
        self.fail_claimed(claim, failure);
    }

    /// Persist `failure` and run Done with a claim taken earlier.
    pub fn fail_claimed(&self, claim: TerminationClaim, failure: &Failure) {
        self.write_failure(failure);
        self.done(claim);
    }

    fn write_failure(&self, failure: &Failure) {
        let result = match failure {
            Failure::Error { trace, stackvars } => {
                if let Some(dump) = stackvars {
                    if let Err(e) = self.store.write_raw_atomic(keys::STACKVARS, dump, false) {
                        tracing::error!(error = %e, "failed to write stackvars");
                    }
                }
                self.store.write_errors(trace)
            }
            Failure::Assertion(message) => self.store.write_assert(message),
        };
        if let Err(e) = result {
            tracing::error!(error = %e, "failed to write terminal artifact");
        }
    }

    /// Stop background loops, record wallclock and rusage in jobinfo, exit 0.
    ///
    /// Taking the claim by value makes this the only jobinfo read-modify-write
    /// after startup.
    pub fn done(&self, claim: TerminationClaim) {
        drop(claim);
        self.background.cancel();

        let clock = self.store.clock();
        let duration = clock.now().saturating_duration_since(self.started);
        let mut jobinfo = match self.store.read(keys::JOBINFO) {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        jobinfo.insert(
            "wallclock".to_string(),
            json!({
                "start": format_timestamp(self.started_wall),
                "end": format_timestamp(clock.wall()),
                "duration_seconds": duration.as_secs_f64(),
            }),
        );
        jobinfo.insert("rusage".to_string(), rusage_report());
        if let Err(e) = self.store.write_atomic(keys::JOBINFO, &jobinfo) {
            tracing::error!(error = %e, "failed to record final jobinfo");
        }

        tracing::debug!(duration_seconds = duration.as_secs_f64(), "done");
        self.exit.exit(0);
    }
}

#[cfg(test)]
#[path = "done_tests.rs"]
mod tests;
