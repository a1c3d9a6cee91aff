// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Liveness and resource background loops.
//!
//! Both loops run on the adapter's tokio runtime and stop when the
//! terminator's background token is cancelled, which Done does first.

use crate::crash::Crash;
use crate::done::{Failure, Terminator};
use crate::rusage::{MemorySampler, PeakRss};
use sr_storage::{keys, MetadataStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Memory ceiling derived from the job's `memGB`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MemoryLimit {
    pub limit_kb: u64,
    pub mem_gb: f64,
}

impl MemoryLimit {
    /// Describe the violation if `sample` exceeds the ceiling.
    pub fn check(&self, sample: PeakRss) -> Option<String> {
        let used = sample.combined_kb();
        (used > self.limit_kb).then(|| {
            format!(
                "Job exceeded memory limit: peak resident memory {used} KB exceeds the {} KB limit ({} GB requested)",
                self.limit_kb, self.mem_gb
            )
        })
    }
}

fn ticker(period: Duration) -> tokio::time::Interval {
    let mut interval = interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

/// Force the heartbeat journal every `period` until cancelled.
pub async fn heartbeat(store: Arc<MetadataStore>, period: Duration, cancel: CancellationToken) {
    let mut interval = ticker(period);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {
                if let Err(e) = store.update_journal(keys::HEARTBEAT, true) {
                    tracing::warn!(error = %e, "heartbeat journal update failed");
                }
            }
        }
    }
    tracing::debug!("heartbeat stopped");
}

/// Sample peak memory every `period`; fail the job once it exceeds `limit`.
pub async fn memory_monitor(
    terminator: Arc<Terminator>,
    sampler: Arc<dyn MemorySampler>,
    limit: MemoryLimit,
    period: Duration,
) {
    let cancel = terminator.background().clone();
    let mut interval = ticker(period);
    let message = loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::debug!("memory monitor stopped");
                return;
            }
            _ = interval.tick() => {
                if let Some(message) = limit.check(sampler.peak_rss()) {
                    break message;
                }
            }
        }
    };

    tracing::error!(limit_kb = limit.limit_kb, "{message}");
    let trace = Crash::new("MemoryLimitExceeded", message, Vec::new()).trace();
    // Done exits the process; park the blocking pool thread, not a runtime worker.
    let finish = tokio::task::spawn_blocking(move || terminator.fail(&Failure::error(trace)));
    if let Err(e) = finish.await {
        tracing::error!(error = %e, "memory limit handler failed");
    }
}

#[cfg(test)]
#[path = "monitor_tests.rs"]
mod tests;
