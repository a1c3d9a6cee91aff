// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Deterministic call counting and timing per span callsite.

use super::{callsite_label, compress, pop_activation, push_activation, with_activation, StageLayer};
use crate::error::AdapterError;
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::Serialize;
use sr_storage::{keys, MetadataStore};
use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::span::Id;
use tracing::Subscriber;
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct Callsite {
    file: &'static str,
    line: u32,
    name: &'static str,
}

#[derive(Debug, Default, Clone, Copy)]
struct CallStats {
    ncalls: u64,
    tottime: Duration,
    cumtime: Duration,
}

#[derive(Default)]
struct CpuState {
    stats: IndexMap<Callsite, CallStats>,
    /// Activations per callsite, so recursion counts cumulative time once.
    active: HashMap<Callsite, usize>,
}

/// Per-activation timing kept in span extensions.
struct Timing {
    entered: Instant,
    children: Duration,
}

/// One row of the cumulative-time report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CpuRow {
    pub function: String,
    pub ncalls: u64,
    pub tottime: f64,
    pub cumtime: f64,
}

#[derive(Clone, Default)]
pub struct CpuProfiler {
    state: Arc<Mutex<CpuState>>,
}

impl CpuProfiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub(super) fn layer(&self) -> StageLayer {
        Box::new(CpuLayer { state: Arc::clone(&self.state) })
    }

    /// Rows sorted by cumulative time, descending.
    pub fn rows(&self) -> Vec<CpuRow> {
        let state = self.state.lock();
        let mut rows: Vec<CpuRow> = state
            .stats
            .iter()
            .map(|(site, stats)| CpuRow {
                function: callsite_label(site.file, site.line, site.name),
                ncalls: stats.ncalls,
                tottime: stats.tottime.as_secs_f64(),
                cumtime: stats.cumtime.as_secs_f64(),
            })
            .collect();
        rows.sort_by(|a, b| b.cumtime.total_cmp(&a.cumtime));
        rows
    }

    pub fn format_stats(&self) -> String {
        let rows = self.rows();
        let calls: u64 = rows.iter().map(|r| r.ncalls).sum();
        let total: f64 = rows.iter().map(|r| r.tottime).sum();

        let mut out = format!("{calls} function calls in {total:.3} seconds\n\n");
        out.push_str("   Ordered by: cumulative time\n\n");
        out.push_str("   ncalls  tottime  percall  cumtime  percall filename:lineno(function)\n");
        for row in &rows {
            let per = |t: f64| if row.ncalls > 0 { t / row.ncalls as f64 } else { 0.0 };
            let _ = writeln!(
                out,
                "{:>9} {:>8.3} {:>8.3} {:>8.3} {:>8.3} {}",
                row.ncalls,
                row.tottime,
                per(row.tottime),
                row.cumtime,
                per(row.cumtime),
                row.function
            );
        }
        out
    }

    pub(super) fn dump_stats(&self, store: &MetadataStore) -> Result<(), AdapterError> {
        let json = serde_json::to_vec(&self.rows()).map_err(|e| AdapterError::Profile(e.into()))?;
        store.write_bytes_atomic(keys::PROFILE_CPU_BIN, &compress(&json)?, true)?;
        store.write_raw_atomic(keys::PROFILE_CPU_TXT, &self.format_stats(), true)?;
        Ok(())
    }
}

struct CpuLayer {
    state: Arc<Mutex<CpuState>>,
}

fn callsite(meta: &tracing::Metadata<'static>) -> Callsite {
    Callsite { file: meta.file().unwrap_or("<unknown>"), line: meta.line().unwrap_or(0), name: meta.name() }
}

impl<S> Layer<S> for CpuLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_enter(&self, id: &Id, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };
        push_activation(&span, Timing { entered: Instant::now(), children: Duration::ZERO });
        *self.state.lock().active.entry(callsite(span.metadata())).or_default() += 1;
    }

    fn on_exit(&self, id: &Id, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };
        let Some(timing) = pop_activation::<_, Timing>(&span) else {
            return;
        };
        let elapsed = timing.entered.elapsed();
        if let Some(parent) = span.parent() {
            with_activation(&parent, |outer: &mut Timing| outer.children += elapsed);
        }

        let site = callsite(span.metadata());
        let mut state = self.state.lock();
        let outermost = match state.active.get_mut(&site) {
            Some(depth) => {
                *depth = depth.saturating_sub(1);
                *depth == 0
            }
            None => true,
        };
        let stats = state.stats.entry(site).or_default();
        stats.ncalls += 1;
        stats.tottime += elapsed.saturating_sub(timing.children);
        if outermost {
            stats.cumtime += elapsed;
        }
    }
}

#[cfg(test)]
#[path = "cpu_tests.rs"]
mod tests;
