// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Peak-RSS growth per (callee, caller) span pair.

use super::{callsite_label, pop_activation, push_activation, StageLayer};
use crate::error::AdapterError;
use crate::rusage::MemorySampler;
use indexmap::IndexMap;
use parking_lot::Mutex;
use sr_storage::{keys, MetadataStore};
use std::sync::Arc;
use tracing::span::Id;
use tracing::Subscriber;
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

const NCALLS: &str = "ncalls";
const MAXRSS: &str = "maxrss(kb)";
const TOTALMEM: &str = "totalmem(kb)";
const PERCALL: &str = "percall(kb)";
const LABEL: &str = "filename:lineno(function) <--- caller_filename:lineno(caller_function)";

/// Caller label when a span has no parent.
const STAGE_CALLER: &str = "<stage>";

/// Left-pad `value` to the width of `header`.
fn padded(header: &str, value: impl ToString) -> String {
    format!("{:>width$}", value.to_string(), width = header.len())
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CallKey {
    callee: String,
    caller: String,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct MemStats {
    ncalls: u64,
    max_kb: u64,
    total_kb: u64,
}

/// Peak memory when the span was entered.
struct Mark(u64);

#[derive(Clone)]
pub struct MemProfiler {
    sampler: Arc<dyn MemorySampler>,
    stats: Arc<Mutex<IndexMap<CallKey, MemStats>>>,
}

impl MemProfiler {
    pub fn new(sampler: Arc<dyn MemorySampler>) -> Self {
        Self { sampler, stats: Arc::default() }
    }

    pub(super) fn layer(&self) -> StageLayer {
        Box::new(MemLayer { sampler: Arc::clone(&self.sampler), stats: Arc::clone(&self.stats) })
    }

    /// Table sorted by largest single-call growth, descending.
    pub fn format_stats(&self) -> String {
        let stats = self.stats.lock();
        let mut rows: Vec<_> = stats.iter().collect();
        rows.sort_by(|a, b| b.1.max_kb.cmp(&a.1.max_kb));

        let mut out = format!("{NCALLS}    {MAXRSS}    {TOTALMEM}    {PERCALL}    {LABEL}\n");
        for (key, s) in rows {
            let per_call = if s.ncalls > 0 { s.total_kb as f64 / s.ncalls as f64 } else { 0.0 };
            out.push_str(&format!(
                "{}    {}    {}    {}    {}\n",
                padded(NCALLS, s.ncalls),
                padded(MAXRSS, s.max_kb),
                padded(TOTALMEM, s.total_kb),
                padded(PERCALL, format!("{per_call:.1}")),
                padded(LABEL, format!("{} <--- {}", key.callee, key.caller)),
            ));
        }
        out
    }

    pub(super) fn dump_stats(&self, store: &MetadataStore) -> Result<(), AdapterError> {
        store.write_raw_atomic(keys::PROFILE_MEM_TXT, &self.format_stats(), true)?;
        Ok(())
    }
}

struct MemLayer {
    sampler: Arc<dyn MemorySampler>,
    stats: Arc<Mutex<IndexMap<CallKey, MemStats>>>,
}

fn label(meta: &tracing::Metadata<'static>) -> String {
    callsite_label(meta.file().unwrap_or("<unknown>"), meta.line().unwrap_or(0), meta.name())
}

impl<S> Layer<S> for MemLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_enter(&self, id: &Id, ctx: Context<'_, S>) {
        if let Some(span) = ctx.span(id) {
            push_activation(&span, Mark(self.sampler.peak_rss().max_kb()));
        }
    }

    fn on_exit(&self, id: &Id, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };
        let Some(Mark(start_kb)) = pop_activation::<_, Mark>(&span) else {
            return;
        };
        let delta = self.sampler.peak_rss().max_kb().saturating_sub(start_kb);
        let key = CallKey {
            callee: label(span.metadata()),
            caller: span
                .parent()
                .map(|p| label(p.metadata()))
                .unwrap_or_else(|| STAGE_CALLER.to_string()),
        };

        let mut stats = self.stats.lock();
        let entry = stats.entry(key).or_default();
        entry.ncalls += 1;
        entry.max_kb = entry.max_kb.max(delta);
        entry.total_kb += delta;
    }
}

#[cfg(test)]
#[path = "mem_tests.rs"]
mod tests;
