// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Line timing inside spans registered through `StageContext::profile`.
//!
//! A "line" is a `tracing` event. Time elapsed since the previous checkpoint
//! (span entry or the preceding event in the same span) is charged to the
//! event's source line; the remainder at span exit is charged to the span's
//! own definition line. Events inside nested spans are not counted, so a
//! callee's time lands on the caller's next line.

use super::{compress, pop_activation, push_activation, with_activation, LineTargets, StageLayer};
use crate::error::AdapterError;
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::Serialize;
use sr_storage::{keys, MetadataStore};
use std::fmt::{self, Write as _};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::field::{Field, Visit};
use tracing::span::Id;
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

const RETURN_CONTENTS: &str = "(return)";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct Function {
    file: &'static str,
    line: u32,
    name: &'static str,
}

#[derive(Debug, Default)]
struct LineStat {
    hits: u64,
    time: Duration,
    contents: String,
}

#[derive(Debug, Default)]
struct FunctionStats {
    total: Duration,
    lines: IndexMap<u32, LineStat>,
}

impl FunctionStats {
    fn charge(&mut self, line: u32, elapsed: Duration, contents: impl FnOnce() -> String) {
        self.total += elapsed;
        let stat = self.lines.entry(line).or_default();
        if stat.hits == 0 {
            stat.contents = contents();
        }
        stat.hits += 1;
        stat.time += elapsed;
    }
}

struct Cursor {
    last: Instant,
}

#[derive(Default)]
struct Message(String);

impl Visit for Message {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.0 = value.to_string();
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.0 = format!("{value:?}");
        }
    }
}

#[derive(Serialize)]
struct LineRow<'a> {
    line: u32,
    hits: u64,
    seconds: f64,
    contents: &'a str,
}

#[derive(Serialize)]
struct FunctionRow<'a> {
    function: &'a str,
    file: &'a str,
    line: u32,
    total_seconds: f64,
    lines: Vec<LineRow<'a>>,
}

#[derive(Clone)]
pub struct LineProfiler {
    targets: LineTargets,
    stats: Arc<Mutex<IndexMap<Function, FunctionStats>>>,
}

impl LineProfiler {
    pub fn new(targets: LineTargets) -> Self {
        Self { targets, stats: Arc::default() }
    }

    pub(super) fn layer(&self) -> StageLayer {
        Box::new(LineLayer { targets: self.targets.clone(), stats: Arc::clone(&self.stats) })
    }

    pub fn format_stats(&self) -> String {
        let stats = self.stats.lock();
        let mut out = String::from("Timer unit: 1e-06 s\n");
        for (function, fstats) in stats.iter() {
            let total_us = fstats.total.as_secs_f64() * 1e6;
            let _ = write!(
                out,
                "\nTotal time: {:.6} s\nFile: {}\nFunction: {} at line {}\n\n",
                fstats.total.as_secs_f64(),
                function.file,
                function.name,
                function.line
            );
            out.push_str("Line #      Hits         Time  Per Hit   % Time  Line Contents\n");
            out.push_str(&"=".repeat(62));
            out.push('\n');

            let mut lines: Vec<_> = fstats.lines.iter().collect();
            lines.sort_by_key(|(line, _)| **line);
            for (line, stat) in lines {
                let time_us = stat.time.as_secs_f64() * 1e6;
                let per_hit = if stat.hits > 0 { time_us / stat.hits as f64 } else { 0.0 };
                let percent = if total_us > 0.0 { 100.0 * time_us / total_us } else { 0.0 };
                let _ = writeln!(
                    out,
                    "{:>6} {:>9} {:>12.1} {:>8.1} {:>8.1}  {}",
                    line, stat.hits, time_us, per_hit, percent, stat.contents
                );
            }
        }
        out
    }

    fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        let stats = self.stats.lock();
        let rows: Vec<FunctionRow<'_>> = stats
            .iter()
            .map(|(function, fstats)| FunctionRow {
                function: function.name,
                file: function.file,
                line: function.line,
                total_seconds: fstats.total.as_secs_f64(),
                lines: fstats
                    .lines
                    .iter()
                    .map(|(line, stat)| LineRow {
                        line: *line,
                        hits: stat.hits,
                        seconds: stat.time.as_secs_f64(),
                        contents: &stat.contents,
                    })
                    .collect(),
            })
            .collect();
        serde_json::to_vec(&rows)
    }

    pub(super) fn dump_stats(&self, store: &MetadataStore) -> Result<(), AdapterError> {
        let json = self.to_json().map_err(|e| AdapterError::Profile(e.into()))?;
        store.write_bytes_atomic(keys::PROFILE_LINE_BIN, &compress(&json)?, true)?;
        store.write_raw_atomic(keys::PROFILE_LINE_TXT, &self.format_stats(), true)?;
        Ok(())
    }
}

struct LineLayer {
    targets: LineTargets,
    stats: Arc<Mutex<IndexMap<Function, FunctionStats>>>,
}

fn function(meta: &tracing::Metadata<'static>) -> Function {
    Function { file: meta.file().unwrap_or("<unknown>"), line: meta.line().unwrap_or(0), name: meta.name() }
}

impl<S> Layer<S> for LineLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_enter(&self, id: &Id, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };
        if self.targets.contains(span.name()) {
            push_activation(&span, Cursor { last: Instant::now() });
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let Some(span) = ctx.event_span(event) else {
            return;
        };
        let now = Instant::now();
        let Some(elapsed) = with_activation(&span, |cursor: &mut Cursor| {
            let elapsed = now.saturating_duration_since(cursor.last);
            cursor.last = now;
            elapsed
        }) else {
            return;
        };

        let line = event.metadata().line().unwrap_or(0);
        self.stats.lock().entry(function(span.metadata())).or_default().charge(line, elapsed, || {
            let mut message = Message::default();
            event.record(&mut message);
            message.0
        });
    }

    fn on_exit(&self, id: &Id, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };
        let Some(cursor) = pop_activation::<_, Cursor>(&span) else {
            return;
        };
        let meta = span.metadata();
        let line = meta.line().unwrap_or(0);
        self.stats.lock().entry(function(meta)).or_default().charge(
            line,
            cursor.last.elapsed(),
            || RETURN_CONTENTS.to_string(),
        );
    }
}

#[cfg(test)]
#[path = "line_tests.rs"]
mod tests;
