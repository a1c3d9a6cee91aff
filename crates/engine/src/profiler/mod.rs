// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process profilers.
//!
//! Every stage invocation goes through [`Profiler::run`], whatever the mode.
//! Measurements come from `tracing` spans: the profiler contributes a layer
//! to the subscriber scoped to the stage thread, and [`Profiler::dump_stats`]
//! persists what that layer collected.

mod cpu;
#[cfg(feature = "line-profiler")]
mod line;
mod mem;

pub use cpu::CpuProfiler;
#[cfg(feature = "line-profiler")]
pub use line::LineProfiler;
pub use mem::MemProfiler;

use crate::error::AdapterError;
use crate::rusage::MemorySampler;
use parking_lot::RwLock;
use sr_core::ProfileMode;
use sr_storage::MetadataStore;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::{LookupSpan, SpanRef};
use tracing_subscriber::{Layer, Registry};

/// A layer on the stage thread's registry.
pub type StageLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Span names opted in to line profiling.
#[derive(Clone, Default)]
pub struct LineTargets(Arc<RwLock<HashSet<String>>>);

impl LineTargets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, span_name: impl Into<String>) {
        self.0.write().insert(span_name.into());
    }

    pub fn contains(&self, span_name: &str) -> bool {
        self.0.read().contains(span_name)
    }
}

/// Profiler selected by the job's `profile_mode`.
pub enum Profiler {
    Disabled,
    /// Someone else samples the process; give them time to attach.
    External { name: String, attach_delay: Duration },
    Cpu(CpuProfiler),
    #[cfg(feature = "line-profiler")]
    Line(LineProfiler),
    Mem(MemProfiler),
}

impl Profiler {
    pub fn for_mode(
        mode: &ProfileMode,
        line_targets: &LineTargets,
        sampler: Arc<dyn MemorySampler>,
        attach_delay: Duration,
    ) -> Result<Self, AdapterError> {
        Ok(match mode {
            ProfileMode::Disable => Profiler::Disabled,
            ProfileMode::Cpu => Profiler::Cpu(CpuProfiler::new()),
            ProfileMode::Mem => Profiler::Mem(MemProfiler::new(sampler)),
            ProfileMode::Line => line_profiler(line_targets)?,
            ProfileMode::External(name) => {
                Profiler::External { name: name.clone(), attach_delay }
            }
        })
    }

    fn layer(&self) -> Option<StageLayer> {
        match self {
            Profiler::Disabled | Profiler::External { .. } => None,
            Profiler::Cpu(p) => Some(p.layer()),
            #[cfg(feature = "line-profiler")]
            Profiler::Line(p) => Some(p.layer()),
            Profiler::Mem(p) => Some(p.layer()),
        }
    }

    /// Run `f` on this thread under a subscriber made of `layers` plus this
    /// profiler's own layer.
    pub fn run<T>(&self, mut layers: Vec<StageLayer>, f: impl FnOnce() -> T) -> T {
        if let Profiler::External { name, attach_delay } = self {
            tracing::debug!(profiler = %name, ?attach_delay, "waiting for external profiler");
            std::thread::sleep(*attach_delay);
        }
        layers.extend(self.layer());
        let subscriber = Registry::default().with(layers);
        tracing::subscriber::with_default(subscriber, f)
    }

    /// Persist collected stats under the mode's metadata keys.
    pub fn dump_stats(&self, store: &MetadataStore) -> Result<(), AdapterError> {
        match self {
            Profiler::Disabled | Profiler::External { .. } => Ok(()),
            Profiler::Cpu(p) => p.dump_stats(store),
            #[cfg(feature = "line-profiler")]
            Profiler::Line(p) => p.dump_stats(store),
            Profiler::Mem(p) => p.dump_stats(store),
        }
    }
}

#[cfg(feature = "line-profiler")]
fn line_profiler(targets: &LineTargets) -> Result<Profiler, AdapterError> {
    Ok(Profiler::Line(LineProfiler::new(targets.clone())))
}

#[cfg(not(feature = "line-profiler"))]
fn line_profiler(_targets: &LineTargets) -> Result<Profiler, AdapterError> {
    Err(AdapterError::LineProfilerUnavailable)
}

/// Open activations of one span, innermost last.
///
/// A span handle may be entered again before it exits, or entered on
/// several threads at once, so per-activation state is a stack.
struct Activations<T>(Vec<T>);

fn push_activation<'a, S, T>(span: &SpanRef<'a, S>, value: T)
where
    S: LookupSpan<'a>,
    T: Send + Sync + 'static,
{
    let mut extensions = span.extensions_mut();
    if let Some(stack) = extensions.get_mut::<Activations<T>>() {
        stack.0.push(value);
        return;
    }
    extensions.insert(Activations(vec![value]));
}

fn pop_activation<'a, S, T>(span: &SpanRef<'a, S>) -> Option<T>
where
    S: LookupSpan<'a>,
    T: Send + Sync + 'static,
{
    let mut extensions = span.extensions_mut();
    extensions.get_mut::<Activations<T>>()?.0.pop()
}

/// Apply `f` to the innermost open activation of `span`.
fn with_activation<'a, S, T, R>(span: &SpanRef<'a, S>, f: impl FnOnce(&mut T) -> R) -> Option<R>
where
    S: LookupSpan<'a>,
    T: Send + Sync + 'static,
{
    let mut extensions = span.extensions_mut();
    extensions.get_mut::<Activations<T>>()?.0.last_mut().map(f)
}

/// zstd level for binary profile artifacts
const ZSTD_LEVEL: i32 = 3;

fn compress(json: &[u8]) -> Result<Vec<u8>, AdapterError> {
    zstd::encode_all(json, ZSTD_LEVEL).map_err(AdapterError::Profile)
}

/// `filename:lineno(function)`, the label used by every text report.
fn callsite_label(file: &str, line: u32, name: &str) -> String {
    format!("{file}:{line}({name})")
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
