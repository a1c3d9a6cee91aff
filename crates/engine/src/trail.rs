// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Span trail: the stage thread's call stack, as spans.
//!
//! Stage code has no interpreter frames to walk, so the adapter reconstructs
//! a trace from `tracing` spans. Each frame keeps its span's name, definition
//! site and recorded fields, which play the role of local variables.

use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Id, Record as SpanValues};
use tracing::Subscriber;
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

/// Target of the span the wrapper opens around the stage entry point.
pub const STAGE_ENTRY_TARGET: &str = "stage_entry";

/// Recorded span fields, in recording order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpanFields(Vec<(String, String)>);

impl SpanFields {
    fn set(&mut self, name: &str, value: String) {
        match self.0.iter_mut().find(|(k, _)| k == name) {
            Some(slot) => slot.1 = value,
            None => self.0.push((name.to_string(), value)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl Visit for SpanFields {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.set(field.name(), value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.set(field.name(), format!("{value:?}"));
    }
}

/// One entered span.
#[derive(Debug, Clone)]
pub struct Frame {
    id: Id,
    pub name: &'static str,
    pub file: &'static str,
    pub line: u32,
    /// True for the wrapper's stage entry span.
    pub entry: bool,
    pub fields: SpanFields,
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "  File '{}', line {}, in {}", self.file, self.line, self.name)
    }
}

#[derive(Debug, Default)]
struct TrailState {
    live: Vec<Frame>,
    /// Stack at the first exit after the most recent enter.
    unwound: Vec<Frame>,
    unwinding: bool,
}

/// Layer tracking the stage thread's span stack.
///
/// Clones share state: the wrapper keeps one handle, the scoped subscriber
/// another, and the signal listener reads the live stack from its own thread.
#[derive(Clone, Default)]
pub struct StageTrail {
    state: Arc<Mutex<TrailState>>,
}

impl StageTrail {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spans currently entered, outermost first.
    pub fn live(&self) -> Vec<Frame> {
        self.state.lock().live.clone()
    }

    /// Stack where the latest failure was raised.
    ///
    /// Once an error has propagated out of its spans the live stack is gone;
    /// what remains is the deepest stack observed while unwinding. Falls back
    /// to the live stack if nothing has unwound yet.
    pub fn unwound(&self) -> Vec<Frame> {
        let state = self.state.lock();
        let extends_live = state.unwound.len() >= state.live.len()
            && state.live.iter().zip(&state.unwound).all(|(a, b)| a.id == b.id);
        if state.unwinding && extends_live {
            state.unwound.clone()
        } else {
            state.live.clone()
        }
    }
}

impl<S> Layer<S> for StageTrail
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };
        let mut fields = SpanFields::default();
        attrs.record(&mut fields);
        span.extensions_mut().insert(fields);
    }

    fn on_record(&self, id: &Id, values: &SpanValues<'_>, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };
        let mut extensions = span.extensions_mut();
        let Some(fields) = extensions.get_mut::<SpanFields>() else {
            return;
        };
        values.record(fields);
        let updated = fields.clone();
        drop(extensions);

        let mut state = self.state.lock();
        for frame in state.live.iter_mut().filter(|f| f.id == *id) {
            frame.fields = updated.clone();
        }
    }

    fn on_enter(&self, id: &Id, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };
        let meta = span.metadata();
        let fields = span.extensions().get::<SpanFields>().cloned().unwrap_or_default();
        let frame = Frame {
            id: id.clone(),
            name: meta.name(),
            file: meta.file().unwrap_or("<unknown>"),
            line: meta.line().unwrap_or(0),
            entry: meta.target() == STAGE_ENTRY_TARGET,
            fields,
        };

        let mut state = self.state.lock();
        state.live.push(frame);
        state.unwinding = false;
    }

    fn on_exit(&self, id: &Id, _ctx: Context<'_, S>) {
        let mut state = self.state.lock();
        if !state.unwinding {
            state.unwound = state.live.clone();
            state.unwinding = true;
        }
        if let Some(pos) = state.live.iter().rposition(|f| f.id == *id) {
            state.live.truncate(pos);
        }
    }
}

#[cfg(test)]
#[path = "trail_tests.rs"]
mod tests;
