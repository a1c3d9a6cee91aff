// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The stage capability and the plugin table that resolves it.

use crate::context::StageContext;
use crate::crash;
use crate::trail::Frame;
use sr_core::{Record, RecordError, StageDefs};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Failure returned by stage logic.
#[derive(Debug, Error)]
pub enum StageError {
    /// Deliberate stop with a user-facing message; written to `assert`.
    #[error("{0}")]
    Assertion(String),

    /// Anything else. `frames` is the span stack where the error became a
    /// `StageError`, when that happened on the stage thread.
    #[error("{error}")]
    Failed { error: anyhow::Error, frames: Option<Vec<Frame>> },
}

impl StageError {
    pub fn assertion(message: impl Into<String>) -> Self {
        StageError::Assertion(message.into())
    }

    pub fn failed(message: impl std::fmt::Display) -> Self {
        anyhow::anyhow!("{message}").into()
    }
}

impl From<anyhow::Error> for StageError {
    fn from(error: anyhow::Error) -> Self {
        StageError::Failed { error, frames: crash::stage_frames() }
    }
}

impl From<std::io::Error> for StageError {
    fn from(e: std::io::Error) -> Self {
        anyhow::Error::from(e).into()
    }
}

impl From<serde_json::Error> for StageError {
    fn from(e: serde_json::Error) -> Self {
        anyhow::Error::from(e).into()
    }
}

impl From<RecordError> for StageError {
    fn from(e: RecordError) -> Self {
        anyhow::Error::from(e).into()
    }
}

pub type StageResult<T> = Result<T, StageError>;

/// Field names a stage declares for its arguments and outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageSchema {
    pub args: &'static [&'static str],
    pub outs: &'static [&'static str],
}

/// User stage logic.
///
/// A stage without chunks only implements `main`. Split stages also
/// implement `split` and `join`.
pub trait Stage: Send + Sync {
    fn split(&self, _ctx: &StageContext, _args: &Record) -> StageResult<StageDefs> {
        Err(StageError::failed("stage does not implement split"))
    }

    fn main(&self, ctx: &StageContext, args: &Record, outs: &mut Record) -> StageResult<()>;

    fn join(
        &self,
        _ctx: &StageContext,
        _args: &Record,
        _outs: &mut Record,
        _chunk_defs: &[Record],
        _chunk_outs: &[Record],
    ) -> StageResult<()> {
        Err(StageError::failed("stage does not implement join"))
    }

    /// Expected argument and output fields, checked when decoding.
    fn schema(&self) -> Option<StageSchema> {
        None
    }
}

/// Stages by path or identifier.
#[derive(Default, Clone)]
pub struct StageRegistry {
    stages: HashMap<String, Arc<dyn Stage>>,
}

impl StageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, name: impl Into<String>, stage: impl Stage + 'static) -> Self {
        self.stages.insert(name.into(), Arc::new(stage));
        self
    }

    /// Resolve a stage path: exact match first, then its final component.
    pub fn lookup(&self, path: &str) -> Option<Arc<dyn Stage>> {
        if let Some(stage) = self.stages.get(path) {
            return Some(Arc::clone(stage));
        }
        let trimmed = path.trim_end_matches('/');
        let base = Path::new(trimmed).file_name()?.to_str()?;
        self.stages.get(base).cloned()
    }
}
