// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Adapter error types

use sr_core::{InvalidPhase, JobInfoError, RecordError};
use sr_storage::MetadataError;
use thiserror::Error;

/// Errors that fail the job before or around stage logic.
///
/// Anything surfacing after jobinfo was persisted is reported through the
/// `errors` key; earlier failures mean the adapter could not start.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error(transparent)]
    Metadata(#[from] MetadataError),

    #[error("invalid jobinfo: {0}")]
    JobInfo(#[from] JobInfoError),

    #[error(transparent)]
    Record(#[from] RecordError),

    #[error(transparent)]
    Phase(#[from] InvalidPhase),

    #[error("`{0}` is not a JSON list")]
    NotAList(&'static str),

    #[error("no stage registered for {0}")]
    UnknownStage(String),

    #[error("Line-level profiling was requested, but this build has no line profiler.")]
    LineProfilerUnavailable,

    #[error("failed to encode profile: {0}")]
    Profile(#[source] std::io::Error),

    #[error("failed to start runtime: {0}")]
    Runtime(#[source] std::io::Error),
}
