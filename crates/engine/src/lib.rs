// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! sr-engine: runs one stage phase and reports its outcome through the
//! metadata directory.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod context;
mod crash;
mod done;
pub mod env;
mod error;
pub mod exec;
pub mod logging;
mod monitor;
pub mod profiler;
mod rusage;
pub mod signals;
mod stage;
mod termination;
mod trail;
mod wrapper;

pub use context::StageContext;
pub use crash::{catch_stage_panic, Crash, PanicReport};
pub use done::{Failure, Terminator};
pub use error::AdapterError;
pub use monitor::{heartbeat, memory_monitor, MemoryLimit};
pub use profiler::{LineTargets, Profiler};
pub use rusage::{rusage_report, MemorySampler, PeakRss, RusageSampler};
pub use stage::{Stage, StageError, StageRegistry, StageResult, StageSchema};
pub use termination::{ProcessExit, SystemExit, TerminationClaim, TerminationFlag};
pub use trail::{Frame, SpanFields, StageTrail, STAGE_ENTRY_TARGET};
pub use wrapper::{run, Invocation, StageWrapper, WrapperConfig};

#[cfg(any(test, feature = "test-support"))]
pub use rusage::FakeMemorySampler;
#[cfg(any(test, feature = "test-support"))]
pub use termination::RecordingExit;
