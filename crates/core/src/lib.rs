// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! sr-core: data model shared by the stage execution adapter crates

pub mod macros;

pub mod clock;
pub mod jobinfo;
pub mod phase;
pub mod record;
pub mod stage_defs;
pub mod time_fmt;

pub use clock::{Clock, SystemClock};
#[cfg(any(test, feature = "test-support"))]
pub use clock::FakeClock;
pub use jobinfo::{JobInfo, JobInfoError, ProfileMode};
pub use phase::{InvalidPhase, Phase};
pub use record::{Record, RecordError};
pub use stage_defs::{ChunkDef, StageDefs};
pub use time_fmt::format_timestamp;
