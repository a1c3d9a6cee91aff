// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! sr-storage: the per-run metadata directory shared with the parent scheduler
//!
//! Every key maps to one `_<key>` file. Writes that the parent reads while the
//! job is live go through tmp+rename; each write is announced by touching a
//! journal file the parent polls.

pub mod json;
pub mod journal;
pub mod keys;
mod metadata;

pub use journal::journal_prefix;
pub use metadata::{MetadataError, MetadataStore};
