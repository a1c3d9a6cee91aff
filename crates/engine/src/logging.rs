// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Adapter diagnostics on standard error.
//!
//! The parent captures stderr, so this is where decode errors and other
//! adapter-side problems surface. Stage-visible logging goes to the `log`
//! metadata key instead; see [`crate::StageContext`].

use crate::env;
use crate::profiler::StageLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

/// Filter from `SR_LOG`, falling back to `info` on a bad directive.
pub fn filter() -> EnvFilter {
    let directive = env::log_filter();
    EnvFilter::try_new(&directive).unwrap_or_else(|e| {
        eprintln!("invalid SR_LOG directive {directive:?}: {e}");
        EnvFilter::new("info")
    })
}

/// Install the process-wide subscriber. A second call is a no-op.
pub fn init() {
    let _ = tracing_subscriber::registry()
        .with(filter())
        .with(fmt::layer().with_writer(std::io::stderr).with_ansi(false))
        .try_init();
}

/// The stderr layer for the stage thread's scoped subscriber.
///
/// The stage thread does not see the global subscriber, so it gets its own
/// copy of the stderr output with a per-layer filter; the trail and profiler
/// layers on the same registry stay unfiltered.
pub fn stage_layer() -> StageLayer {
    fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_filter(filter())
        .boxed()
}
