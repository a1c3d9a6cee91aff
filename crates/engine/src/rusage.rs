// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Resource usage of this process and its reaped children.

use nix::sys::resource::{getrusage, Usage, UsageWho};
use nix::sys::time::TimeVal;
use serde_json::{json, Value};

/// Peak resident set sizes in KB.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PeakRss {
    pub self_kb: u64,
    pub children_kb: u64,
}

impl PeakRss {
    /// Combined footprint of the adapter and the children it waited on.
    pub fn combined_kb(&self) -> u64 {
        self.self_kb.saturating_add(self.children_kb)
    }

    /// Larger of the two peaks.
    pub fn max_kb(&self) -> u64 {
        self.self_kb.max(self.children_kb)
    }
}

/// Source of peak memory readings for the monitor and the memory profiler.
pub trait MemorySampler: Send + Sync + 'static {
    fn peak_rss(&self) -> PeakRss;
}

/// Reads `getrusage(2)`; Linux reports `ru_maxrss` in KB.
#[derive(Debug, Clone, Copy, Default)]
pub struct RusageSampler;

impl MemorySampler for RusageSampler {
    fn peak_rss(&self) -> PeakRss {
        let max_rss = |who| getrusage(who).map(|u| u.max_rss().max(0) as u64).unwrap_or(0);
        PeakRss { self_kb: max_rss(UsageWho::RUSAGE_SELF), children_kb: max_rss(UsageWho::RUSAGE_CHILDREN) }
    }
}

fn seconds(tv: TimeVal) -> f64 {
    tv.tv_sec() as f64 + tv.tv_usec() as f64 / 1_000_000.0
}

fn usage_document(usage: &Usage) -> Value {
    json!({
        "ru_utime": seconds(usage.user_time()),
        "ru_stime": seconds(usage.system_time()),
        "ru_maxrss": usage.max_rss(),
        "ru_ixrss": usage.shared_integral(),
        "ru_idrss": usage.unshared_data_integral(),
        "ru_isrss": usage.unshared_stack_integral(),
        "ru_minflt": usage.minor_page_faults(),
        "ru_majflt": usage.major_page_faults(),
        "ru_nswap": usage.full_swaps(),
        "ru_inblock": usage.block_reads(),
        "ru_oublock": usage.block_writes(),
        "ru_msgsnd": usage.ipc_sends(),
        "ru_msgrcv": usage.ipc_receives(),
        "ru_nsignals": usage.signals(),
        "ru_nvcsw": usage.voluntary_context_switches(),
        "ru_nivcsw": usage.involuntary_context_switches(),
    })
}

/// `{"self": {...}, "children": {...}}` for the jobinfo `rusage` field.
pub fn rusage_report() -> Value {
    let report = |who| match getrusage(who) {
        Ok(usage) => usage_document(&usage),
        Err(e) => {
            tracing::warn!(error = %e, "getrusage failed");
            Value::Null
        }
    };
    json!({
        "self": report(UsageWho::RUSAGE_SELF),
        "children": report(UsageWho::RUSAGE_CHILDREN),
    })
}

#[cfg(any(test, feature = "test-support"))]
mod fake {
    use super::{MemorySampler, PeakRss};
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// Sampler whose readings are set by the test.
    #[derive(Clone, Default)]
    pub struct FakeMemorySampler {
        inner: Arc<Mutex<PeakRss>>,
    }

    impl FakeMemorySampler {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn set(&self, self_kb: u64, children_kb: u64) {
            *self.inner.lock() = PeakRss { self_kb, children_kb };
        }

        /// Grow the adapter's own peak by `kb`.
        pub fn grow(&self, kb: u64) {
            self.inner.lock().self_kb += kb;
        }
    }

    impl MemorySampler for FakeMemorySampler {
        fn peak_rss(&self) -> PeakRss {
            *self.inner.lock()
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeMemorySampler;
