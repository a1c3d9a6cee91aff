// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Clock abstraction for testable wall-clock accounting

use std::time::{Instant, SystemTime};

/// A clock that provides both a monotonic and a wall-clock reading
pub trait Clock: Clone + Send + Sync + 'static {
    /// Monotonic time, used for durations.
    fn now(&self) -> Instant;
    /// Wall-clock time, used for timestamps written to metadata.
    fn wall(&self) -> SystemTime;
}

/// Real system clock
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn wall(&self) -> SystemTime {
        SystemTime::now()
    }
}

#[cfg(any(test, feature = "test-support"))]
mod fake {
    use super::Clock;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

    /// Fake clock for testing; both readings advance together.
    #[derive(Clone)]
    pub struct FakeClock {
        inner: Arc<Mutex<(Instant, SystemTime)>>,
    }

    impl FakeClock {
        pub fn new() -> Self {
            let wall = UNIX_EPOCH + Duration::from_secs(1_700_000_000);
            Self { inner: Arc::new(Mutex::new((Instant::now(), wall))) }
        }

        /// Advance the clock by the given duration
        pub fn advance(&self, duration: Duration) {
            let mut guard = self.inner.lock();
            guard.0 += duration;
            guard.1 += duration;
        }
    }

    impl Default for FakeClock {
        fn default() -> Self {
            Self::new()
        }
    }

    impl Clock for FakeClock {
        fn now(&self) -> Instant {
            self.inner.lock().0
        }

        fn wall(&self) -> SystemTime {
            self.inner.lock().1
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeClock;

#[cfg(test)]
#[path = "clock_tests.rs"]
mod tests;
