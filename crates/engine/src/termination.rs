// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Exactly-once termination.
//!
//! The stage thread, the memory monitor and the signal listener can all decide
//! the job is over. Each must [`TerminationFlag::claim`] first; only the
//! holder of the resulting [`TerminationClaim`] writes a terminal artifact and
//! runs Done. Everyone else gives up its thread via [`ProcessExit::abandon`].

use std::sync::atomic::{AtomicBool, Ordering};

/// Process-wide "terminal transition started" flag.
#[derive(Debug, Default)]
pub struct TerminationFlag(AtomicBool);

/// Proof that the caller won the flag. Not `Clone`: there is only one.
#[derive(Debug)]
pub struct TerminationClaim(());

impl TerminationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Test-and-set. Returns the claim to the first caller only.
    pub fn claim(&self) -> Option<TerminationClaim> {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| TerminationClaim(()))
    }
}

/// How the process leaves.
pub trait ProcessExit: Send + Sync + 'static {
    /// End the process with `code`.
    fn exit(&self, code: i32);

    /// Called by a context that lost the claim: block until the winner exits.
    fn abandon(&self) {
        loop {
            std::thread::park();
        }
    }
}

/// Real process exit.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemExit;

impl ProcessExit for SystemExit {
    fn exit(&self, code: i32) {
        std::process::exit(code)
    }
}

#[cfg(any(test, feature = "test-support"))]
mod recording {
    use super::ProcessExit;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Records exits instead of performing them.
    #[derive(Debug, Default)]
    pub struct RecordingExit {
        codes: Mutex<Vec<i32>>,
        abandoned: AtomicUsize,
    }

    impl RecordingExit {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn codes(&self) -> Vec<i32> {
            self.codes.lock().clone()
        }

        pub fn abandoned(&self) -> usize {
            self.abandoned.load(Ordering::SeqCst)
        }
    }

    impl ProcessExit for RecordingExit {
        fn exit(&self, code: i32) {
            self.codes.lock().push(code);
        }

        fn abandon(&self) {
            self.abandoned.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use recording::RecordingExit;
