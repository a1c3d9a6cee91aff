// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fatal signal translation.
//!
//! The OS-level handler is tokio's: it only writes to a self-pipe. A listener
//! task per signal claims the termination flag and hands the translation to
//! a blocking worker. A signal arriving after the flag is set restores the
//! default disposition and re-raises, so a second delivery kills the process.

use crate::crash::Crash;
use crate::done::{Failure, Terminator};
use crate::termination::TerminationClaim;
use crate::trail::StageTrail;
use nix::sys::signal::{self as nix_signal, SigHandler, Signal};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::signal::unix::{signal, SignalKind};

/// Signals translated into an `errors` artifact.
pub const FATAL_SIGNALS: [Signal; 6] = [
    Signal::SIGABRT,
    Signal::SIGINT,
    Signal::SIGHUP,
    Signal::SIGTERM,
    Signal::SIGUSR1,
    Signal::SIGUSR2,
];

/// What a delivery should do, decided by the termination flag.
#[derive(Debug)]
pub enum SignalAction {
    Translate(TerminationClaim),
    RestoreDefault,
}

pub fn on_signal(terminator: &Terminator) -> SignalAction {
    match terminator.claim() {
        Some(claim) => SignalAction::Translate(claim),
        None => SignalAction::RestoreDefault,
    }
}

/// The crash reported for `signal`, with the stage thread's live spans.
pub fn signal_crash(signal: Signal, trail: &StageTrail) -> Crash {
    let message = format!("caught signal {} ({})", signal as i32, signal.as_str());
    Crash::new("Signal", message, trail.live())
}

/// Write `errors` (and `stackvars` when enabled) for `signal`, then Done.
pub fn translate(
    terminator: &Terminator,
    claim: TerminationClaim,
    signal: Signal,
    trail: &StageTrail,
    stackvars: bool,
) {
    tracing::warn!(signal = signal.as_str(), "translating fatal signal");
    let crash = signal_crash(signal, trail);
    let failure = Failure::Error {
        trace: crash.trace(),
        stackvars: stackvars.then(|| crash.stackvars(&[])),
    };
    terminator.fail_claimed(claim, &failure);
}

/// Fall back to the default disposition for `signal` and deliver it again.
#[allow(unsafe_code)]
pub fn restore_default_and_raise(signal: Signal) -> nix::Result<()> {
    // SAFETY: SIG_DFL installs no handler code, so there is nothing that
    // could run in signal context.
    unsafe {
        nix_signal::signal(signal, SigHandler::SigDfl)?;
    }
    nix_signal::raise(signal)
}

/// Register listeners for every fatal signal on `handle`.
pub fn install(
    handle: &Handle,
    terminator: Arc<Terminator>,
    trail: StageTrail,
    stackvars: bool,
) -> std::io::Result<()> {
    let _guard = handle.enter();
    for sig in FATAL_SIGNALS {
        let mut stream = signal(SignalKind::from_raw(sig as i32))?;
        let terminator = Arc::clone(&terminator);
        let trail = trail.clone();
        handle.spawn(async move {
            while stream.recv().await.is_some() {
                match on_signal(&terminator) {
                    SignalAction::Translate(claim) => {
                        let terminator = Arc::clone(&terminator);
                        let trail = trail.clone();
                        tokio::task::spawn_blocking(move || {
                            translate(&terminator, claim, sig, &trail, stackvars)
                        });
                    }
                    SignalAction::RestoreDefault => {
                        tracing::debug!(signal = sig.as_str(), "already terminating, re-raising");
                        if let Err(e) = restore_default_and_raise(sig) {
                            tracing::error!(signal = sig.as_str(), error = %e, "failed to re-raise signal");
                        }
                    }
                }
            }
        });
    }
    tracing::debug!("signal listeners installed");
    Ok(())
}

#[cfg(test)]
#[path = "signals_tests.rs"]
mod tests;
