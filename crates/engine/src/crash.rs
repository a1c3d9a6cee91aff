// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Failure reports: the `errors` trace, the `stackvars` dump and panic capture.

use crate::trail::{Frame, StageTrail};
use parking_lot::Mutex;
use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::RefCell;
use std::fmt::Write as _;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Once};

const TRACE_HEADER: &str = "Stage trace (most recent call last):";
const STACKVARS_HEADER: &str = "Stage trace with variables (most recent call last):";
const VAR_INDENT: &str = "        ";

/// What went wrong, independent of how it is rendered.
#[derive(Debug, Clone)]
pub struct Crash {
    /// `Error`, `Panic`, `Signal`, ...
    pub kind: String,
    pub message: String,
    /// Underlying causes, outermost first.
    pub causes: Vec<String>,
    /// Frames at the point of failure, outermost first.
    pub frames: Vec<Frame>,
    pub backtrace: Option<String>,
}

impl Crash {
    pub fn new(kind: impl Into<String>, message: impl Into<String>, frames: Vec<Frame>) -> Self {
        Self { kind: kind.into(), message: message.into(), causes: Vec::new(), frames, backtrace: None }
    }

    pub fn from_error(error: &anyhow::Error, frames: Vec<Frame>) -> Self {
        let mut crash = Self::new("Error", error.to_string(), frames);
        crash.causes = error.chain().skip(1).map(ToString::to_string).collect();
        crash
    }

    /// Render the `errors` artifact: every frame, then the causes, ending
    /// with `<kind>: <message>`.
    pub fn trace(&self) -> String {
        let mut out = String::from(TRACE_HEADER);
        for frame in &self.frames {
            let _ = write!(out, "\n{frame}");
        }
        for cause in self.causes.iter().rev() {
            let _ = write!(out, "\nCaused by: {cause}");
        }
        let _ = write!(out, "\n{}: {}", self.kind, self.message);
        out
    }

    /// Render the `stackvars` artifact.
    ///
    /// Only frames from the stage entry span inward are included. `inputs`
    /// are listed under the entry frame.
    pub fn stackvars(&self, inputs: &[(&str, String)]) -> String {
        let mut out = String::from(STACKVARS_HEADER);
        let start = self.frames.iter().position(|f| f.entry).unwrap_or(self.frames.len());
        for (i, frame) in self.frames[start..].iter().enumerate() {
            let _ = write!(out, "\n{frame}");
            if i == 0 {
                for (name, value) in inputs {
                    let _ = write!(out, "\n{VAR_INDENT}{name} = {value}");
                }
            }
            for (name, value) in frame.fields.iter() {
                let _ = write!(out, "\n{VAR_INDENT}{name} = {value}");
            }
        }
        let _ = write!(out, "\n{}: {}", self.kind, self.message);
        if let Some(bt) = &self.backtrace {
            let _ = write!(out, "\n\n{bt}");
        }
        out
    }
}

/// Panic recorded by the hook while the stage thread was capturing.
#[derive(Debug, Clone)]
pub struct PanicReport {
    pub message: String,
    pub location: Option<String>,
    pub backtrace: String,
    pub frames: Vec<Frame>,
}

impl PanicReport {
    pub fn into_crash(self) -> Crash {
        let message = match &self.location {
            Some(location) => format!("{} at {location}", self.message),
            None => self.message,
        };
        let mut crash = Crash::new("Panic", message, self.frames);
        crash.backtrace = Some(self.backtrace);
        crash
    }
}

type Slot = Arc<Mutex<Option<PanicReport>>>;

thread_local! {
    static CAPTURE: RefCell<Option<(StageTrail, Slot)>> = const { RefCell::new(None) };
}

static HOOK: Once = Once::new();

/// Chain a hook that records panics on capturing threads and defers to the
/// previous hook everywhere else.
fn install_hook() {
    HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            let captured = CAPTURE.with(|capture| {
                let capture = capture.borrow();
                let Some((trail, slot)) = capture.as_ref() else {
                    return false;
                };
                *slot.lock() = Some(PanicReport {
                    message: payload_message(info.payload()),
                    location: info.location().map(|l| format!("{}:{}", l.file(), l.line())),
                    backtrace: Backtrace::force_capture().to_string(),
                    frames: trail.live(),
                });
                true
            });
            if !captured {
                previous(info);
            }
        }));
    });
}

fn payload_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Box<dyn Any>".to_string()
    }
}

/// Live span stack of the stage thread, if this is the stage thread.
pub(crate) fn stage_frames() -> Option<Vec<Frame>> {
    CAPTURE.with(|capture| capture.borrow().as_ref().map(|(trail, _)| trail.live()))
}

/// Run `f`, converting a panic into a [`PanicReport`] with the span stack
/// as it was when the panic started.
pub fn catch_stage_panic<T>(trail: &StageTrail, f: impl FnOnce() -> T) -> Result<T, PanicReport> {
    install_hook();
    let slot: Slot = Arc::default();
    CAPTURE.with(|c| *c.borrow_mut() = Some((trail.clone(), Arc::clone(&slot))));
    let result = panic::catch_unwind(AssertUnwindSafe(f));
    CAPTURE.with(|c| *c.borrow_mut() = None);

    result.map_err(|payload| {
        slot.lock().take().unwrap_or_else(|| PanicReport {
            message: payload_message(payload.as_ref()),
            location: None,
            backtrace: String::new(),
            frames: trail.unwound(),
        })
    })
}

#[cfg(test)]
#[path = "crash_tests.rs"]
mod tests;
