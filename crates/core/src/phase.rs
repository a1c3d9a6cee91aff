// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lifecycle phase of a stage invocation.

use std::str::FromStr;
use thiserror::Error;

/// One of the three sub-invocations of a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Produce chunk definitions from the stage arguments.
    Split,
    /// Run one chunk (or the whole stage when it does not split).
    Main,
    /// Merge chunk outputs into the stage outputs.
    Join,
}

crate::simple_display! {
    Phase {
        Split => "split",
        Main => "main",
        Join => "join",
    }
}

/// The phase argument named none of `split`, `main` or `join`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid run type {0}")]
pub struct InvalidPhase(pub String);

impl FromStr for Phase {
    type Err = InvalidPhase;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "split" => Ok(Phase::Split),
            "main" => Ok(Phase::Main),
            "join" => Ok(Phase::Join),
            other => Err(InvalidPhase(other.to_string())),
        }
    }
}
