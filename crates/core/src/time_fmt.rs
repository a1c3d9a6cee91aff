// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Timestamp formatting shared by log lines, journal entries and jobinfo.

use chrono::{DateTime, Local};
use std::time::SystemTime;

/// Format used for every timestamp the adapter writes.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Format a wall-clock time in local time, e.g. `2026-01-30 08:14:09`.
pub fn format_timestamp(time: SystemTime) -> String {
    DateTime::<Local>::from(time).format(TIMESTAMP_FORMAT).to_string()
}
