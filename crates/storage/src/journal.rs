// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Journal file naming.

/// Prefix for this run's journal files.
///
/// The main phase uses `<run_file>.`; every other phase adds its own tag,
/// `<run_file>.<phase>_`, so split and join notifications never collide with
/// the chunk's. The phase is taken verbatim so that even an unrecognized phase
/// can report its failure. An empty run file disables journaling.
pub fn journal_prefix(run_file: &str, phase: &str) -> String {
    if run_file.is_empty() {
        String::new()
    } else if phase == "main" {
        format!("{run_file}.")
    } else {
        format!("{run_file}.{phase}_")
    }
}
