// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Logical metadata keys.

/// Prefix of every metadata file name.
pub const METADATA_PREFIX: &str = "_";

pub const ARGS: &str = "args";
pub const OUTS: &str = "outs";
pub const JOBINFO: &str = "jobinfo";
pub const STAGE_DEFS: &str = "stage_defs";
pub const CHUNK_DEFS: &str = "chunk_defs";
pub const CHUNK_OUTS: &str = "chunk_outs";

pub const LOG: &str = "log";
pub const ALARM: &str = "alarm";
pub const PROGRESS: &str = "progress";
pub const HEARTBEAT: &str = "heartbeat";

pub const ERRORS: &str = "errors";
pub const STACKVARS: &str = "stackvars";
pub const ASSERT: &str = "assert";
pub const COMPLETE: &str = "complete";

pub const PROFILE_CPU_BIN: &str = "profile_cpu_bin";
pub const PROFILE_CPU_TXT: &str = "profile_cpu_txt";
pub const PROFILE_LINE_BIN: &str = "profile_line_bin";
pub const PROFILE_LINE_TXT: &str = "profile_line_txt";
pub const PROFILE_MEM_TXT: &str = "profile_mem_txt";
