// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Profiler specs: each mode leaves its artifacts after a successful run.

use crate::prelude::*;

fn profiled(mode: &str) -> Run {
    Run::new(
        json!({"threads": 1, "memGB": 1, "profile_mode": mode}),
        json!({"value": 5.0}),
        json!({"square": null}),
    )
}

#[test]
fn cpu_profile_has_table_and_binary() {
    let run = profiled("cpu");
    run.stagerun("sum_squares", "main").assert().success();

    assert_eq!(run.read("outs"), json!({"square": 25.0}));
    let table = run.text("profile_cpu_txt");
    assert!(table.contains("Ordered by: cumulative time"), "{table}");
    assert!(table.contains("(square)"), "{table}");
    assert!(run.has("profile_cpu_bin"));
    assert!(run.journal("profile_cpu_txt"));
}

#[test]
fn line_profile_covers_registered_span() {
    let run = profiled("line");
    run.stagerun("sum_squares", "main").assert().success();

    let report = run.text("profile_line_txt");
    assert!(report.starts_with("Timer unit: 1e-06 s"), "{report}");
    assert!(report.contains("square"), "{report}");
    assert!(run.has("profile_line_bin"));
}

#[test]
fn mem_profile_is_text_only() {
    let run = profiled("mem");
    run.stagerun("sum_squares", "main").assert().success();

    let table = run.text("profile_mem_txt");
    assert!(table.starts_with("ncalls    maxrss(kb)"), "{table}");
    assert!(!run.has("profile_mem_bin"));
}

#[test]
fn external_profiler_only_delays_the_stage() {
    let run = profiled("perf");
    run.stagerun("sum_squares", "main").env("SR_PROFILER_ATTACH_DELAY_MS", "10").assert().success();

    assert_eq!(run.read("outs"), json!({"square": 25.0}));
    assert!(!run.has("profile_cpu_txt"));
}

#[test]
fn failed_stage_writes_no_profile() {
    let run = Run::new(
        json!({"threads": 1, "memGB": 1, "profile_mode": "cpu"}),
        json!({}),
        json!({}),
    );
    run.stagerun("fail", "main").assert().success();

    assert!(run.has("errors"));
    assert!(!run.has("profile_cpu_txt"));
}
