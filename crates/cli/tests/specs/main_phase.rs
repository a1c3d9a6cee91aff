// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Main phase specs: outputs, failures and assertions.

use crate::prelude::*;

#[test]
fn result_is_written_to_outs() {
    let run = Run::job(json!({}), json!({"result": null}));
    run.stagerun("answer", "main").assert().success();

    assert_eq!(run.read("outs"), json!({"result": 42}));
    assert!(run.has("complete"));
    assert!(!run.has("errors"));
    assert!(run.journal("outs"));
    assert!(run.journal("complete"));
}

#[test]
fn stage_error_ends_trace_with_message() {
    let run = Run::job(json!({"reads": "sample.fq"}), json!({}));
    run.stagerun("fail", "main").assert().success();

    let errors = run.text("errors");
    assert!(errors.starts_with("Stage trace (most recent call last):"), "{errors}");
    assert!(errors.contains("in load_reads"), "{errors}");
    assert!(errors.ends_with("boom"), "{errors}");
    assert!(run.text("log").contains("[warn] reading sample.fq"));
    assert!(!run.has("complete"));
    assert!(!run.has("stackvars"));
    assert!(run.journal("errors"));
}

#[test]
fn error_after_instrumented_helper_points_at_caller() {
    let run = Run::new(
        json!({"threads": 1, "memGB": 1, "stackvars_flag": true}),
        json!({"value": 5}),
        json!({}),
    );
    run.stagerun("sum_squares", "main").assert().success();

    let errors = run.text("errors");
    assert!(errors.contains("in main\nError: "), "{errors}");
    assert!(!errors.contains("in square"), "{errors}");
    assert!(!run.text("stackvars").contains("value = 5.0"));
    assert!(!run.has("complete"));
}

#[test]
fn stackvars_list_inputs_and_span_fields() {
    let run = Run::new(
        json!({"threads": 1, "memGB": 1, "stackvars_flag": "stackvars"}),
        json!({"reads": "sample.fq"}),
        json!({}),
    );
    run.stagerun("fail", "main").assert().success();

    let dump = run.text("stackvars");
    assert!(dump.contains(r#"args = {"reads":"sample.fq"}"#), "{dump}");
    assert!(dump.contains("in load_reads"), "{dump}");
    assert!(dump.contains("path = "), "{dump}");
    assert!(!dump.contains("stage_wrapper"), "{dump}");
    assert!(run.has("errors"));
}

#[test]
fn panic_is_reported_in_errors() {
    let run = Run::job(json!({}), json!({}));
    run.stagerun("panic", "main").assert().success();

    let errors = run.text("errors");
    assert!(errors.contains("Panic: stage panicked at "), "{errors}");
    assert!(!run.has("complete"));
}

#[test]
fn assertion_is_written_to_assert() {
    let run = Run::job(json!({"message": "input BAM is not indexed"}), json!({}));
    run.stagerun("assert", "main").assert().success();

    assert_eq!(run.text("assert"), "input BAM is not indexed");
    assert!(!run.has("errors"));
    assert!(!run.has("complete"));
}

#[yare::parameterized(
    succeeds = { "true", true },
    fails    = { "false", false },
)]
fn subprocess_is_logged_and_checked(program: &str, ok: bool) {
    let run = Run::job(json!({"argv": [program]}), json!({}));
    run.stagerun("exec", "main").assert().success();

    assert!(run.text("log").contains(&format!("[exec] {program}")));
    assert_eq!(run.has("complete"), ok);
    if !ok {
        assert!(run.text("errors").contains(&format!("command `{program}` failed")));
    }
}

#[test]
fn log_lines_are_timestamped() {
    let run = Run::job(json!({"values": [1, 2]}), json!({}));
    run.stagerun("sum_squares", "split").assert().success();

    let log = run.text("log");
    let line = log.lines().next().unwrap();
    // YYYY-MM-DD HH:MM:SS [info] ...
    assert_eq!(&line[4..5], "-");
    assert_eq!(&line[19..], " [info] splitting 2 values");
}
