// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Startup specs: what happens before stage logic runs.

use crate::prelude::*;

#[test]
fn help_shows_positional_arguments() {
    let assert = Command::new(env!("CARGO_BIN_EXE_stagerun")).arg("--help").assert().success();
    let stdout = String::from_utf8_lossy(&assert.get_output().stdout).to_string();
    assert!(stdout.contains("Usage:"), "{stdout}");
    assert!(stdout.contains("<RUN_FILE>"), "{stdout}");
}

#[test]
fn missing_arguments_are_a_usage_error() {
    Command::new(env!("CARGO_BIN_EXE_stagerun")).args(["answer", "main"]).assert().code(2);
}

#[test]
fn missing_jobinfo_cannot_start() {
    let run = Run::job(json!({}), json!({"result": null}));
    run.remove("jobinfo");
    let assert = run.stagerun("answer", "main").assert().code(1);

    let stderr = String::from_utf8_lossy(&assert.get_output().stderr).to_string();
    assert!(stderr.contains("could not start"), "{stderr}");
    assert!(!run.has("errors"));
    assert!(!run.has("complete"));
}

#[test]
fn jobinfo_is_augmented_with_runtime_identity() {
    let run = Run::job(json!({}), json!({"result": null}));
    run.stagerun("answer", "main").assert().success();

    let jobinfo = run.read("jobinfo");
    assert!(jobinfo["pid"].as_u64().unwrap() > 0);
    assert!(jobinfo["host"].is_string());
    assert!(jobinfo["cwd"].is_string());
    assert!(jobinfo["rust"]["binpath"].as_str().unwrap().ends_with("stagerun"));
    assert!(jobinfo["wallclock"]["end"].is_string());
    assert!(jobinfo["rusage"]["children"].is_object());
}

#[test]
fn grid_engine_details_recorded_under_sge() {
    let run = Run::job(json!({}), json!({"result": null}));
    run.stagerun("answer", "main")
        .env("SGE_ARCH", "lx-amd64")
        .env("JOB_ID", "4242")
        .env("QUEUE", "long.q")
        .assert()
        .success();

    let sge = &run.read("jobinfo")["sge"];
    assert_eq!(sge["jobid"], "4242");
    assert_eq!(sge["queue"], "long.q");
}

#[yare::parameterized(
    chunk = { "chunk" },
    upper = { "MAIN" },
)]
fn unknown_phase_fails_the_job(phase: &str) {
    let run = Run::job(json!({}), json!({"result": null}));
    run.stagerun("answer", phase).assert().success();

    assert!(run.text("errors").ends_with(&format!("AdapterError: Invalid run type {phase}")));
    assert!(!run.has("complete"));
}

#[test]
fn unknown_stage_fails_the_job() {
    let run = Run::job(json!({}), json!({}));
    run.stagerun("no_such_stage", "main").assert().success();

    assert!(run.text("errors").contains("no stage registered for /opt/stages/no_such_stage"));
}

#[test]
fn empty_run_file_disables_journal() {
    let run = Run::job(json!({}), json!({"result": null}));
    Command::new(env!("CARGO_BIN_EXE_stagerun"))
        .args(["answer", "main"])
        .arg(run.metadata_dir())
        .arg(run.metadata_dir())
        .arg("")
        .assert()
        .success();

    assert!(run.has("complete"));
    assert!(!run.journal("complete"));
}
