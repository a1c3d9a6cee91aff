// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Asynchronous termination specs: signals, the memory monitor, heartbeats.

use crate::prelude::*;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;

fn sleeping(jobinfo: Value, seconds: f64) -> Run {
    Run::new(jobinfo, json!({"seconds": seconds}), json!({}))
}

fn basic_jobinfo() -> Value {
    json!({"threads": 1, "memGB": 1})
}

#[yare::parameterized(
    term = { Signal::SIGTERM, "caught signal 15 (SIGTERM)" },
    int  = { Signal::SIGINT, "caught signal 2 (SIGINT)" },
    hup  = { Signal::SIGHUP, "caught signal 1 (SIGHUP)" },
    usr2 = { Signal::SIGUSR2, "caught signal 12 (SIGUSR2)" },
)]
fn fatal_signal_becomes_errors(signal: Signal, expected: &str) {
    let run = sleeping(basic_jobinfo(), 30.0);
    let mut child = run.spawn("sleep", "main", &[]);
    assert!(wait_for(SPEC_WAIT_MAX_MS, || run.has("progress")), "stage never started");

    kill(Pid::from_raw(child.id() as i32), signal).unwrap();
    let status = wait_exit(&mut child);

    assert_eq!(status.code(), Some(0));
    let errors = run.text("errors");
    assert!(errors.ends_with(&format!("Signal: {expected}")), "{errors}");
    assert!(errors.contains("in nap"), "{errors}");
    assert!(!run.has("complete"));
    assert!(run.read("jobinfo")["wallclock"]["duration_seconds"].is_number());
}

#[test]
fn signal_with_stackvars_dumps_live_spans() {
    let run = sleeping(json!({"threads": 1, "memGB": 1, "stackvars_flag": true}), 30.0);
    let mut child = run.spawn("sleep", "main", &[]);
    assert!(wait_for(SPEC_WAIT_MAX_MS, || run.has("progress")), "stage never started");

    kill(Pid::from_raw(child.id() as i32), Signal::SIGTERM).unwrap();
    wait_exit(&mut child);

    let dump = run.text("stackvars");
    assert!(dump.contains("in nap"), "{dump}");
    assert!(dump.contains("seconds = 30"), "{dump}");
    assert!(!dump.contains("stage_wrapper"), "{dump}");
}

#[test]
fn memory_ceiling_fails_running_stage() {
    let run = sleeping(json!({"threads": 1, "memGB": 0.001, "monitor_flag": "monitor"}), 30.0);
    let mut child = run.spawn("sleep", "main", &[("SR_MONITOR_INTERVAL_MS", "20")]);
    let status = wait_exit(&mut child);

    assert_eq!(status.code(), Some(0));
    let errors = run.text("errors");
    assert!(errors.contains("exceeds the 1049 KB limit (0.001 GB requested)"), "{errors}");
    assert!(errors.contains("MemoryLimitExceeded: "), "{errors}");
    assert!(!run.has("complete"));
}

#[test]
fn monitor_off_by_default() {
    let run = sleeping(json!({"threads": 1, "memGB": 0.001}), 0.2);
    let mut child = run.spawn("sleep", "main", &[("SR_MONITOR_INTERVAL_MS", "20")]);
    let status = wait_exit(&mut child);

    assert_eq!(status.code(), Some(0));
    assert!(run.has("complete"));
    assert!(!run.has("errors"));
}

#[test]
fn heartbeat_journal_is_touched_while_running() {
    let run = sleeping(basic_jobinfo(), 0.5);
    let mut child = run.spawn("sleep", "main", &[("SR_HEARTBEAT_INTERVAL_MS", "20")]);
    assert!(wait_for(SPEC_WAIT_MAX_MS, || run.journal("heartbeat")), "no heartbeat");
    wait_exit(&mut child);

    assert!(run.has("complete"));
    assert!(run.journal("progress"));
    assert!(run.text("log").contains("[time] slept 0.5s"));
}
