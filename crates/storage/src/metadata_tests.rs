// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::journal_prefix;
use serde_json::json;
use sr_core::FakeClock;
use std::time::Duration;
use tempfile::TempDir;

struct Fixture {
    dir: TempDir,
    clock: FakeClock,
    store: MetadataStore<FakeClock>,
}

fn fixture(phase: &str) -> Fixture {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("files")).unwrap();
    fs::create_dir_all(dir.path().join("journal")).unwrap();
    let run_file = dir.path().join("journal").join("ID.pipe.STAGE.fork0.chnk0");
    let clock = FakeClock::new();
    let store = MetadataStore::with_clock(
        dir.path(),
        dir.path().join("files"),
        journal_prefix(&run_file.to_string_lossy(), phase),
        clock.clone(),
    );
    Fixture { dir, clock, store }
}

impl Fixture {
    fn journal(&self, name: &str) -> PathBuf {
        self.dir.path().join("journal").join(format!("ID.pipe.STAGE.fork0.chnk0.{name}"))
    }
}

fn leftover_tmp(dir: &Path) -> Vec<PathBuf> {
    fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "tmp"))
        .collect()
}

#[test]
fn keys_are_prefixed_with_underscore() {
    let f = fixture("main");
    assert_eq!(f.store.make_path("outs"), f.dir.path().join("_outs"));
    assert_eq!(f.store.file_path("out.bam"), f.dir.path().join("files").join("out.bam"));
}

#[test]
fn write_atomic_writes_indented_json_and_journals() {
    let f = fixture("main");
    f.store.write_atomic("outs", &json!({"result": 42})).unwrap();

    let text = fs::read_to_string(f.dir.path().join("_outs")).unwrap();
    assert_eq!(text, "{\n    \"result\": 42\n}");
    assert!(f.journal("outs").exists());
    assert!(leftover_tmp(f.dir.path()).is_empty());
}

#[test]
fn non_main_phase_journal_carries_phase_tag() {
    let f = fixture("split");
    f.store.write_atomic("stage_defs", &json!({"chunks": []})).unwrap();
    assert!(f.journal("split_stage_defs").exists());
    assert!(!f.journal("stage_defs").exists());
}

#[test]
fn interrupted_write_leaves_previous_contents() {
    let f = fixture("main");
    f.store.write_atomic("outs", &json!({"result": 1})).unwrap();

    // A writer killed before its rename leaves only a partial temp file.
    fs::write(f.dir.path().join("_outs.tmp"), b"{\n    \"resu").unwrap();
    assert_eq!(f.store.read_required("outs").unwrap(), json!({"result": 1}));

    f.store.write_atomic("outs", &json!({"result": 2})).unwrap();
    assert_eq!(f.store.read_required("outs").unwrap(), json!({"result": 2}));
}

#[test]
fn journal_without_force_is_written_once() {
    let f = fixture("main");
    f.store.update_journal("log", false).unwrap();
    assert!(f.journal("log").exists());

    fs::remove_file(f.journal("log")).unwrap();
    f.store.update_journal("log", false).unwrap();
    assert!(!f.journal("log").exists());
}

#[test]
fn concurrent_journal_of_one_key_is_claimed_once() {
    let f = fixture("main");
    let barrier = std::sync::Barrier::new(8);
    std::thread::scope(|scope| {
        for _ in 0..8 {
            scope.spawn(|| {
                barrier.wait();
                f.store.update_journal("log", false).unwrap();
            });
        }
    });
    assert!(f.journal("log").exists());
    assert_eq!(f.store.journaled.lock().len(), 1);
    assert!(leftover_tmp(&f.dir.path().join("journal")).is_empty());
}

#[test]
fn failed_journal_write_is_retried() {
    let f = fixture("main");
    fs::create_dir(f.journal("log")).unwrap();
    assert!(f.store.update_journal("log", false).is_err());

    fs::remove_dir(f.journal("log")).unwrap();
    f.store.update_journal("log", false).unwrap();
    assert!(f.journal("log").is_file());
}

#[test]
fn concurrent_writers_of_one_key_never_tear() {
    let f = fixture("main");
    std::thread::scope(|scope| {
        for writer in 0..4u64 {
            let store = &f.store;
            scope.spawn(move || {
                for round in 0..25u64 {
                    let payload = vec![writer * 100 + round; 512];
                    store.write_atomic("progress", &json!({"payload": payload})).unwrap();
                    let value = store.read_required("progress").unwrap();
                    assert_eq!(value["payload"].as_array().unwrap().len(), 512);
                }
            });
        }
    });
    assert!(leftover_tmp(f.dir.path()).is_empty());
}

#[test]
fn forced_journal_is_written_every_time() {
    let f = fixture("main");
    for _ in 0..3 {
        f.store.update_journal("heartbeat", true).unwrap();
        assert!(f.journal("heartbeat").exists());
        fs::remove_file(f.journal("heartbeat")).unwrap();
    }
}

#[test]
fn journal_content_is_the_current_timestamp() {
    let f = fixture("main");
    f.clock.advance(Duration::from_secs(90));
    f.store.update_journal("heartbeat", true).unwrap();
    let text = fs::read_to_string(f.journal("heartbeat")).unwrap();
    assert_eq!(text, format_timestamp(f.clock.wall()));
}

#[test]
fn vanished_journal_directory_is_not_fatal() {
    let f = fixture("main");
    fs::remove_dir_all(f.dir.path().join("journal")).unwrap();
    f.store.update_journal("heartbeat", true).unwrap();
    f.store.write_atomic("outs", &json!({})).unwrap();
}

#[test]
fn empty_prefix_disables_journal() {
    let dir = TempDir::new().unwrap();
    let store = MetadataStore::new(dir.path(), dir.path(), "");
    assert!(store.journal_path("outs").is_none());
    store.update_journal("outs", true).unwrap();
}

#[test]
fn read_tolerates_garbage() {
    let f = fixture("main");
    fs::write(f.dir.path().join("_chunk_outs"), "not json").unwrap();
    assert_eq!(f.store.read("chunk_outs"), json!({}));
    assert!(matches!(
        f.store.read_required("chunk_outs"),
        Err(MetadataError::Decode { .. })
    ));
}

#[test]
fn read_tolerates_missing_key() {
    let f = fixture("main");
    assert_eq!(f.store.read("jobinfo"), json!({}));
    assert!(matches!(f.store.read_required("args"), Err(MetadataError::Read { .. })));
}

#[test]
fn log_lines_are_timestamped_and_appended() {
    let f = fixture("main");
    f.store.log("info", "first").unwrap();
    f.store.log("warn", "second").unwrap();

    let ts = format_timestamp(f.clock.wall());
    let text = f.store.read_to_string("log").unwrap();
    assert_eq!(text, format!("{ts} [info] first\n{ts} [warn] second\n"));
    assert!(f.journal("log").exists());
}

#[test]
fn alarm_appends() {
    let f = fixture("main");
    f.store.alarm("low coverage").unwrap();
    f.store.alarm("low yield").unwrap();
    assert_eq!(f.store.read_to_string("alarm").unwrap(), "low coverage\nlow yield\n");
}

#[test]
fn progress_renotifies_identical_values() {
    let f = fixture("main");
    f.store.progress("50%").unwrap();
    fs::remove_file(f.journal("progress")).unwrap();
    f.store.progress("50%").unwrap();
    assert!(f.journal("progress").exists());
    assert_eq!(f.store.read_to_string("progress").unwrap(), "50%");
}

#[test]
fn write_time_uses_fixed_format() {
    let f = fixture("main");
    f.store.write_time("complete").unwrap();
    assert_eq!(f.store.read_to_string("complete").unwrap(), format_timestamp(f.clock.wall()));
}

#[test]
fn errors_and_assert_are_separate_keys() {
    let f = fixture("main");
    f.store.write_errors("boom").unwrap();
    f.store.write_assert("bad input").unwrap();
    assert_eq!(f.store.read_to_string("errors").unwrap(), "boom");
    assert_eq!(f.store.read_to_string("assert").unwrap(), "bad input");
}

#[test]
fn missing_metadata_directory_is_a_write_error() {
    let dir = TempDir::new().unwrap();
    let store = MetadataStore::new(dir.path().join("gone"), dir.path(), "");
    let err = store.write_atomic("outs", &json!({})).unwrap_err();
    assert!(matches!(err, MetadataError::Write { .. }));
}
