// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Split and join specs for the chunked `sum_squares` stage.

use crate::prelude::*;

#[yare::parameterized(
    single = { vec![4.0] },
    three  = { vec![3.0, 1.0, 2.0] },
    ten    = { (0..10).map(f64::from).collect() },
)]
fn split_returns_one_chunk_per_value(values: Vec<f64>) {
    let run = Run::job(json!({"values": values}), json!({"sum": null}));
    run.stagerun("sum_squares", "split").assert().success();

    let defs = run.read("stage_defs");
    let chunks = defs["chunks"].as_array().unwrap();
    assert_eq!(chunks.len(), values.len());
    for (chunk, value) in chunks.iter().zip(&values) {
        assert_eq!(chunk["value"], *value);
        assert_eq!(chunk["__threads"], 1.0);
        assert_eq!(chunk["__vmem_gb"], 2.0);
    }
    assert_eq!(defs["join"]["__mem_gb"], 1.0);
    assert_eq!(run.read("outs"), json!({"sum": null}));
    assert!(run.has("complete"));
    assert!(run.journal("split_stage_defs"));
    assert!(run.journal("split_complete"));
}

#[test]
fn chunk_main_squares_its_value() {
    let run = Run::job(json!({"values": [3.0], "value": 3.0}), json!({"square": null}));
    run.stagerun("sum_squares", "main").assert().success();

    assert_eq!(run.read("outs"), json!({"square": 9.0}));
}

#[test]
fn join_sums_chunk_outputs() {
    let run = Run::job(json!({"values": [1.0, 2.0, 3.0]}), json!({"sum": null}));
    run.seed("chunk_defs", json!([{"value": 1.0}, {"value": 2.0}, {"value": 3.0}]));
    run.seed("chunk_outs", json!([{"square": 1.0}, {"square": 4.0}, {"square": 9.0}]));
    run.stagerun("sum_squares", "join").assert().success();

    assert_eq!(run.read("outs"), json!({"sum": 14.0}));
    assert!(run.has("complete"));
    assert!(run.journal("join_outs"));
    assert!(run.text("log").contains(r#"[json] {"label":"sum","object":14.0}"#));
}

#[test]
fn join_rejects_chunk_outs_that_are_not_a_list() {
    let run = Run::job(json!({}), json!({"sum": null}));
    run.seed("chunk_defs", json!([]));
    run.seed("chunk_outs", json!({"square": 1.0}));
    run.stagerun("sum_squares", "join").assert().success();

    assert!(run.text("errors").ends_with("AdapterError: `chunk_outs` is not a JSON list"));
}
