// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Built-in stages, resolved by the final component of the stage path.

use sr_core::{ChunkDef, Record, StageDefs};
use sr_engine::{Stage, StageContext, StageError, StageRegistry, StageResult};
use std::time::Duration;

pub fn registry() -> StageRegistry {
    StageRegistry::new()
        .register("sum_squares", SumSquares)
        .register("answer", Answer)
        .register("fail", Fail)
        .register("panic", Panic)
        .register("sleep", Sleep)
        .register("assert", Assert)
        .register("exec", Exec)
}

/// Squares each of `values` in its own chunk; join adds them up.
struct SumSquares;

#[tracing::instrument]
fn square(value: f64) -> f64 {
    value * value
}

impl Stage for SumSquares {
    fn split(&self, ctx: &StageContext, args: &Record) -> StageResult<StageDefs> {
        let values: Vec<f64> = args.get_as("values")?;
        ctx.log_info(format!("splitting {} values", values.len()));
        let chunks = values
            .into_iter()
            .map(|value| {
                ChunkDef::new().with_arg("value", value).with_threads(1.0).with_mem_gb(1.0).with_vmem_gb(2.0)
            })
            .collect();
        Ok(StageDefs::new(chunks).with_join("__mem_gb", 1.0))
    }

    fn main(&self, ctx: &StageContext, args: &Record, outs: &mut Record) -> StageResult<()> {
        let value: f64 = args.get_as("value")?;
        ctx.profile("square");
        outs.set("square", square(value))?;
        Ok(())
    }

    fn join(
        &self,
        ctx: &StageContext,
        _args: &Record,
        outs: &mut Record,
        _chunk_defs: &[Record],
        chunk_outs: &[Record],
    ) -> StageResult<()> {
        let mut sum = 0.0;
        for out in chunk_outs {
            sum += out.get_as::<f64>("square")?;
        }
        ctx.log_json("sum", &sum);
        outs.set_as("sum", &sum)?;
        Ok(())
    }
}

struct Answer;

impl Stage for Answer {
    fn main(&self, _ctx: &StageContext, _args: &Record, outs: &mut Record) -> StageResult<()> {
        outs.set("result", 42)?;
        Ok(())
    }
}

struct Fail;

#[tracing::instrument]
fn load_reads(path: &str) -> StageResult<()> {
    Err(StageError::failed("boom"))
}

impl Stage for Fail {
    fn main(&self, ctx: &StageContext, args: &Record, _outs: &mut Record) -> StageResult<()> {
        let path = args.get_as::<String>("reads").unwrap_or_else(|_| "reads.fq".to_string());
        ctx.log_warn(format!("reading {path}"));
        load_reads(&path)?;
        Ok(())
    }
}

struct Panic;

impl Stage for Panic {
    #[allow(clippy::panic)]
    fn main(&self, _ctx: &StageContext, _args: &Record, _outs: &mut Record) -> StageResult<()> {
        panic!("stage panicked");
    }
}

/// Sleeps for `seconds`, reporting progress first.
struct Sleep;

#[tracing::instrument]
fn nap(seconds: f64) {
    std::thread::sleep(Duration::from_secs_f64(seconds.max(0.0)));
}

impl Stage for Sleep {
    fn main(&self, ctx: &StageContext, args: &Record, _outs: &mut Record) -> StageResult<()> {
        let seconds: f64 = args.get_as("seconds")?;
        ctx.update_progress(format!("sleeping {seconds}s"));
        nap(seconds);
        ctx.log_time(format!("slept {seconds}s"));
        Ok(())
    }
}

struct Assert;

impl Stage for Assert {
    fn main(&self, ctx: &StageContext, args: &Record, _outs: &mut Record) -> StageResult<()> {
        let message: String = args.get_as("message")?;
        Err(ctx.exit(message))
    }
}

/// Runs `argv` to completion.
struct Exec;

impl Stage for Exec {
    fn main(&self, ctx: &StageContext, args: &Record, _outs: &mut Record) -> StageResult<()> {
        let argv: Vec<String> = args.get_as("argv")?;
        let Some((program, rest)) = argv.split_first() else {
            return Err(StageError::failed("argv is empty"));
        };
        let mut cmd = ctx.command(program);
        cmd.args(rest);
        ctx.check_call(&mut cmd)
    }
}
