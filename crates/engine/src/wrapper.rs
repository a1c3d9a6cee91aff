// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The stage wrapper: Initializing → Running(phase) → Completed | Failed.
//!
//! The stage runs on the calling thread under its own scoped subscriber.
//! Heartbeat, memory monitor and signal listeners run on a tokio runtime
//! owned by [`run`]. Whichever context claims the termination flag first
//! writes the terminal artifact and exits.

use crate::context::StageContext;
use crate::crash::{catch_stage_panic, Crash, PanicReport};
use crate::done::{Failure, Terminator};
use crate::env;
use crate::error::AdapterError;
use crate::logging;
use crate::monitor::{self, MemoryLimit};
use crate::profiler::{LineTargets, Profiler, StageLayer};
use crate::rusage::{MemorySampler, RusageSampler};
use crate::signals;
use crate::stage::{StageError, StageRegistry, StageResult};
use crate::termination::{ProcessExit, SystemExit};
use crate::trail::{Frame, StageTrail, STAGE_ENTRY_TARGET};
use serde_json::{json, Value};
use sr_core::{JobInfo, JobInfoError, Phase, Record};
use sr_storage::{journal_prefix, keys, MetadataStore};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;

/// The adapter's five positional arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Path or identifier of the stage logic.
    pub stage_path: String,
    /// `split`, `main` or `join`; anything else fails the job.
    pub phase: String,
    pub metadata_dir: PathBuf,
    pub files_dir: PathBuf,
    /// Journal file prefix; empty disables journaling.
    pub run_file: String,
}

/// Process-level tunables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WrapperConfig {
    pub heartbeat_interval: Duration,
    pub monitor_interval: Duration,
    pub attach_delay: Duration,
}

impl WrapperConfig {
    pub fn from_env() -> Self {
        Self {
            heartbeat_interval: env::heartbeat_interval(),
            monitor_interval: env::monitor_interval(),
            attach_delay: env::profiler_attach_delay(),
        }
    }
}

/// How the stage call ended, before it is rendered into a [`Failure`].
enum StageFailure {
    Returned(StageError, Vec<Frame>),
    Panicked(PanicReport),
}

pub struct StageWrapper {
    invocation: Invocation,
    store: Arc<MetadataStore>,
    jobinfo: Arc<JobInfo>,
    terminator: Arc<Terminator>,
    trail: StageTrail,
    sampler: Arc<dyn MemorySampler>,
    config: WrapperConfig,
}

impl StageWrapper {
    /// Augment and persist `jobinfo`, then cache the snapshot.
    ///
    /// An error here means the adapter could not start: no terminal
    /// artifact is written.
    pub fn initialize(
        invocation: Invocation,
        exit: Arc<dyn ProcessExit>,
        sampler: Arc<dyn MemorySampler>,
        config: WrapperConfig,
    ) -> Result<Self, AdapterError> {
        let prefix = journal_prefix(&invocation.run_file, &invocation.phase);
        let store = Arc::new(MetadataStore::new(
            invocation.metadata_dir.clone(),
            invocation.files_dir.clone(),
            prefix,
        ));
        let terminator = Arc::new(Terminator::new(Arc::clone(&store), exit));

        let document = augment_jobinfo(store.read_required(keys::JOBINFO)?)?;
        store.write_atomic(keys::JOBINFO, &document)?;
        let jobinfo = JobInfo::from_document(&document)?;
        tracing::debug!(
            stage = %invocation.stage_path,
            phase = %invocation.phase,
            profile_mode = %jobinfo.profile_mode,
            "initialized"
        );

        Ok(Self {
            invocation,
            store,
            jobinfo: Arc::new(jobinfo),
            terminator,
            trail: StageTrail::new(),
            sampler,
            config,
        })
    }

    pub fn store(&self) -> &Arc<MetadataStore> {
        &self.store
    }

    pub fn jobinfo(&self) -> &JobInfo {
        &self.jobinfo
    }

    pub fn terminator(&self) -> &Arc<Terminator> {
        &self.terminator
    }

    /// Start signal listeners, the heartbeat and (if enabled) the memory
    /// monitor on `handle`.
    pub fn start_background(&self, handle: &Handle) -> Result<(), AdapterError> {
        signals::install(
            handle,
            Arc::clone(&self.terminator),
            self.trail.clone(),
            self.jobinfo.stackvars,
        )
        .map_err(AdapterError::Runtime)?;

        handle.spawn(monitor::heartbeat(
            Arc::clone(&self.store),
            self.config.heartbeat_interval,
            self.terminator.background().clone(),
        ));

        let limit = MemoryLimit { limit_kb: self.jobinfo.memory_limit_kb(), mem_gb: self.jobinfo.mem_gb };
        if self.jobinfo.monitor && limit.limit_kb > 0 {
            handle.spawn(monitor::memory_monitor(
                Arc::clone(&self.terminator),
                Arc::clone(&self.sampler),
                limit,
                self.config.monitor_interval,
            ));
        } else if self.jobinfo.monitor {
            tracing::warn!(mem_gb = self.jobinfo.mem_gb, "no memory limit to monitor");
        }
        Ok(())
    }

    /// Run the phase and finish the job: Complete on success, Fail otherwise.
    pub fn run(&self, registry: &StageRegistry) {
        match self.execute(registry) {
            Ok(()) => self.terminator.complete(),
            Err(failure) => self.terminator.fail(&failure),
        }
    }

    /// Fail the job with an adapter-side error.
    pub fn fail(&self, error: &AdapterError) {
        self.terminator.fail(&configuration_failure(error));
    }

    fn execute(&self, registry: &StageRegistry) -> Result<(), Failure> {
        let phase: Phase = self.invocation.phase.parse().map_err(AdapterError::from).map_err(fail_config)?;
        let stage = registry
            .lookup(&self.invocation.stage_path)
            .ok_or_else(|| AdapterError::UnknownStage(self.invocation.stage_path.clone()))
            .map_err(fail_config)?;

        let line_targets = LineTargets::new();
        let profiler = Profiler::for_mode(
            &self.jobinfo.profile_mode,
            &line_targets,
            Arc::clone(&self.sampler),
            self.config.attach_delay,
        )
        .map_err(fail_config)?;
        let ctx = StageContext::new(Arc::clone(&self.store), Arc::clone(&self.jobinfo), line_targets);
        let schema = stage.schema();

        let args = self.read_record(keys::ARGS, schema.map(|s| s.args), true)?;
        match phase {
            Phase::Split => {
                let defs = self
                    .invoke(&profiler, phase, || stage.split(&ctx, &args))
                    .map_err(|f| self.failure(f, &[("args", args.to_string())]))?;
                self.dump_stats(&profiler)?;
                tracing::debug!(chunks = defs.chunks.len(), "split returned");
                self.store.write_atomic(keys::STAGE_DEFS, &defs).map_err(fail_config_from)?;
            }
            Phase::Main => {
                let mut outs = self.read_record(keys::OUTS, schema.map(|s| s.outs), false)?;
                let result = self.invoke(&profiler, phase, || stage.main(&ctx, &args, &mut outs));
                result.map_err(|f| {
                    self.failure(f, &[("args", args.to_string()), ("outs", outs.to_string())])
                })?;
                self.dump_stats(&profiler)?;
                self.store.write_atomic(keys::OUTS, &outs).map_err(fail_config_from)?;
            }
            Phase::Join => {
                let mut outs = self.read_record(keys::OUTS, schema.map(|s| s.outs), false)?;
                let chunk_defs = self.read_records(keys::CHUNK_DEFS)?;
                let chunk_outs = self.read_records(keys::CHUNK_OUTS)?;
                let result = self.invoke(&profiler, phase, || {
                    stage.join(&ctx, &args, &mut outs, &chunk_defs, &chunk_outs)
                });
                result.map_err(|f| {
                    self.failure(
                        f,
                        &[
                            ("args", args.to_string()),
                            ("outs", outs.to_string()),
                            ("chunk_defs", records_repr(&chunk_defs)),
                            ("chunk_outs", records_repr(&chunk_outs)),
                        ],
                    )
                })?;
                self.dump_stats(&profiler)?;
                self.store.write_atomic(keys::OUTS, &outs).map_err(fail_config_from)?;
            }
        }
        Ok(())
    }

    /// Call the stage entry point through the profiler, inside the entry span.
    fn invoke<T>(
        &self,
        profiler: &Profiler,
        phase: Phase,
        f: impl FnOnce() -> StageResult<T>,
    ) -> Result<T, StageFailure> {
        let trail = self.trail.clone();
        let layers: Vec<StageLayer> = vec![Box::new(trail.clone()), logging::stage_layer()];
        profiler.run(layers, || {
            let wrapper = tracing::info_span!("stage_wrapper", stage = %self.invocation.stage_path);
            let _wrapper = wrapper.enter();
            let caught = catch_stage_panic(&trail, || {
                let entry = match phase {
                    Phase::Split => tracing::info_span!(target: STAGE_ENTRY_TARGET, "split"),
                    Phase::Main => tracing::info_span!(target: STAGE_ENTRY_TARGET, "main"),
                    Phase::Join => tracing::info_span!(target: STAGE_ENTRY_TARGET, "join"),
                };
                entry.in_scope(f)
            });
            match caught {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(e)) => Err(StageFailure::Returned(e, trail.unwound())),
                Err(report) => Err(StageFailure::Panicked(report)),
            }
        })
    }

    fn failure(&self, failure: StageFailure, inputs: &[(&str, String)]) -> Failure {
        let crash = match failure {
            StageFailure::Returned(StageError::Assertion(message), _) => {
                tracing::info!(%message, "stage assertion");
                return Failure::Assertion(message);
            }
            StageFailure::Returned(StageError::Failed { error, frames: raised }, unwound) => {
                Crash::from_error(&error, raised.unwrap_or(unwound))
            }
            StageFailure::Panicked(report) => report.into_crash(),
        };
        tracing::info!(kind = %crash.kind, message = %crash.message, "stage failed");
        Failure::Error {
            trace: crash.trace(),
            stackvars: self.jobinfo.stackvars.then(|| crash.stackvars(inputs)),
        }
    }

    fn dump_stats(&self, profiler: &Profiler) -> Result<(), Failure> {
        profiler.dump_stats(&self.store).map_err(fail_config)
    }

    /// Decode `key` into a record, checking it against `expected` fields.
    ///
    /// `args` must be present; a missing `outs` is an empty record.
    fn read_record(
        &self,
        key: &'static str,
        expected: Option<&[&str]>,
        required: bool,
    ) -> Result<Record, Failure> {
        let document = if required {
            self.store.read_required(key).map_err(fail_config_from)?
        } else {
            self.store.read(key)
        };
        let record = Record::from_document(document).map_err(fail_config_from)?;
        match expected {
            Some(fields) => record.with_schema(fields).map_err(fail_config_from),
            None => Ok(record),
        }
    }

    fn read_records(&self, key: &'static str) -> Result<Vec<Record>, Failure> {
        let Value::Array(items) = self.store.read_required(key).map_err(fail_config_from)? else {
            return Err(fail_config(AdapterError::NotAList(key)));
        };
        items
            .into_iter()
            .map(Record::from_document)
            .collect::<Result<_, _>>()
            .map_err(fail_config_from)
    }
}

fn configuration_failure(error: &AdapterError) -> Failure {
    tracing::error!(error = %error, "configuration error");
    Failure::error(Crash::new("AdapterError", error.to_string(), Vec::new()).trace())
}

fn fail_config(error: AdapterError) -> Failure {
    configuration_failure(&error)
}

fn fail_config_from(error: impl Into<AdapterError>) -> Failure {
    fail_config(error.into())
}

fn records_repr(records: &[Record]) -> String {
    serde_json::to_string(records).unwrap_or_default()
}

/// Add runtime identity to the parent's `jobinfo` document.
fn augment_jobinfo(document: Value) -> Result<Value, AdapterError> {
    let Value::Object(mut map) = document else {
        return Err(JobInfoError::NotAnObject.into());
    };
    let cwd = std::env::current_dir().map(|p| p.display().to_string()).ok();
    let binpath = std::env::current_exe().map(|p| p.display().to_string()).ok();
    map.insert("cwd".to_string(), json!(cwd));
    map.insert("host".to_string(), json!(env::hostname()));
    map.insert("pid".to_string(), json!(std::process::id()));
    map.insert("rust".to_string(), json!({"binpath": binpath, "version": env::RUNTIME_VERSION}));
    if let Some(sge) = env::sge_info() {
        map.insert("sge".to_string(), sge);
    }
    Ok(Value::Object(map))
}

/// Run one stage invocation to completion.
///
/// Returns only when the adapter could not start; otherwise the process
/// exits from Done with status 0.
pub fn run(invocation: Invocation, registry: &StageRegistry) -> Result<(), AdapterError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .thread_name("sr-background")
        .enable_all()
        .build()
        .map_err(AdapterError::Runtime)?;

    let wrapper = StageWrapper::initialize(
        invocation,
        Arc::new(SystemExit),
        Arc::new(RusageSampler),
        WrapperConfig::from_env(),
    )?;
    match wrapper.start_background(runtime.handle()) {
        Ok(()) => wrapper.run(registry),
        Err(e) => wrapper.fail(&e),
    }
    Ok(())
}

#[cfg(test)]
#[path = "wrapper_tests.rs"]
mod tests;
