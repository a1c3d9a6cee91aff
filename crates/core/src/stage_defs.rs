// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Chunk definitions produced by a stage's split phase.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

const THREADS_KEY: &str = "__threads";
const MEM_GB_KEY: &str = "__mem_gb";
const VMEM_GB_KEY: &str = "__vmem_gb";
const SPECIAL_KEY: &str = "__special";

/// Arguments (plus optional resource requests) for one chunk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChunkDef(IndexMap<String, Value>);

impl ChunkDef {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a chunk argument.
    pub fn with_arg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    pub fn with_threads(self, threads: f64) -> Self {
        self.with_arg(THREADS_KEY, threads)
    }

    pub fn with_mem_gb(self, mem_gb: f64) -> Self {
        self.with_arg(MEM_GB_KEY, mem_gb)
    }

    pub fn with_vmem_gb(self, vmem_gb: f64) -> Self {
        self.with_arg(VMEM_GB_KEY, vmem_gb)
    }

    pub fn with_special(self, special: impl Into<String>) -> Self {
        self.with_arg(SPECIAL_KEY, special.into())
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn threads(&self) -> Option<f64> {
        self.get(THREADS_KEY).and_then(Value::as_f64)
    }

    pub fn mem_gb(&self) -> Option<f64> {
        self.get(MEM_GB_KEY).and_then(Value::as_f64)
    }

    /// Arguments without the `__`-prefixed resource keys.
    pub fn args(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().filter(|(k, _)| !k.starts_with("__")).map(|(k, v)| (k.as_str(), v))
    }
}

/// Return value of split: one entry per chunk, in order, plus join resources.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StageDefs {
    pub chunks: Vec<ChunkDef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join: Option<IndexMap<String, Value>>,
}

impl StageDefs {
    pub fn new(chunks: Vec<ChunkDef>) -> Self {
        Self { chunks, join: None }
    }

    /// Request resources for the join phase.
    pub fn with_join(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.join.get_or_insert_with(IndexMap::new).insert(key.into(), value.into());
        self
    }
}
