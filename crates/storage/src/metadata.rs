// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Metadata store: the per-run directory of `_<key>` files and their journal.

use crate::json;
use crate::keys::{self, METADATA_PREFIX};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{Map, Value};
use sr_core::{format_timestamp, Clock, SystemClock};
use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

/// Errors reading or writing metadata files
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("failed to read {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("failed to decode {}: {source}", path.display())]
    Decode { path: PathBuf, source: serde_json::Error },

    #[error("failed to write {}: {source}", path.display())]
    Write { path: PathBuf, source: io::Error },

    #[error("failed to encode `{key}`: {source}")]
    Encode { key: String, source: serde_json::Error },
}

/// Read/write access to one run's metadata directory.
///
/// Shared between the stage thread and the background loops behind an `Arc`;
/// the only interior state is the set of keys already journaled.
pub struct MetadataStore<C: Clock = SystemClock> {
    metadata_dir: PathBuf,
    files_dir: PathBuf,
    journal_prefix: String,
    journaled: Mutex<HashSet<String>>,
    clock: C,
}

impl MetadataStore<SystemClock> {
    pub fn new(
        metadata_dir: impl Into<PathBuf>,
        files_dir: impl Into<PathBuf>,
        journal_prefix: impl Into<String>,
    ) -> Self {
        Self::with_clock(metadata_dir, files_dir, journal_prefix, SystemClock)
    }
}

impl<C: Clock> MetadataStore<C> {
    pub fn with_clock(
        metadata_dir: impl Into<PathBuf>,
        files_dir: impl Into<PathBuf>,
        journal_prefix: impl Into<String>,
        clock: C,
    ) -> Self {
        Self {
            metadata_dir: metadata_dir.into(),
            files_dir: files_dir.into(),
            journal_prefix: journal_prefix.into(),
            journaled: Mutex::new(HashSet::new()),
            clock,
        }
    }

    pub fn metadata_dir(&self) -> &Path {
        &self.metadata_dir
    }

    pub fn files_dir(&self) -> &Path {
        &self.files_dir
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Path of the metadata file for `key`.
    pub fn make_path(&self, key: &str) -> PathBuf {
        self.metadata_dir.join(format!("{METADATA_PREFIX}{key}"))
    }

    /// Path of a stage output file in the files directory.
    pub fn file_path(&self, name: &str) -> PathBuf {
        self.files_dir.join(name)
    }

    /// Journal file for `key`, or `None` when journaling is disabled.
    pub fn journal_path(&self, key: &str) -> Option<PathBuf> {
        if self.journal_prefix.is_empty() {
            None
        } else {
            Some(PathBuf::from(format!("{}{key}", self.journal_prefix)))
        }
    }

    pub fn exists(&self, key: &str) -> bool {
        self.make_path(key).exists()
    }

    pub fn timestamp_now(&self) -> String {
        format_timestamp(self.clock.wall())
    }

    /// Decode `key` as JSON, falling back to an empty object.
    ///
    /// Failures are reported on stderr through tracing; callers reading
    /// optional keys must accept `{}`.
    pub fn read(&self, key: &str) -> Value {
        match self.read_required(key) {
            Ok(value) => value,
            Err(e) => {
                tracing::error!(key, error = %e, "unreadable metadata, using empty document");
                Value::Object(Map::new())
            }
        }
    }

    /// Decode `key` as JSON, propagating any failure.
    pub fn read_required(&self, key: &str) -> Result<Value, MetadataError> {
        let path = self.make_path(key);
        let text = fs::read_to_string(&path)
            .map_err(|source| MetadataError::Read { path: path.clone(), source })?;
        serde_json::from_str(&text).map_err(|source| MetadataError::Decode { path, source })
    }

    /// Raw contents of `key`.
    pub fn read_to_string(&self, key: &str) -> Result<String, MetadataError> {
        let path = self.make_path(key);
        fs::read_to_string(&path).map_err(|source| MetadataError::Read { path, source })
    }

    /// Serialize `value` as indented JSON and replace `key` atomically.
    pub fn write_atomic<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
    ) -> Result<(), MetadataError> {
        let text = json::to_pretty_string(value)
            .map_err(|source| MetadataError::Encode { key: key.to_string(), source })?;
        self.write_raw_atomic(key, &text, true)
    }

    pub fn write_raw_atomic(&self, key: &str, text: &str, force: bool) -> Result<(), MetadataError> {
        self.write_bytes_atomic(key, text.as_bytes(), force)
    }

    /// Write to a temp file beside the target then rename over it, so
    /// readers see either the old or the new contents and never a prefix of
    /// either. Each write gets its own temp file.
    pub fn write_bytes_atomic(
        &self,
        key: &str,
        bytes: &[u8],
        force: bool,
    ) -> Result<(), MetadataError> {
        let path = self.make_path(key);
        let tmp_path = tmp_path_for(&path);
        fs::write(&tmp_path, bytes)
            .map_err(|source| MetadataError::Write { path: tmp_path.clone(), source })?;
        match fs::rename(&tmp_path, &path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::warn!(key, error = %e, "ignoring error moving temp file");
            }
            Err(source) => return Err(MetadataError::Write { path, source }),
        }
        self.update_journal(key, force)
    }

    /// Plain truncating write, for keys the parent never reads while open.
    pub fn write_raw(&self, key: &str, text: &str, force: bool) -> Result<(), MetadataError> {
        let path = self.make_path(key);
        fs::write(&path, text).map_err(|source| MetadataError::Write { path, source })?;
        self.update_journal(key, force)
    }

    /// Write the current timestamp to `key`.
    pub fn write_time(&self, key: &str) -> Result<(), MetadataError> {
        let now = self.timestamp_now();
        self.write_raw(key, &now, false)
    }

    /// Append one line to `key` (open, append, close).
    pub fn append(&self, key: &str, line: &str) -> Result<(), MetadataError> {
        let path = self.make_path(key);
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .and_then(|mut file| writeln!(file, "{line}"))
            .map_err(|source| MetadataError::Write { path, source })?;
        self.update_journal(key, false)
    }

    /// Touch the journal entry for `key`.
    ///
    /// Without `force`, each key is journaled at most once per run. A missing
    /// journal directory means the parent already tore the run down and is
    /// only logged.
    pub fn update_journal(&self, key: &str, force: bool) -> Result<(), MetadataError> {
        let Some(journal) = self.journal_path(key) else {
            return Ok(());
        };
        let first = self.journaled.lock().insert(key.to_string());
        if !force && !first {
            return Ok(());
        }

        let tmp_path = tmp_path_for(&journal);
        let result = fs::write(&tmp_path, self.timestamp_now())
            .map_err(|source| MetadataError::Write { path: tmp_path.clone(), source })
            .and_then(|()| {
                fs::rename(&tmp_path, &journal)
                    .map_err(|source| MetadataError::Write { path: journal.clone(), source })
            });
        match result {
            Ok(()) => {}
            Err(MetadataError::Write { ref path, ref source })
                if source.kind() == io::ErrorKind::NotFound =>
            {
                tracing::warn!(key, path = %path.display(), error = %source, "journal directory is gone");
            }
            Err(e) => {
                if first {
                    self.journaled.lock().remove(key);
                }
                return Err(e);
            }
        }
        Ok(())
    }

    /// Append a `<timestamp> [<level>] <message>` line to the log.
    pub fn log(&self, level: &str, message: &str) -> Result<(), MetadataError> {
        let line = format!("{} [{level}] {message}", self.timestamp_now());
        self.append(keys::LOG, &line)
    }

    pub fn alarm(&self, message: &str) -> Result<(), MetadataError> {
        self.append(keys::ALARM, message)
    }

    /// Replace the progress message, journaling every update.
    pub fn progress(&self, message: &str) -> Result<(), MetadataError> {
        self.write_raw_atomic(keys::PROGRESS, message, true)
    }

    pub fn write_errors(&self, message: &str) -> Result<(), MetadataError> {
        self.write_raw_atomic(keys::ERRORS, message, true)
    }

    pub fn write_assert(&self, message: &str) -> Result<(), MetadataError> {
        self.write_raw_atomic(keys::ASSERT, message, true)
    }
}

static TMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// `<path>.<pid>.<seq>.tmp`, unique per write within this process.
fn tmp_path_for(path: &Path) -> PathBuf {
    let seq = TMP_SEQ.fetch_add(1, Ordering::Relaxed);
    let mut name = path.as_os_str().to_owned();
    name.push(format!(".{}.{seq}.tmp", std::process::id()));
    PathBuf::from(name)
}

#[cfg(test)]
#[path = "metadata_tests.rs"]
mod tests;
