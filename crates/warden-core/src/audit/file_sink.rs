// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Append-only JSON-lines audit file.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::AuditSink;
use super::types::{AuditEntry, AuditFilter};
use crate::error::{AuditError, AuditResult};

/// File name of the audit trail inside the data directory.
pub const AUDIT_FILE: &str = "audit.jsonl";

/// Writes one JSON document per line to an append-only file.
pub struct FileAuditSink {
    path: PathBuf,
    writer: Mutex<Option<BufWriter<File>>>,
    written: AtomicU64,
}

impl FileAuditSink {
    /// Opens `path` for appending, creating it and its directory if needed.
    pub fn open(path: impl AsRef<Path>) -> AuditResult<Self> {
        let path = path.as_ref().to_path_buf();
        let io_err = |source: std::io::Error| AuditError::Io {
            path: path.clone(),
            source,
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(io_err)?;

        tracing::debug!(path = %path.display(), "Opened audit file");
        Ok(Self {
            path,
            writer: Mutex::new(Some(BufWriter::new(file))),
            written: AtomicU64::new(0),
        })
    }

    /// Returns the file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns how many entries this sink has written.
    pub fn entries_written(&self) -> u64 {
        self.written.load(Ordering::Relaxed)
    }

    /// Flushes and closes the file. Later writes fail with [`AuditError::Closed`].
    pub fn close(&self) -> AuditResult<()> {
        match self.writer.lock().take() {
            Some(mut writer) => writer.flush().map_err(|source| self.io_error(source)),
            None => Ok(()),
        }
    }

    fn io_error(&self, source: std::io::Error) -> AuditError {
        AuditError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

#[async_trait]
impl AuditSink for FileAuditSink {
    async fn record(&self, entry: AuditEntry) -> AuditResult<()> {
        let line = serde_json::to_string(&entry).map_err(|e| AuditError::Serialization(e.to_string()))?;

        let mut guard = self.writer.lock();
        let writer = guard.as_mut().ok_or(AuditError::Closed)?;
        writeln!(writer, "{}", line).map_err(|source| self.io_error(source))?;
        self.written.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn query(&self, filter: AuditFilter) -> AuditResult<Vec<AuditEntry>> {
        if let Some(writer) = self.writer.lock().as_mut() {
            writer.flush().map_err(|source| self.io_error(source))?;
        }

        let file = File::open(&self.path).map_err(|source| self.io_error(source))?;
        let mut results = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line.map_err(|source| self.io_error(source))?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<AuditEntry>(&line) {
                Ok(entry) if filter.matches(&entry) => {
                    results.push(entry);
                    if results.len() >= filter.max_results() {
                        break;
                    }
                }
                Ok(_) => {}
                Err(e) => tracing::warn!(error = %e, "Skipping malformed audit line"),
            }
        }
        Ok(results)
    }

    async fn flush(&self) -> AuditResult<()> {
        match self.writer.lock().as_mut() {
            Some(writer) => writer.flush().map_err(|source| self.io_error(source)),
            None => Ok(()),
        }
    }

    fn name(&self) -> &str {
        "file"
    }
}

impl std::fmt::Debug for FileAuditSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileAuditSink")
            .field("path", &self.path)
            .field("written", &self.entries_written())
            .finish()
    }
}

impl Drop for FileAuditSink {
    fn drop(&mut self) {
        if let Some(writer) = self.writer.get_mut().as_mut() {
            let _ = writer.flush();
        }
    }
}
