//! Fallback file for audit records the primary table could not take
//!
//! Newline-delimited JSON, one [`FailedLedgerEntry`] per line. Every record
//! is serialized into one buffer and written with a single `write_all` on a
//! file opened in append mode, under an in-process mutex, so concurrent
//! writers never interleave within a line.

use certledger_core::error::Result;
use certledger_core::types::FailedLedgerEntry;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, MutexGuard};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Append-only local file of failed audit writes
pub struct FallbackLog {
    path: PathBuf,
    fsync: bool,
    lock: Mutex<()>,
}

impl FallbackLog {
    pub fn new(path: PathBuf, fsync: bool) -> Self {
        Self {
            path,
            fsync,
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record, creating the directory and file if absent
    pub fn append(&self, record: &FailedLedgerEntry) -> Result<()> {
        self.lock().append(record)
    }

    /// Take exclusive access for a multi-step pass (read, archive, re-append)
    pub fn lock(&self) -> FallbackGuard<'_> {
        FallbackGuard {
            log: self,
            _guard: self.lock.lock(),
        }
    }

    /// Number of non-blank lines waiting for recovery
    pub fn pending(&self) -> Result<usize> {
        let guard = self.lock();
        Ok(guard
            .read_lines()?
            .map(|lines| lines.iter().filter(|l| !l.trim().is_empty()).count())
            .unwrap_or(0))
    }
}

/// Exclusive handle on the fallback file
pub struct FallbackGuard<'a> {
    log: &'a FallbackLog,
    _guard: MutexGuard<'a, ()>,
}

impl FallbackGuard<'_> {
    pub fn append(&self, record: &FailedLedgerEntry) -> Result<()> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        if let Some(parent) = self.log.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log.path)?;
        file.write_all(&line)?;
        if self.log.fsync {
            file.sync_data()?;
        }
        Ok(())
    }

    /// Every line of the file, or `None` if there is no file
    ///
    /// Bytes that are not UTF-8 are replaced rather than failing the read,
    /// so one damaged line cannot hide the others.
    pub fn read_lines(&self) -> Result<Option<Vec<String>>> {
        let bytes = match fs::read(&self.log.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(
            bytes
                .split(|b| *b == b'\n')
                .map(|line| String::from_utf8_lossy(line).into_owned())
                .collect(),
        ))
    }

    /// Rename the file to `<name>.recovered-<timestamp>` and return the new path
    pub fn archive(&self, at: DateTime<Utc>) -> Result<PathBuf> {
        let archived = archive_path(&self.log.path, at);
        fs::rename(&self.log.path, &archived)?;
        Ok(archived)
    }
}

fn archive_path(path: &Path, at: DateTime<Utc>) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "failed_ledger_entries.jsonl".to_string());
    let stamp = at.format("%Y%m%dT%H%M%S%.6f");
    path.with_file_name(format!("{name}.recovered-{stamp}"))
}
