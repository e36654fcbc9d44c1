//! File-backed audit sink.
//!
//! Writes one pipe-delimited line per unit of work to a date-stamped file,
//! creating the file with a header row on first use. The format is stable;
//! downstream tooling parses it.

use anyhow::{Context, Result};
use chrono::Local;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::domain::audit::{AuditEntry, AuditSink};

const HEADER: &str = "TIME|STEP|PID|ACTION|BEFORE|AFTER|HAS_ANY|DETAILS\n";

/// Appends entries to `reconcile-audit-YYYY-MM-DD.log` under a directory.
///
/// The file handle is opened once per sink; a sink covers one batch run, so
/// runs that straddle midnight keep writing to the file they started with.
pub struct FileAuditLog {
    path: PathBuf,
    file: Mutex<File>,
}

impl FileAuditLog {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating audit directory {dir:?}"))?;

        let path = dir.join(format!(
            "reconcile-audit-{}.log",
            Local::now().format("%Y-%m-%d")
        ));
        let is_new = !path.exists();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("opening audit log {path:?}"))?;
        if is_new {
            file.write_all(HEADER.as_bytes())
                .context("writing audit log header")?;
        }

        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn render(entry: &AuditEntry) -> String {
        format!(
            "{}|{}|{}|{}|{}|{}|{}|{}\n",
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            entry.operation,
            entry.item_label(),
            entry.action,
            entry.before,
            entry.after,
            entry.wildcard_label(),
            entry.detail
        )
    }
}

impl AuditSink for FileAuditLog {
    fn append(&self, entry: &AuditEntry) -> Result<String> {
        let line = Self::render(entry);
        let mut file = self
            .file
            .lock()
            .map_err(|_| anyhow::anyhow!("audit log mutex poisoned"))?;
        file.write_all(line.as_bytes())
            .context("appending audit entry")?;
        file.flush().context("flushing audit log")?;
        Ok(entry.screen_line())
    }
}

/// In-memory sink for tests and dry previews.
#[derive(Default)]
pub struct MemoryAuditLog {
    entries: Mutex<Vec<AuditEntry>>,
}

impl MemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AuditSink for MemoryAuditLog {
    fn append(&self, entry: &AuditEntry) -> Result<String> {
        self.entries
            .lock()
            .map_err(|_| anyhow::anyhow!("audit log mutex poisoned"))?
            .push(entry.clone());
        Ok(entry.screen_line())
    }
}
