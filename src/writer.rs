//! Change-aware file writer.
//!
//! Generated content is staged in memory and committed only when it differs
//! from what is already on disk. An identical commit leaves the existing
//! file (and its modification time) untouched, which is what keeps derived
//! pages from looking stale on every run.
//!
//! ```ignore
//! let mut staged = StagedFile::new(path);
//! write!(staged, "...")?;
//! match staged.commit()? {
//!     WriteOutcome::Unchanged => {}
//!     WriteOutcome::Created | WriteOutcome::Replaced => {}
//! }
//! ```
//!
//! Dropping a `StagedFile` without committing discards the buffer.

use anyhow::{Context, Result};
use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
    sync::atomic::{AtomicUsize, Ordering},
};
use tempfile::NamedTempFile;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Created,
    Replaced,
    Unchanged,
}

impl WriteOutcome {
    pub fn changed(self) -> bool {
        self != Self::Unchanged
    }
}

// ============================================================================
// StagedFile
// ============================================================================

/// An in-memory buffer bound to a target path.
#[derive(Debug)]
pub struct StagedFile {
    target: PathBuf,
    buffer: Vec<u8>,
}

impl StagedFile {
    pub fn new(target: impl Into<PathBuf>) -> Self {
        Self {
            target: target.into(),
            buffer: Vec::new(),
        }
    }

    /// Compare against the target and replace it only if different.
    ///
    /// Replacement goes through a temporary file in the same directory and
    /// a rename, so readers never observe a half-written file.
    pub fn commit(self) -> Result<WriteOutcome> {
        let existing = match fs::read(&self.target) {
            Ok(bytes) => Some(bytes),
            Err(err) if err.kind() == io::ErrorKind::NotFound => None,
            Err(err) => {
                return Err(err).with_context(|| format!("reading `{}`", self.target.display()));
            }
        };

        if existing.as_deref() == Some(self.buffer.as_slice()) {
            return Ok(WriteOutcome::Unchanged);
        }

        let parent = self
            .target
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        // Concurrent callers may race on the same directory; create_dir_all
        // treats an existing directory as success.
        fs::create_dir_all(parent)
            .with_context(|| format!("creating `{}`", parent.display()))?;

        let mut tmp = NamedTempFile::new_in(parent)
            .with_context(|| format!("staging in `{}`", parent.display()))?;
        tmp.write_all(&self.buffer)?;
        tmp.as_file().sync_all().ok();
        tmp.persist(&self.target)
            .map_err(|err| err.error)
            .with_context(|| format!("writing `{}`", self.target.display()))?;

        Ok(if existing.is_some() {
            WriteOutcome::Replaced
        } else {
            WriteOutcome::Created
        })
    }
}

impl Write for StagedFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Stage `content` for `path` and commit it.
pub fn write_if_changed(path: &Path, content: &[u8]) -> Result<WriteOutcome> {
    let mut staged = StagedFile::new(path);
    staged.write_all(content)?;
    staged.commit()
}

// ============================================================================
// Statistics
// ============================================================================

/// Per-run tally of commit outcomes; shared across worker threads.
#[derive(Debug, Default)]
pub struct WriteStats {
    written: AtomicUsize,
    unchanged: AtomicUsize,
}

impl WriteStats {
    pub fn record(&self, outcome: WriteOutcome) -> WriteOutcome {
        let counter = if outcome.changed() {
            &self.written
        } else {
            &self.unchanged
        };
        counter.fetch_add(1, Ordering::Relaxed);
        outcome
    }

    pub fn written(&self) -> usize {
        self.written.load(Ordering::Relaxed)
    }

    pub fn unchanged(&self) -> usize {
        self.unchanged.load(Ordering::Relaxed)
    }
}
