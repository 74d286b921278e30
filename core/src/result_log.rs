//! Append-only per-run result file
//!
//! Each benchmark run writes one text file named
//! `log-benchd-plan-<name>-<random>`. Workers append one line per outcome;
//! every line is flushed as soon as it is written.

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::BenchResult;

/// File name prefix shared by all result logs
pub const RESULT_LOG_PREFIX: &str = "log-benchd-plan-";

/// Line-oriented result file shared by all workers of a run
#[derive(Debug)]
pub struct ResultLog {
    path: PathBuf,
    file: Mutex<Option<File>>,
    #[cfg(test)]
    failing_appends: std::sync::atomic::AtomicUsize,
}

impl ResultLog {
    /// Create a new uniquely named log for benchmark `name` inside `dir`
    pub fn create(dir: &Path, name: &str) -> BenchResult<Self> {
        let prefix = format!("{RESULT_LOG_PREFIX}{name}-");
        let (file, path) = tempfile::Builder::new()
            .prefix(&prefix)
            .tempfile_in(dir)?
            .keep()
            .map_err(|e| e.error)?;

        tracing::debug!(path = %path.display(), "Created result log");
        Ok(Self {
            path,
            file: Mutex::new(Some(file)),
            #[cfg(test)]
            failing_appends: Default::default(),
        })
    }

    /// Create the log in the system temporary directory
    pub fn create_in_temp(name: &str) -> BenchResult<Self> {
        Self::create(&std::env::temp_dir(), name)
    }

    /// Location of the log file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one line and flush it
    ///
    /// Lines appended after [`close`](Self::close) are discarded.
    pub fn append(&self, line: &str) -> BenchResult<()> {
        #[cfg(test)]
        if self.take_failure() {
            return Err(io::Error::other("injected write failure").into());
        }

        let mut guard = self.file.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(file) = guard.as_mut() {
            writeln!(file, "{line}")?;
            file.flush()?;
        }
        Ok(())
    }

    /// Flush and close the file; later appends become no-ops
    pub fn close(&self) -> BenchResult<()> {
        let mut guard = self.file.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(mut file) = guard.take() {
            file.flush()?;
            file.sync_all()?;
        }
        Ok(())
    }

    /// Whether the log still accepts lines
    pub fn is_open(&self) -> bool {
        self.file
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    /// Close the log and delete the file
    pub fn remove(&self) -> BenchResult<()> {
        self.close()?;
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Make the next `count` appends fail with an I/O error
    #[cfg(test)]
    pub(crate) fn fail_next_appends(&self, count: usize) {
        use std::sync::atomic::Ordering;
        self.failing_appends.store(count, Ordering::SeqCst);
    }

    #[cfg(test)]
    fn take_failure(&self) -> bool {
        use std::sync::atomic::Ordering;
        self.failing_appends
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    /// Read back every line written so far
    pub fn lines(&self) -> BenchResult<Vec<String>> {
        let content = std::fs::read_to_string(&self.path)?;
        Ok(content.lines().map(str::to_string).collect())
    }
}
