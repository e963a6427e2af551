//! Append-only line sink over a single open log file.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Owns at most one open file handle and appends single lines to it,
/// flushing after every write so each line is independently visible to
/// readers. Write failures stop here: the line is dropped and reported
/// through the `log` facade, never propagated to the caller.
#[derive(Default)]
pub struct LineSink {
    writer: Option<BufWriter<File>>,
    path: Option<PathBuf>,
}

impl LineSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open `path` for append, creating parent directories and the file as
    /// needed. Returns `true` when the file was newly created. On failure
    /// the sink is left closed.
    pub fn open(&mut self, path: &Path) -> std::io::Result<bool> {
        self.close();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let created = !path.exists();
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        self.writer = Some(BufWriter::new(file));
        self.path = Some(path.to_path_buf());
        Ok(created)
    }

    /// A handle counts as open only while the backing file still exists; a
    /// file deleted out-of-band reads as closed.
    pub fn is_open(&self) -> bool {
        self.writer.is_some() && self.path.as_deref().is_some_and(Path::exists)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Append `line` plus a newline, then flush.
    pub fn append_line(&mut self, line: &str) {
        let Some(writer) = self.writer.as_mut() else {
            return;
        };
        let result = writer
            .write_all(line.as_bytes())
            .and_then(|_| writer.write_all(b"\n"))
            .and_then(|_| writer.flush());
        if let Err(err) = result {
            log::warn!("dropping log line, write failed: {err}");
        }
    }

    /// Idempotent.
    pub fn close(&mut self) {
        if let Some(mut writer) = self.writer.take() {
            let _ = writer.flush();
        }
        self.path = None;
    }
}
