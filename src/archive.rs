//! Asynchronous zip archive engine.
//!
//! Each long-running operation spawns a worker thread and returns an
//! [`ArchiveTask`] handle immediately. The worker delivers an ordered event
//! stream over a channel: `Started`, zero or more `Progress`, then exactly
//! one terminal `Completed` or `Failed`. Dropping the handle without waiting
//! is fire-and-forget; the worker still runs to its terminal event.
//!
//! The engine holds no persistent state. Every task owns its own buffers and
//! channel, so outstanding tasks on different containers cannot interfere.

use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::{Error, Result};

/// Streaming chunk size for both compression and extraction.
const CHUNK_SIZE: usize = 1024 * 1024;

/// Per-chunk progress for the entry currently being processed.
#[derive(Debug, Clone)]
pub struct ArchiveProgress {
    pub entry: String,
    /// Percent of the current entry, 0-100.
    pub percent: u8,
    pub total_entries: usize,
    /// 1-based index of the current entry.
    pub entry_index: usize,
    pub entry_bytes_done: u64,
    pub entry_bytes_total: u64,
}

/// Payload of a successful terminal event.
#[derive(Debug, Clone)]
pub struct ArchiveOutcome {
    /// The container that was written or read.
    pub container: PathBuf,
    /// Files written to disk by extraction; empty for compression.
    pub files: Vec<PathBuf>,
}

#[derive(Debug)]
pub enum ArchiveEvent {
    Started,
    Progress(ArchiveProgress),
    Completed(ArchiveOutcome),
    Failed(String),
}

/// Handle to one in-flight archive operation.
pub struct ArchiveTask {
    events: Receiver<ArchiveEvent>,
    handle: Option<JoinHandle<()>>,
}

impl ArchiveTask {
    fn spawn<F>(work: F) -> Self
    where
        F: FnOnce(&Sender<ArchiveEvent>) -> Result<ArchiveOutcome> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        let handle = thread::spawn(move || {
            let _ = tx.send(ArchiveEvent::Started);
            match work(&tx) {
                Ok(outcome) => {
                    let _ = tx.send(ArchiveEvent::Completed(outcome));
                }
                Err(err) => {
                    let _ = tx.send(ArchiveEvent::Failed(err.to_string()));
                }
            }
        });
        Self {
            events: rx,
            handle: Some(handle),
        }
    }

    /// Event stream for this task. Ends with the terminal event, after which
    /// the channel disconnects.
    pub fn events(&self) -> &Receiver<ArchiveEvent> {
        &self.events
    }

    /// Drain the event stream to the terminal event and join the worker.
    pub fn wait(self) -> Result<ArchiveOutcome> {
        self.wait_with(|_| {})
    }

    /// Like [`wait`](Self::wait) but hands every event to `observer` first.
    pub fn wait_with<F>(mut self, mut observer: F) -> Result<ArchiveOutcome>
    where
        F: FnMut(&ArchiveEvent),
    {
        let mut terminal: Option<Result<ArchiveOutcome>> = None;
        while let Ok(event) = self.events.recv() {
            observer(&event);
            match event {
                ArchiveEvent::Completed(outcome) => terminal = Some(Ok(outcome)),
                ArchiveEvent::Failed(message) => terminal = Some(Err(Error::Archive(message))),
                ArchiveEvent::Started | ArchiveEvent::Progress(_) => {}
            }
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
        terminal.unwrap_or_else(|| Err(Error::Archive("worker exited without a terminal event".into())))
    }
}

/// Compress `sources` (regular files or directory trees) into `container`.
///
/// Directories are walked depth-first; empty directories are recorded as
/// zero-length entries with a trailing separator and written before any file
/// contents. On failure the partially-written container is removed before
/// the `Failed` event, so an existing container always means a complete one.
pub fn compress(sources: &[PathBuf], container: &Path, comment: Option<&str>) -> ArchiveTask {
    let sources = sources.to_vec();
    let container = container.to_path_buf();
    let comment = comment.map(str::to_owned);
    ArchiveTask::spawn(move |tx| {
        let result = write_container(&sources, &container, comment.as_deref(), tx);
        if result.is_err() {
            let _ = std::fs::remove_file(&container);
        }
        result
    })
}

/// Extract every entry of `container` into `dest_dir`.
pub fn extract(container: &Path, dest_dir: &Path) -> ArchiveTask {
    let container = container.to_path_buf();
    let dest = dest_dir.to_path_buf();
    ArchiveTask::spawn(move |tx| extract_entries(&container, &dest, None, tx))
}

/// Extract only entries whose name contains `substring`. The extracted file
/// list rides on the terminal `Completed` event.
pub fn extract_matching(container: &Path, dest_dir: &Path, substring: &str) -> ArchiveTask {
    let container = container.to_path_buf();
    let dest = dest_dir.to_path_buf();
    let needle = substring.to_owned();
    ArchiveTask::spawn(move |tx| extract_entries(&container, &dest, Some(needle.as_str()), tx))
}

/// Entry names of `container`, in archive order. The underlying handle is
/// closed before returning, on the error path included.
pub fn entry_names(container: &Path) -> Result<Vec<String>> {
    Ok(entries(container)?.into_iter().map(|e| e.name).collect())
}

#[derive(Debug, Clone)]
pub struct EntryInfo {
    pub name: String,
    pub size: u64,
    pub is_dir: bool,
    pub comment: String,
}

/// Entry metadata of `container`, in archive order.
pub fn entries(container: &Path) -> Result<Vec<EntryInfo>> {
    let mut archive = ZipArchive::new(BufReader::new(File::open(container)?))?;
    let mut out = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let entry = archive.by_index(i)?;
        out.push(EntryInfo {
            name: entry.name().to_string(),
            size: entry.size(),
            is_dir: entry.is_dir(),
            comment: entry.comment().to_string(),
        });
    }
    Ok(out)
}

fn write_container(
    sources: &[PathBuf],
    container: &Path,
    comment: Option<&str>,
    tx: &Sender<ArchiveEvent>,
) -> Result<ArchiveOutcome> {
    let mut files: Vec<(PathBuf, String)> = Vec::new();
    let mut empty_dirs: Vec<String> = Vec::new();
    for source in sources {
        collect(source, "", &mut files, &mut empty_dirs)?;
    }

    if let Some(parent) = container.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let total_entries = empty_dirs.len() + files.len();
    let out = File::create(container)?;
    let mut writer = ZipWriter::new(BufWriter::new(out));
    if let Some(comment) = comment {
        writer.set_comment(comment);
    }
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    // Empty-directory markers go in first, then file contents.
    let mut index = 0usize;
    for dir_entry in &empty_dirs {
        index += 1;
        writer.add_directory(dir_entry.trim_end_matches('/'), options)?;
        send_progress(tx, dir_entry, 100, total_entries, index, 0, 0);
    }

    let mut buf = vec![0u8; CHUNK_SIZE];
    for (path, entry_name) in &files {
        index += 1;
        let total = std::fs::metadata(path)?.len();
        writer.start_file(entry_name.as_str(), options)?;
        let mut reader = BufReader::with_capacity(CHUNK_SIZE, File::open(path)?);
        let mut done = 0u64;
        loop {
            let n = reader.read(&mut buf)?;
            if n == 0 {
                break;
            }
            writer.write_all(&buf[..n])?;
            done += n as u64;
            send_progress(tx, entry_name, pct(done, total), total_entries, index, done, total);
        }
    }

    let mut inner = writer.finish()?;
    inner.flush()?;
    Ok(ArchiveOutcome {
        container: container.to_path_buf(),
        files: Vec::new(),
    })
}

fn collect(
    path: &Path,
    prefix: &str,
    files: &mut Vec<(PathBuf, String)>,
    empty_dirs: &mut Vec<String>,
) -> Result<()> {
    let name = path.file_name().and_then(|n| n.to_str()).ok_or_else(|| {
        Error::Io(std::io::Error::new(
            ErrorKind::InvalidInput,
            format!("source has no usable name: {}", path.display()),
        ))
    })?;
    let entry = if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}/{name}")
    };

    let metadata = std::fs::metadata(path)?;
    if metadata.is_dir() {
        let mut children = std::fs::read_dir(path)?.collect::<std::io::Result<Vec<_>>>()?;
        if children.is_empty() {
            empty_dirs.push(format!("{entry}/"));
        } else {
            children.sort_by_key(|c| c.file_name());
            for child in children {
                collect(&child.path(), &entry, files, empty_dirs)?;
            }
        }
    } else {
        files.push((path.to_path_buf(), entry));
    }
    Ok(())
}

fn extract_entries(
    container: &Path,
    dest: &Path,
    filter: Option<&str>,
    tx: &Sender<ArchiveEvent>,
) -> Result<ArchiveOutcome> {
    std::fs::create_dir_all(dest)?;
    let mut archive = ZipArchive::new(BufReader::new(File::open(container)?))?;

    // Select matching entries up front so the progress total stays stable.
    let mut selected = Vec::new();
    for i in 0..archive.len() {
        let entry = archive.by_index(i)?;
        let matches = filter.map_or(true, |needle| entry.name().contains(needle));
        if matches {
            selected.push(i);
        }
    }

    let total_entries = selected.len();
    let mut written = Vec::new();
    let mut buf = vec![0u8; CHUNK_SIZE];
    for (position, i) in selected.into_iter().enumerate() {
        let mut entry = archive.by_index(i)?;
        let name = entry.name().to_string();
        let target = match entry.enclosed_name() {
            Some(relative) => dest.join(relative),
            None => {
                return Err(Error::UnsafeEntryPath {
                    container: container.to_path_buf(),
                    entry: name,
                })
            }
        };
        let index = position + 1;

        if entry.is_dir() {
            std::fs::create_dir_all(&target)?;
            send_progress(tx, &name, 100, total_entries, index, 0, 0);
            continue;
        }

        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let total = entry.size();
        let mut out = BufWriter::new(File::create(&target)?);
        let mut done = 0u64;
        loop {
            let n = entry.read(&mut buf)?;
            if n == 0 {
                break;
            }
            out.write_all(&buf[..n])?;
            done += n as u64;
            send_progress(tx, &name, pct(done, total), total_entries, index, done, total);
        }
        out.flush()?;
        written.push(target);
    }

    Ok(ArchiveOutcome {
        container: container.to_path_buf(),
        files: written,
    })
}

fn send_progress(
    tx: &Sender<ArchiveEvent>,
    entry: &str,
    percent: u8,
    total_entries: usize,
    entry_index: usize,
    done: u64,
    total: u64,
) {
    let _ = tx.send(ArchiveEvent::Progress(ArchiveProgress {
        entry: entry.to_string(),
        percent,
        total_entries,
        entry_index,
        entry_bytes_done: done,
        entry_bytes_total: total,
    }));
}

fn pct(done: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    ((done as f64 / total as f64) * 100.0) as u8
}
