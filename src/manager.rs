//! Log file lifecycle: daily rotation, retention, size eviction, archival.
//!
//! The manager owns the sink for today's file. Every append first checks the
//! calendar date and rotates when it changed; the rotation transition runs
//! the retention sweep inline and hands an archival pass to a background
//! worker. A second background thread enforces the size budget on a fixed
//! delay. A single lock protects every sink transition, so eviction of the
//! actively-written file can never race an in-flight append.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use time::{Date, OffsetDateTime};

use crate::archive::{self, ArchiveEvent};
use crate::layout;
use crate::retention;
use crate::sink::LineSink;
use crate::Result;

/// Configuration for a [`LogFileManager`].
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Directory holding the log files and their archives.
    pub dir: PathBuf,

    /// Files dated `today - retention_days` or older are deleted on rotation.
    pub retention_days: u32,

    /// Aggregate size budget for `.log` and `.zip` files. 0 disables the
    /// eviction scheduler.
    pub max_total_bytes: u64,

    /// Delay between size-eviction passes.
    pub size_check_interval: Duration,

    /// Seed line written into every newly created log file.
    pub header: Option<String>,
}

impl LogConfig {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            retention_days: 7,
            max_total_bytes: 0,
            size_check_interval: Duration::from_secs(60),
            header: None,
        }
    }
}

struct SinkState {
    sink: LineSink,
    current_date: Option<Date>,
}

struct Shared {
    config: LogConfig,
    state: Mutex<SinkState>,
    shutdown: AtomicBool,
}

impl Shared {
    fn lock_state(&self) -> MutexGuard<'_, SinkState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Owns the sink for today's file and both background maintenance workers.
///
/// One instance per log directory, constructed explicitly at startup and
/// handed to the logging front-end.
pub struct LogFileManager {
    shared: Arc<Shared>,
    archive_tx: Option<Sender<Date>>,
    archive_worker: Option<JoinHandle<()>>,
    eviction_worker: Option<JoinHandle<()>>,
}

impl LogFileManager {
    /// Open today's file, run the initial rotation transition, and start the
    /// background workers (the eviction scheduler only when a size budget is
    /// configured).
    pub fn new(config: LogConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.dir)?;
        let shared = Arc::new(Shared {
            config,
            state: Mutex::new(SinkState {
                sink: LineSink::new(),
                current_date: None,
            }),
            shutdown: AtomicBool::new(false),
        });

        let (archive_tx, archive_rx) = mpsc::channel();
        let archive_worker = {
            let shared = Arc::clone(&shared);
            thread::Builder::new()
                .name("daylog-archive".into())
                .spawn(move || archive_loop(shared, archive_rx))?
        };
        let eviction_worker = if shared.config.max_total_bytes > 0 {
            let shared = Arc::clone(&shared);
            Some(
                thread::Builder::new()
                    .name("daylog-evict".into())
                    .spawn(move || eviction_loop(shared))?,
            )
        } else {
            None
        };

        let manager = Self {
            shared,
            archive_tx: Some(archive_tx),
            archive_worker: Some(archive_worker),
            eviction_worker,
        };
        {
            let mut state = manager.shared.lock_state();
            manager.ensure_today_open(&mut state, today());
        }
        Ok(manager)
    }

    /// Append one preformatted line to today's file, rotating first when the
    /// date changed. Best-effort: a sink failure drops the line and is
    /// reported through the `log` facade; the caller is never interrupted.
    pub fn append_log(&self, line: &str) {
        let now = OffsetDateTime::now_utc();
        let mut state = self.shared.lock_state();
        self.ensure_today_open(&mut state, now.date());
        if state.sink.is_open() {
            state.sink.append_line(&format!("{} {line}", format_timestamp(now)));
        }
    }

    /// Run the age-based retention sweep once, synchronously.
    pub fn run_retention_once(&self) -> Result<Vec<PathBuf>> {
        retention::sweep_expired(
            &self.shared.config.dir,
            today(),
            self.shared.config.retention_days,
        )
    }

    /// Run one size-eviction pass, synchronously. Handles the active file
    /// (close, delete, reopen empty) when it is selected.
    pub fn run_size_eviction_once(&self) -> Result<Vec<PathBuf>> {
        let mut state = self.shared.lock_state();
        evict_by_size(&self.shared, &mut state)
    }

    /// Archive every historical log file once, synchronously.
    pub fn run_archive_sweep_once(&self) -> Result<()> {
        archive_historical(&self.shared.config.dir, today())
    }

    /// Close the sink and stop both background workers, joining them.
    /// Safe to call more than once. In-flight archive tasks run to their
    /// terminal event; new passes are no longer scheduled.
    pub fn shutdown(&mut self) {
        self.shared.shutdown.store(true, Ordering::Release);
        // Dropping the sender ends the archive worker's receive loop.
        self.archive_tx.take();
        if let Some(handle) = self.archive_worker.take() {
            let _ = handle.join();
        }
        if let Some(handle) = self.eviction_worker.take() {
            let _ = handle.join();
        }
        let mut state = self.shared.lock_state();
        state.sink.close();
        state.current_date = None;
    }

    /// Idempotent within a day: the fast path is a date comparison and does
    /// no file I/O. On a date change: close the old sink, open the new file,
    /// sweep expired files, then enqueue the archival pass.
    fn ensure_today_open(&self, state: &mut SinkState, today: Date) -> bool {
        if state.current_date == Some(today) {
            return false;
        }
        state.sink.close();
        state.current_date = Some(today);
        let path = layout::log_path(&self.shared.config.dir, today);
        open_sink(&self.shared.config, &mut state.sink, &path);

        match retention::sweep_expired(&self.shared.config.dir, today, self.shared.config.retention_days)
        {
            Ok(deleted) if !deleted.is_empty() => {
                log::info!("retention removed {} expired file(s)", deleted.len());
            }
            Ok(_) => {}
            Err(err) => log::warn!("retention sweep failed: {err}"),
        }
        if let Some(tx) = &self.archive_tx {
            let _ = tx.send(today);
        }
        true
    }
}

impl Drop for LogFileManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Archive every `.log` file in `dir` except the one dated `today`:
/// compress to `YYYY_MM_DD_log.zip`, skip when that archive already exists,
/// delete the source only after a successful compression.
pub fn archive_historical(dir: &Path, today: Date) -> Result<()> {
    let today_name = layout::log_file_name(today);
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let path = entry.path();
        let name = match path.file_name().and_then(|n| n.to_str()) {
            Some(name) => name,
            None => continue,
        };
        if name == today_name {
            continue;
        }
        let date = match layout::parse_log_date(name) {
            Some(date) => date,
            None => continue,
        };
        let container = layout::archive_path(dir, date);
        if container.exists() {
            continue;
        }
        archive_one(&path, &container);
    }
    Ok(())
}

/// One size-eviction pass over `dir` with no live sink, for external
/// maintenance tooling. In-process eviction goes through
/// [`LogFileManager::run_size_eviction_once`].
pub fn evict_detached(dir: &Path, budget: u64) -> Result<Vec<PathBuf>> {
    if budget == 0 {
        return Ok(Vec::new());
    }
    let (files, mut total) = scan_managed(dir)?;
    let mut deleted = Vec::new();
    for (path, size) in files {
        if total <= budget {
            break;
        }
        std::fs::remove_file(&path)?;
        total -= size;
        deleted.push(path);
    }
    Ok(deleted)
}

fn archive_one(source: &Path, container: &Path) {
    log::debug!("archiving {}", source.display());
    let task = archive::compress(&[source.to_path_buf()], container, None);
    let result = task.wait_with(|event| {
        if let ArchiveEvent::Progress(progress) = event {
            log::trace!("compressing {}: {}%", progress.entry, progress.percent);
        }
    });
    match result {
        Ok(outcome) => {
            // Compress-then-delete: the source goes only once the container
            // is complete.
            match std::fs::remove_file(source) {
                Ok(()) => log::debug!(
                    "archived {} -> {}",
                    source.display(),
                    outcome.container.display()
                ),
                Err(err) => log::warn!(
                    "archived but could not remove {}: {err}",
                    source.display()
                ),
            }
        }
        Err(err) => log::error!("archiving {} failed, keeping source: {err}", source.display()),
    }
}

fn evict_by_size(shared: &Shared, state: &mut SinkState) -> Result<Vec<PathBuf>> {
    let budget = shared.config.max_total_bytes;
    if budget == 0 {
        return Ok(Vec::new());
    }
    let (files, mut total) = scan_managed(&shared.config.dir)?;
    if total <= budget {
        return Ok(Vec::new());
    }

    let active = state
        .current_date
        .map(|date| layout::log_path(&shared.config.dir, date));
    let mut deleted = Vec::new();
    for (path, size) in files {
        if total <= budget {
            break;
        }
        let is_active = active.as_deref() == Some(path.as_path());
        if is_active {
            // The backing file of an open handle is never deleted in place.
            state.sink.close();
        }
        match std::fs::remove_file(&path) {
            Ok(()) => {
                total -= size;
                deleted.push(path.clone());
            }
            Err(err) => log::warn!("eviction failed for {}: {err}", path.display()),
        }
        if is_active {
            open_sink(&shared.config, &mut state.sink, &path);
        }
    }
    Ok(deleted)
}

/// Managed files (`.log` + `.zip`) sorted by name ascending, which is
/// oldest-first because names encode dates, plus their aggregate size.
fn scan_managed(dir: &Path) -> Result<(Vec<(PathBuf, u64)>, u64)> {
    let mut files = Vec::new();
    let mut total = 0u64;
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let path = entry.path();
        let managed = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("log") | Some("zip")
        );
        if !managed {
            continue;
        }
        let size = entry.metadata()?.len();
        total += size;
        files.push((path, size));
    }
    files.sort_by(|a, b| a.0.file_name().cmp(&b.0.file_name()));
    Ok((files, total))
}

fn open_sink(config: &LogConfig, sink: &mut LineSink, path: &Path) {
    match sink.open(path) {
        Ok(created) => {
            if created {
                if let Some(header) = &config.header {
                    sink.append_line(header);
                }
            }
        }
        Err(err) => log::error!("failed to open {}: {err}", path.display()),
    }
}

fn archive_loop(shared: Arc<Shared>, jobs: Receiver<Date>) {
    while let Ok(today) = jobs.recv() {
        if shared.shutdown.load(Ordering::Acquire) {
            break;
        }
        if let Err(err) = archive_historical(&shared.config.dir, today) {
            log::warn!("archival sweep failed: {err}");
        }
    }
}

fn eviction_loop(shared: Arc<Shared>) {
    // Fixed delay: each pass is scheduled relative to the previous one's end.
    while sleep_unless_shutdown(&shared.shutdown, shared.config.size_check_interval) {
        let mut state = shared.lock_state();
        if let Err(err) = evict_by_size(&shared, &mut state) {
            log::warn!("size eviction failed: {err}");
        }
    }
}

fn sleep_unless_shutdown(shutdown: &AtomicBool, total: Duration) -> bool {
    let slice = Duration::from_millis(100);
    let mut remaining = total;
    while !remaining.is_zero() {
        if shutdown.load(Ordering::Acquire) {
            return false;
        }
        let step = remaining.min(slice);
        thread::sleep(step);
        remaining -= step;
    }
    !shutdown.load(Ordering::Acquire)
}

fn today() -> Date {
    OffsetDateTime::now_utc().date()
}

fn format_timestamp(now: OffsetDateTime) -> String {
    format!(
        "{:02}-{:02} {:02}:{:02}:{:02}.{:03}",
        now.month() as u8,
        now.day(),
        now.hour(),
        now.minute(),
        now.second(),
        now.millisecond()
    )
}
