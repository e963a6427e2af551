use std::fs;

use daylog::{LogConfig, LogFileManager};
use tempfile::tempdir;

fn today_log_path(dir: &std::path::Path) -> std::path::PathBuf {
    daylog::layout::log_path(dir, time::OffsetDateTime::now_utc().date())
}

#[test]
fn rotation_check_is_idempotent_within_a_day() {
    let dir = tempdir().expect("tempdir");
    let mut config = LogConfig::new(dir.path());
    config.header = Some("# daylog".to_string());
    let mut manager = LogFileManager::new(config).expect("manager");

    manager.append_log("one");
    manager.append_log("two");
    manager.shutdown();

    // A repeated rotation check must not recreate or reseed the file: the
    // header appears exactly once, and only one file exists.
    let contents = fs::read_to_string(today_log_path(dir.path())).expect("read");
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], "# daylog");
    assert!(lines[1].ends_with(" one"));
    assert!(lines[2].ends_with(" two"));
    assert_eq!(fs::read_dir(dir.path()).expect("read_dir").count(), 1);
}

#[test]
fn appends_carry_a_timestamp_prefix() {
    let dir = tempdir().expect("tempdir");
    let mut manager = LogFileManager::new(LogConfig::new(dir.path())).expect("manager");

    manager.append_log("payload");
    manager.shutdown();

    let contents = fs::read_to_string(today_log_path(dir.path())).expect("read");
    let line = contents.lines().next().expect("line");
    // "MM-dd HH:mm:ss.mmm payload"
    let (stamp, rest) = line.split_at(line.len() - " payload".len());
    assert_eq!(rest, " payload");
    assert_eq!(stamp.len(), "01-02 03:04:05.006".len());
    assert_eq!(&stamp[2..3], "-");
    assert_eq!(&stamp[5..6], " ");
}

#[test]
fn out_of_band_deletion_drops_lines_without_panicking() {
    let dir = tempdir().expect("tempdir");
    let mut manager = LogFileManager::new(LogConfig::new(dir.path())).expect("manager");
    let today = today_log_path(dir.path());
    assert!(today.exists());

    fs::remove_file(&today).expect("remove");
    manager.append_log("lost");

    // Same date, so no rotation fires; the sink reads as closed and the
    // line is dropped.
    assert!(!today.exists());
    manager.shutdown();
}

#[test]
fn shutdown_is_idempotent() {
    let dir = tempdir().expect("tempdir");
    let mut config = LogConfig::new(dir.path());
    config.max_total_bytes = 1024;
    config.size_check_interval = std::time::Duration::from_millis(50);
    let mut manager = LogFileManager::new(config).expect("manager");

    manager.append_log("before shutdown");
    manager.shutdown();
    manager.shutdown();
    // Drop runs shutdown a third time.
}
