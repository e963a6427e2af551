use std::fs;

use daylog::archive;
use daylog::manager::archive_historical;
use tempfile::tempdir;
use time::{Date, Month};

fn date(year: i32, month: u8, day: u8) -> Date {
    Date::from_calendar_date(year, Month::try_from(month).unwrap(), day).unwrap()
}

#[test]
fn historical_file_is_compressed_then_removed() {
    let dir = tempdir().expect("tempdir");
    let root = dir.path();
    let source = root.join("2001-03-05.log");
    fs::write(&source, b"03-05 10:00:00.000 historical line\n").expect("write");

    archive_historical(root, date(2001, 3, 6)).expect("sweep");

    let container = root.join("2001_03_05_log.zip");
    assert!(container.exists(), "archive must exist after success");
    assert!(!source.exists(), "source goes only after the archive exists");

    let names = archive::entry_names(&container).expect("names");
    assert_eq!(names, vec!["2001-03-05.log".to_string()]);

    let out = root.join("restored");
    archive::extract(&container, &out).wait().expect("extract");
    let contents = fs::read(out.join("2001-03-05.log")).expect("read");
    assert_eq!(contents, b"03-05 10:00:00.000 historical line\n");
}

#[test]
fn existing_archive_is_never_recreated() {
    let dir = tempdir().expect("tempdir");
    let root = dir.path();
    let source = root.join("2001-03-05.log");
    fs::write(&source, b"line\n").expect("write");
    let container = root.join("2001_03_05_log.zip");
    fs::write(&container, b"already here").expect("write");

    archive_historical(root, date(2001, 3, 6)).expect("sweep");

    // Pair skipped entirely: container untouched, source left in place.
    assert_eq!(fs::read(&container).expect("read"), b"already here");
    assert!(source.exists());
}

#[test]
fn todays_file_is_excluded_from_the_sweep() {
    let dir = tempdir().expect("tempdir");
    let root = dir.path();
    let today = date(2001, 3, 6);
    let current = root.join("2001-03-06.log");
    fs::write(&current, b"active\n").expect("write");

    archive_historical(root, today).expect("sweep");

    assert!(current.exists());
    assert!(!root.join("2001_03_06_log.zip").exists());
}

#[test]
fn undated_log_files_are_left_alone() {
    let dir = tempdir().expect("tempdir");
    let root = dir.path();
    fs::write(root.join("debug.log"), b"not dated\n").expect("write");

    archive_historical(root, date(2001, 3, 6)).expect("sweep");

    assert!(root.join("debug.log").exists());
    assert_eq!(
        fs::read_dir(root).expect("read_dir").count(),
        1,
        "no archive appears for an undated name"
    );
}
