//! Filename scheme for log files and their archives.
//!
//! Every retention and archival decision is keyed on the date embedded in the
//! filename, never on filesystem timestamps, so copies and clock changes do
//! not affect which files are kept.

use std::path::{Path, PathBuf};

use time::{Date, Month};

/// Name of the log file for `date`: `YYYY-MM-DD.log`.
pub fn log_file_name(date: Date) -> String {
    format!("{}.log", format_date(date))
}

pub fn log_path(dir: &Path, date: Date) -> PathBuf {
    dir.join(log_file_name(date))
}

/// Name of the archive produced for `date`: `YYYY_MM_DD_log.zip`.
pub fn archive_file_name(date: Date) -> String {
    format!(
        "{:04}_{:02}_{:02}_log.zip",
        date.year(),
        date.month() as u8,
        date.day()
    )
}

pub fn archive_path(dir: &Path, date: Date) -> PathBuf {
    dir.join(archive_file_name(date))
}

pub fn format_date(date: Date) -> String {
    format!(
        "{:04}-{:02}-{:02}",
        date.year(),
        date.month() as u8,
        date.day()
    )
}

/// Date embedded in a `YYYY-MM-DD.log` name.
pub fn parse_log_date(name: &str) -> Option<Date> {
    parse_date(name.strip_suffix(".log")?, b'-')
}

/// Date embedded in any archive naming this crate recognizes:
/// `YYYY_MM_DD_log.zip` (current), plus the legacy `YYYY-MM-DD.zip` and
/// `YYYY-MM-DD_HHMM.zip` variants, which retention deletes but the archiver
/// never produces.
pub fn parse_archive_date(name: &str) -> Option<Date> {
    let stem = name.strip_suffix(".zip")?;
    if let Some(date_part) = stem.strip_suffix("_log") {
        return parse_date(date_part, b'_');
    }
    if let Some((date_part, stamp)) = stem.split_once('_') {
        if stamp.len() == 4 && stamp.bytes().all(|b| b.is_ascii_digit()) {
            return parse_date(date_part, b'-');
        }
        return None;
    }
    parse_date(stem, b'-')
}

/// Date embedded in any filename this crate manages.
pub fn file_date(name: &str) -> Option<Date> {
    parse_log_date(name).or_else(|| parse_archive_date(name))
}

fn parse_date(s: &str, sep: u8) -> Option<Date> {
    let bytes = s.as_bytes();
    if bytes.len() != 10 || bytes[4] != sep || bytes[7] != sep {
        return None;
    }
    let year = parse_digits(&s[0..4])? as i32;
    let month = Month::try_from(parse_digits(&s[5..7])? as u8).ok()?;
    let day = parse_digits(&s[8..10])? as u8;
    Date::from_calendar_date(year, month, day).ok()
}

fn parse_digits(part: &str) -> Option<u32> {
    if !part.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    part.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(year: i32, month: u8, day: u8) -> Date {
        Date::from_calendar_date(year, Month::try_from(month).unwrap(), day).unwrap()
    }

    #[test]
    fn log_names_round_trip() {
        let d = date(2025, 7, 23);
        assert_eq!(log_file_name(d), "2025-07-23.log");
        assert_eq!(parse_log_date("2025-07-23.log"), Some(d));
    }

    #[test]
    fn archive_names_round_trip() {
        let d = date(2025, 7, 23);
        assert_eq!(archive_file_name(d), "2025_07_23_log.zip");
        assert_eq!(parse_archive_date("2025_07_23_log.zip"), Some(d));
    }

    #[test]
    fn legacy_archive_names_parse() {
        let d = date(2025, 7, 23);
        assert_eq!(parse_archive_date("2025-07-23.zip"), Some(d));
        assert_eq!(parse_archive_date("2025-07-23_0930.zip"), Some(d));
    }

    #[test]
    fn malformed_names_are_rejected() {
        assert_eq!(parse_log_date("2025-7-23.log"), None);
        assert_eq!(parse_log_date("2025-13-01.log"), None);
        assert_eq!(parse_log_date("latest.log"), None);
        assert_eq!(parse_log_date("2025-07-23.txt"), None);
        assert_eq!(parse_archive_date("2025_07_23.zip"), None);
        assert_eq!(parse_archive_date("2025-07-23_093.zip"), None);
        assert_eq!(parse_archive_date("notes.zip"), None);
    }

    #[test]
    fn file_date_accepts_either_kind() {
        let d = date(2024, 1, 2);
        assert_eq!(file_date("2024-01-02.log"), Some(d));
        assert_eq!(file_date("2024_01_02_log.zip"), Some(d));
        assert_eq!(file_date("readme.md"), None);
    }
}
