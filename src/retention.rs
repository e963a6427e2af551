use std::path::{Path, PathBuf};

use time::Date;

use crate::layout::file_date;
use crate::Result;

/// Delete every managed file whose embedded date is on or before
/// `today - retention_days`. A file exactly `retention_days` old is purged.
/// Names that do not carry a recognizable date are never touched.
///
/// Returns the deleted paths, sorted. Idempotent.
pub fn sweep_expired(dir: &Path, today: Date, retention_days: u32) -> Result<Vec<PathBuf>> {
    let limit = today.saturating_sub(time::Duration::days(i64::from(retention_days)));
    let mut deleted = Vec::new();
    if !dir.exists() {
        return Ok(deleted);
    }
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
        let date = match file_date(name) {
            Some(date) => date,
            None => continue,
        };
        if date <= limit {
            std::fs::remove_file(&path)?;
            deleted.push(path);
        }
    }
    deleted.sort();
    Ok(deleted)
}
