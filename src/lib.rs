//! Date-partitioned log file lifecycle management.
//!
//! One log file per calendar day (`YYYY-MM-DD.log`), rotated on the first
//! append after a date change. Rotation runs a synchronous age-based
//! retention sweep and hands a background archival pass the job of
//! compressing historical files into `YYYY_MM_DD_log.zip` containers
//! (compress first, delete the source only on success). An optional total
//! size budget is enforced by a background pass that evicts oldest-named
//! files first, closing and reopening the actively-written file when it is
//! the one selected.

pub mod archive;
pub mod error;
pub mod layout;
pub mod manager;
pub mod retention;
pub mod sink;

pub use archive::{ArchiveEvent, ArchiveOutcome, ArchiveProgress, ArchiveTask, EntryInfo};
pub use error::{Error, Result};
pub use manager::{LogConfig, LogFileManager};
pub use sink::LineSink;
