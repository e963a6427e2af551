use std::path::PathBuf;

/// Errors surfaced by maintenance passes and the archive engine.
///
/// The append path never returns these; sink failures are absorbed there and
/// reported through the `log` facade.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// Terminal failure reported by an archive task.
    #[error("archive task failed: {0}")]
    Archive(String),

    /// An archive entry name would resolve outside the extraction directory.
    #[error("unsafe entry path in {}: {entry}", container.display())]
    UnsafeEntryPath { container: PathBuf, entry: String },
}

pub type Result<T> = std::result::Result<T, Error>;
