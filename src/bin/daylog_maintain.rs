use std::path::PathBuf;

use clap::Parser;
use daylog::{archive, manager, retention};
use time::OffsetDateTime;

#[derive(Parser)]
#[command(name = "daylog-maintain")]
#[command(about = "Run daylog maintenance passes against a log directory")]
struct Cli {
    /// Log directory to maintain
    #[arg(long, default_value = ".")]
    dir: PathBuf,

    /// Retention window in days
    #[arg(long, default_value_t = 7)]
    retention_days: u32,

    /// Total size budget in bytes (0 disables eviction)
    #[arg(long, default_value_t = 0)]
    max_total_bytes: u64,

    /// Run the age-based retention sweep
    #[arg(long)]
    sweep: bool,

    /// Run one size-eviction pass
    #[arg(long)]
    evict: bool,

    /// Archive historical log files into zip containers
    #[arg(long)]
    archive: bool,

    /// List the entries of a zip container and exit
    #[arg(long)]
    list: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let cli = Cli::parse();

    if let Some(container) = cli.list {
        for entry in archive::entries(&container)? {
            let kind = if entry.is_dir { "dir " } else { "file" };
            println!("{kind} {:>12} {}", entry.size, entry.name);
        }
        return Ok(());
    }

    let today = OffsetDateTime::now_utc().date();
    if cli.sweep {
        let deleted = retention::sweep_expired(&cli.dir, today, cli.retention_days)?;
        println!("retention removed {} file(s)", deleted.len());
    }
    if cli.evict {
        let deleted = manager::evict_detached(&cli.dir, cli.max_total_bytes)?;
        println!("eviction removed {} file(s)", deleted.len());
    }
    if cli.archive {
        manager::archive_historical(&cli.dir, today)?;
        println!("archival pass complete");
    }
    Ok(())
}
