//! File-backed logging setup.
//!
//! The TUI owns the terminal, so log output goes to a file under the
//! redraft home directory. Filtering is controlled by `REDRAFT_LOG`
//! (standard `tracing_subscriber::EnvFilter` syntax, default `info`).

use std::fs;
use std::sync::Mutex;

use anyhow::{Context, Result};
use redraft_core::config::paths;

/// Environment variable holding the log filter.
const LOG_ENV: &str = "REDRAFT_LOG";

/// Initializes the global subscriber writing to `<home>/logs/redraft.log`.
pub fn init() -> Result<()> {
    let log_dir = paths::log_dir();
    fs::create_dir_all(&log_dir)
        .with_context(|| format!("create log directory {}", log_dir.display()))?;
    let log_path = log_dir.join("redraft.log");

    let log_file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("open log file {}", log_path.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| "info".into()),
        )
        .with_ansi(false)
        .with_writer(Mutex::new(log_file))
        .init();

    Ok(())
}
