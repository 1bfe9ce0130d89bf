//! Logging: console plus a daily-rolling file, with startup cleanup of
//! stale log files.

use std::fs;
use std::path::Path;
use std::time::{Duration, SystemTime};

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

const LOG_RETENTION: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Initialize the console + file subscriber. The returned guard must stay
/// alive for the process lifetime or buffered file output is lost.
pub fn init(log_dir: &Path) -> Result<WorkerGuard> {
    fs::create_dir_all(log_dir)
        .with_context(|| format!("failed to create log directory {}", log_dir.display()))?;
    remove_stale_logs(log_dir);

    let file_appender = tracing_appender::rolling::daily(log_dir, "autologin.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(file_writer),
        )
        .init();

    Ok(guard)
}

/// Best-effort removal of log files older than the retention window.
fn remove_stale_logs(log_dir: &Path) {
    let Ok(entries) = fs::read_dir(log_dir) else {
        return;
    };
    let now = SystemTime::now();
    for entry in entries.filter_map(|entry| entry.ok()) {
        let path = entry.path();
        let is_log = path
            .file_name()
            .map(|name| name.to_string_lossy().starts_with("autologin.log"))
            .unwrap_or(false);
        if !is_log {
            continue;
        }
        let stale = entry
            .metadata()
            .and_then(|meta| meta.modified())
            .ok()
            .and_then(|modified| now.duration_since(modified).ok())
            .is_some_and(|age| age > LOG_RETENTION);
        if stale {
            let _ = fs::remove_file(&path);
        }
    }
}
