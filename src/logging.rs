//! Console and file logging for a run.
//!
//! Every event goes to both the terminal and the run log. The log file is
//! opened in append mode so repeated runs accumulate in one place.

use crate::DeployError;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Keeps the run log open. Flushes and syncs it when dropped, on every
/// exit path.
#[derive(Debug)]
pub struct LogGuard {
    file: Arc<File>,
}

impl Drop for LogGuard {
    fn drop(&mut self) {
        let _ = (&*self.file).flush();
        let _ = self.file.sync_all();
    }
}

/// Install the global subscriber: an ANSI console layer and a plain file
/// layer appending to `log_path`.
///
/// `RUST_LOG` overrides the level; otherwise it is `info`, or `debug` with
/// `verbose`. If a global subscriber already exists it is kept and only the
/// file is opened.
pub fn init_logging(log_path: &Path, verbose: bool) -> Result<LogGuard, DeployError> {
    if let Some(parent) = log_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| DeployError::io(parent, e))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
        .map_err(|e| DeployError::io(log_path, e))?;
    let file = Arc::new(file);

    let subscriber = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .with_ansi(true)
                .with_filter(level_filter(verbose)),
        )
        .with(
            fmt::layer()
                .with_writer(file.clone())
                .with_target(true)
                .with_ansi(false)
                .with_filter(level_filter(verbose)),
        );

    if subscriber.try_init().is_err() {
        tracing::debug!("global subscriber already set, keeping it");
    }

    tracing::info!(log_file = %log_path.display(), pid = std::process::id(), "logging initialized");
    Ok(LogGuard { file })
}

fn level_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "info" }))
}
