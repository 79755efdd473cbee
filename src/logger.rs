use std::fs;

use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::paths;

/// Initialize structured logging.
///
/// Sets up:
/// - File output: rolling log files in `{data_dir}/logs/gesticulate.*.log`
///   with daily rotation, keeping the latest 5 files.
/// - Console output (stderr), since stdout carries the JSON-line protocol.
/// - Environment filter: defaults to `info`, configurable via `RUST_LOG`.
///
/// Fails if a global subscriber is already installed. If the log directory
/// cannot be used, logging continues on stderr only.
pub fn init() -> anyhow::Result<()> {
    let log_dir = paths::get_log_dir();
    let _ = fs::create_dir_all(&log_dir);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .with_target(true)
        .compact();

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("gesticulate")
        .filename_suffix("log")
        .max_log_files(5)
        .build(&log_dir);

    // File layer: plain text with source locations. Absent if the directory
    // is unusable; `Option<Layer>` is itself a layer.
    let (file_layer, file_error) = match appender {
        Ok(file_appender) => {
            let layer = fmt::layer()
                .with_writer(file_appender)
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(false)
                .with_file(true)
                .with_line_number(true);
            (Some(layer), None)
        }
        Err(e) => (None, Some(e)),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(console_layer)
        .try_init()?;

    match file_error {
        None => tracing::info!(log_dir = %log_dir.display(), "Logger initialized"),
        Some(e) => tracing::warn!(
            log_dir = %log_dir.display(),
            error = %e,
            "File logging unavailable, using stderr only"
        ),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_is_an_error_not_a_panic() {
        // The first call fails if a subscriber is already installed; either
        // way one is installed afterwards.
        let _ = init();
        assert!(init().is_err());
    }
}
