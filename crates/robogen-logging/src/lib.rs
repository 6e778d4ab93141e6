//! # robogen-logging
//!
//! Logging for the robogen code generation pipeline.
//!
//! ## Key Types
//!
//! - [`Logger`] - Structured pipeline event logging
//! - [`LogEvent`] - Log event types
//! - [`LogFormat`] - Output formats (Pretty, JSON, Compact)
//! - [`SessionWriter`] - One JSONL record file per pipeline run
//!
//! ## Log Formats
//!
//! - `Pretty` - Human-readable colored output
//! - `JSON` - Structured JSON lines
//! - `Compact` - Minimal text output

mod events;
mod session;

pub use events::{LogEvent, LogFormat, Logger};
pub use session::{SessionLine, SessionModels, SessionWriter};

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize tracing for the application
pub fn init_tracing(level: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_target(false).with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Pretty | LogFormat::Compact => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
                .init();
        }
    }
}

/// Initialize tracing with an additional daily-rolling JSON log file in `log_dir`.
///
/// Keep the returned guard alive for the lifetime of the program so buffered lines
/// are flushed.
pub fn init_tracing_with_dir(level: &str, format: LogFormat, log_dir: &Path) -> WorkerGuard {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let appender = tracing_appender::rolling::daily(log_dir, "robogen.log");
    let (file_writer, guard) = tracing_appender::non_blocking(appender);
    let file_layer = fmt::layer()
        .json()
        .with_target(false)
        .with_ansi(false)
        .with_writer(file_writer);

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(file_layer)
                .with(fmt::layer().json().with_target(false).with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Pretty | LogFormat::Compact => {
            tracing_subscriber::registry()
                .with(filter)
                .with(file_layer)
                .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
                .init();
        }
    }

    guard
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    // Installs the global subscriber, so this is the only test in the crate that may do so
    #[test]
    fn test_log_dir_receives_json_lines() {
        let dir = TempDir::new().unwrap();
        let guard = init_tracing_with_dir("info", LogFormat::Compact, dir.path());

        tracing::warn!(iteration = 1, "rolling file check");
        drop(guard);

        let files: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .collect();
        assert_eq!(files.len(), 1);
        assert!(files[0]
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("robogen.log"));

        let content = std::fs::read_to_string(&files[0]).unwrap();
        let line: serde_json::Value = serde_json::from_str(content.lines().next().unwrap()).unwrap();
        assert_eq!(line["fields"]["message"], "rolling file check");
        assert_eq!(line["fields"]["iteration"], 1);
    }
}
