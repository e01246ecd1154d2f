//! Tracing setup: stderr plus an optional daily log file.

use crate::config::LogConfig;
use std::io;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::{EnvFilter, LevelFilter};
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const LOG_FILE_PREFIX: &str = "ngira";

/// Installs the global subscriber. `RUST_LOG` takes precedence over the
/// configured level. Keep the returned guard alive until exit so buffered
/// file output is flushed.
pub fn init(config: &LogConfig, data_dir: &Path) -> Option<WorkerGuard> {
    let default_level = config.level.parse().unwrap_or(LevelFilter::INFO);
    let env_filter = EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env_lossy();

    let mut guard = None;
    let writer = if config.file {
        let appender = RollingFileAppender::builder()
            .rotation(Rotation::DAILY)
            .filename_prefix(LOG_FILE_PREFIX)
            .filename_suffix("log")
            .max_log_files(14)
            .build(data_dir.join("logs"));
        match appender {
            Ok(appender) => {
                let (non_blocking, worker_guard) = tracing_appender::non_blocking(appender);
                guard = Some(worker_guard);
                let stderr = io::stderr.with_max_level(tracing::Level::WARN);
                BoxMakeWriter::new(stderr.and(non_blocking))
            }
            Err(e) => {
                eprintln!("warning: log file disabled: {e}");
                BoxMakeWriter::new(io::stderr)
            }
        }
    } else {
        BoxMakeWriter::new(io::stderr)
    };

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(writer);
    let registry = tracing_subscriber::registry().with(env_filter);
    let result = if config.json {
        registry.with(fmt_layer.json().flatten_event(true)).try_init()
    } else {
        registry.with(fmt_layer.compact()).try_init()
    };
    if let Err(e) = result {
        tracing::warn!("tracing subscriber has already been initialized: {e}");
    }
    guard
}

/// Plain stderr output for failures that happen before the configuration,
/// and with it the log settings, could be read.
pub fn init_stderr() {
    let _ = tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(io::stderr)
        .compact()
        .try_init();
}
