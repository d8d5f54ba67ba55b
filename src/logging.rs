//! Tracing subscriber setup.

use std::path::PathBuf;

use confirma_core::{config::ServiceConfig, shellexpand};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::EnvFilter;

/// `RUST_LOG` wins; otherwise the configured level.
fn env_filter(config: &ServiceConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level))
}

fn rolling_file_writer(config: &ServiceConfig) -> Option<(BoxMakeWriter, WorkerGuard)> {
    let dir = config.log_dir.as_deref()?.trim();
    if dir.is_empty() {
        return None;
    }
    let dir = PathBuf::from(shellexpand(dir));
    if let Err(e) = std::fs::create_dir_all(&dir) {
        eprintln!("cannot create log dir {}: {e}; logging to stdout", dir.display());
        return None;
    }

    let appender = tracing_appender::rolling::daily(dir, format!("{}.log", config.name));
    let (writer, guard) = tracing_appender::non_blocking(appender);
    Some((BoxMakeWriter::new(writer), guard))
}

/// Install the global subscriber. Keep the returned guard alive for the
/// process lifetime or buffered file output is lost.
pub fn init(config: &ServiceConfig) -> Option<WorkerGuard> {
    let builder = tracing_subscriber::fmt().with_env_filter(env_filter(config));

    match rolling_file_writer(config) {
        Some((writer, guard)) => {
            let _ = builder.with_ansi(false).with_writer(writer).try_init();
            Some(guard)
        }
        None => {
            let _ = builder.try_init();
            None
        }
    }
}
