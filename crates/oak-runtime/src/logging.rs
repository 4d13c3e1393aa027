use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::MakeWriterExt;

use crate::config::LogConfig;
use crate::{Error, Result};

/// Install the daemon's tracing subscriber: env-filtered, stderr for the
/// operator plus a rotated file under `<data_dir>/logs/`. The returned
/// guard must live as long as the process or buffered lines are lost.
pub fn init_logging(data_dir: &Path, config: &LogConfig) -> Result<WorkerGuard> {
    let log_dir = data_dir.join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let appender = rolling::Builder::new()
        .rotation(rolling::Rotation::DAILY)
        .filename_prefix("oakd")
        .filename_suffix("log")
        .max_log_files(config.max_files.max(1))
        .build(&log_dir)
        .map_err(|err| Error::Config(format!("log appender: {}", err)))?;
    let (file_writer, guard) = tracing_appender::non_blocking(appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(file_writer.and(std::io::stderr))
        .with_ansi(false)
        .init();

    Ok(guard)
}
