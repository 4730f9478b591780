use anyhow::Result;
use std::path::Path;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::fmt::format::{DefaultFields, Format};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// fmt layer writing to the append-only log file.
pub type FileLayer<S> = fmt::Layer<S, DefaultFields, Format, NonBlocking>;

/// Installs the global subscriber: human-readable lines on stdout and, when
/// `log_file` is set, the same lines appended to that file without ANSI
/// colours.
///
/// The returned guard flushes the file writer on drop and must be held until
/// the process exits.
pub fn init(log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::from_default_env().add_directive("hostmon=info".parse()?);

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let (layer, guard) = file_layer(path)?;
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .with(file_layer)
        .try_init()?;

    Ok(guard)
}

/// Builds the file layer for `path`, creating its directory if needed.
/// Existing content is kept; the file is never rotated.
pub fn file_layer<S>(path: &Path) -> Result<(FileLayer<S>, WorkerGuard)> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;
    let file_name = path
        .file_name()
        .ok_or_else(|| anyhow::anyhow!("log file path has no file name: {}", path.display()))?;

    let appender = tracing_appender::rolling::never(dir, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(false);
    Ok((layer, guard))
}
