use std::{
    fs::{self, DirEntry},
    io,
    path::{Path, PathBuf},
    time::{Duration, SystemTime},
};

use anyhow::{Context, Result, anyhow};
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling::{self, RollingFileAppender},
};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, Layer, filter::LevelFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt,
};
use uuid::Uuid;

use crate::config::{Config, LoggingRotation, StderrLevel};

/// Which binary is logging. The server and the viewer may share a log
/// directory, so each writes and purges its own file prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayProcess {
    Server,
    Viewer,
}

impl GatewayProcess {
    pub fn as_str(self) -> &'static str {
        match self {
            GatewayProcess::Server => "server",
            GatewayProcess::Viewer => "viewer",
        }
    }

    pub fn file_prefix(self) -> &'static str {
        match self {
            GatewayProcess::Server => "infergate.log",
            GatewayProcess::Viewer => "infergate-viewer.log",
        }
    }
}

pub struct LoggingGuard {
    _worker_guard: WorkerGuard,
    run_id: String,
}

impl LoggingGuard {
    pub fn run_id(&self) -> &str {
        &self.run_id
    }
}

pub fn init_tracing(config: &Config, process: GatewayProcess) -> Result<LoggingGuard> {
    let logging = &config.logging;
    if logging.filter.trim().is_empty() {
        return Err(anyhow!("logging.filter cannot be empty"));
    }
    if logging.dir.as_os_str().is_empty() {
        return Err(anyhow!("logging.dir cannot be empty"));
    }

    let log_dir = resolve_log_dir(&logging.dir)?;
    fs::create_dir_all(&log_dir)
        .with_context(|| format!("failed to create logging directory {}", log_dir.display()))?;

    let file_prefix = process.file_prefix();
    let purge_warnings = purge_old_log_files(&log_dir, file_prefix, logging.retention_days);
    let appender = build_rolling_appender(&log_dir, file_prefix, &logging.rotation);
    let (writer, worker_guard) = tracing_appender::non_blocking(appender);

    let file_layer = fmt::layer()
        .json()
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .with_target(true)
        .with_current_span(true)
        .with_ansi(false)
        .with_writer(writer)
        .with_filter(build_env_filter(&logging.filter)?);

    let stderr_layer = stderr_level_filter(logging.stderr_level).map(|level| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_filter(level)
    });

    tracing_subscriber::registry()
        .with(ErrorLayer::default())
        .with(file_layer)
        .with(stderr_layer)
        .try_init()
        .context("failed to initialize tracing subscriber")?;

    let run_id = Uuid::now_v7().to_string();
    tracing::info!(
        target: "logging",
        run_id = %run_id,
        process = process.as_str(),
        bind_address = %config.server.bind_address,
        counter_store = config.counter_store.backend_name(),
        structured_log = config.structured_log.backend_name(),
        unstructured_log = config.unstructured_log.backend_name(),
        dir = %log_dir.display(),
        filter = %logging.filter,
        "logging_initialized"
    );
    for warning in purge_warnings {
        tracing::warn!(target: "logging", process = process.as_str(), warning = %warning, "log_purge_warning");
    }

    Ok(LoggingGuard {
        _worker_guard: worker_guard,
        run_id,
    })
}

fn stderr_level_filter(level: StderrLevel) -> Option<LevelFilter> {
    match level {
        StderrLevel::Off => None,
        StderrLevel::Error => Some(LevelFilter::ERROR),
        StderrLevel::Warn => Some(LevelFilter::WARN),
        StderrLevel::Info => Some(LevelFilter::INFO),
        StderrLevel::Debug => Some(LevelFilter::DEBUG),
    }
}

fn build_env_filter(filter: &str) -> Result<EnvFilter> {
    EnvFilter::try_new(filter)
        .with_context(|| format!("failed to parse logging.filter '{}'", filter))
}

fn build_rolling_appender(
    log_dir: &Path,
    file_prefix: &str,
    rotation: &LoggingRotation,
) -> RollingFileAppender {
    match rotation {
        LoggingRotation::Daily => rolling::daily(log_dir, file_prefix),
        LoggingRotation::Hourly => rolling::hourly(log_dir, file_prefix),
    }
}

fn resolve_log_dir(dir: &Path) -> Result<PathBuf> {
    if dir.is_absolute() {
        return Ok(dir.to_path_buf());
    }

    Ok(std::env::current_dir()
        .context("failed to read current working directory for logging.dir resolution")?
        .join(dir))
}

fn purge_old_log_files(log_dir: &Path, prefix: &str, retention_days: usize) -> Vec<String> {
    purge_old_log_files_at(log_dir, prefix, retention_days, SystemTime::now())
}

/// Removes this process's rotated files last modified before the retention
/// window. Problems are returned as warnings.
fn purge_old_log_files_at(
    log_dir: &Path,
    prefix: &str,
    retention_days: usize,
    now: SystemTime,
) -> Vec<String> {
    let window = Duration::from_secs((retention_days as u64).saturating_mul(86_400));
    let cutoff = now.checked_sub(window).unwrap_or(SystemTime::UNIX_EPOCH);

    let entries = match fs::read_dir(log_dir) {
        Ok(entries) => entries,
        Err(err) => return vec![format!("cannot scan {}: {err}", log_dir.display())],
    };

    entries
        .flatten()
        .filter(|entry| entry.file_name().to_string_lossy().starts_with(prefix))
        .filter_map(|entry| match expired_file(&entry, cutoff) {
            Ok(Some(path)) => fs::remove_file(&path)
                .err()
                .map(|err| format!("cannot remove {}: {err}", path.display())),
            Ok(None) => None,
            Err(err) => Some(format!("cannot stat {}: {err}", entry.path().display())),
        })
        .collect()
}

fn expired_file(entry: &DirEntry, cutoff: SystemTime) -> io::Result<Option<PathBuf>> {
    let metadata = entry.metadata()?;
    if !metadata.is_file() || metadata.modified()? > cutoff {
        return Ok(None);
    }
    Ok(Some(entry.path()))
}
