//! Diagnostic logging setup.
//!
//! The binary prints snapshots on stdout, so every diagnostic line goes to
//! stderr and, optionally, a daily-rolling file. Configuration starts from
//! `MACHMETRICS_LOG_*` environment variables with CLI flags layered on top;
//! a set `RUST_LOG` overrides both.

use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::Dispatch;
use tracing_subscriber::{
    EnvFilter, fmt,
    fmt::writer::{BoxMakeWriter, MakeWriterExt},
};

/// Diagnostic line rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Multi-line human-oriented output.
    Pretty,
    /// One JSON object per event.
    Json,
    /// Terse single-line output.
    Compact,
}

impl LogFormat {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pretty" => Some(Self::Pretty),
            "json" => Some(Self::Json),
            "compact" => Some(Self::Compact),
            _ => None,
        }
    }
}

/// Diagnostic output configuration.
///
/// Collected from the environment via [`LogConfig::from_env`] and adjusted
/// through the builder methods before [`init_logging`] installs the
/// subscriber.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Base level directive (trace, debug, info, warn, error or off).
    pub level: String,
    /// Line rendering for all sinks.
    pub format: LogFormat,
    /// Rolling file to tee diagnostics into alongside stderr.
    pub file_path: Option<PathBuf>,
    /// Per-target level overrides, applied on top of `level`.
    pub targets: BTreeMap<String, String>,
    /// Annotate each line with the emitting target.
    pub with_target: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            file_path: None,
            targets: BTreeMap::new(),
            with_target: true,
        }
    }
}

impl LogConfig {
    /// Build a logging configuration from environment variables.
    ///
    /// Supported environment variables:
    /// - MACHMETRICS_LOG_LEVEL
    /// - MACHMETRICS_LOG_FORMAT (pretty|json|compact)
    /// - MACHMETRICS_LOG_FILE (path to rotating log file)
    /// - MACHMETRICS_LOG_TARGETS (comma-separated target=level list)
    ///
    /// Blank values count as unset.
    pub fn from_env(default_level: &str) -> Self {
        let defaults = Self::default();
        Self {
            level: env_value("MACHMETRICS_LOG_LEVEL")
                .unwrap_or_else(|| default_level.to_string()),
            format: env_value("MACHMETRICS_LOG_FORMAT")
                .as_deref()
                .and_then(LogFormat::parse)
                .unwrap_or(defaults.format),
            file_path: env_value("MACHMETRICS_LOG_FILE").map(PathBuf::from),
            targets: env_value("MACHMETRICS_LOG_TARGETS")
                .map(|value| parse_target_overrides(&value))
                .unwrap_or_default(),
            with_target: defaults.with_target,
        }
    }

    /// Override the base log level.
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    /// Override the output format.
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Also write logs to a rotating file.
    pub fn with_log_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file_path = Some(path.into());
        self
    }

    /// Build the effective EnvFilter, honoring RUST_LOG if set.
    pub fn env_filter(&self) -> EnvFilter {
        if let Ok(filter) = EnvFilter::try_from_default_env() {
            return filter;
        }

        let directives = std::iter::once(self.level.clone())
            .chain(
                self.targets
                    .iter()
                    .map(|(target, level)| format!("{target}={level}")),
            )
            .collect::<Vec<_>>()
            .join(",");
        EnvFilter::new(directives)
    }
}

/// Keeps the non-blocking file writer's worker thread alive.
///
/// Dropping this flushes and stops file logging, so hold it for the life
/// of the process.
pub struct LoggingGuards {
    _file_guard: Option<tracing_appender::non_blocking::WorkerGuard>,
}

/// Install the process-wide tracing subscriber.
///
/// Diagnostics never share stdout with snapshot output; they land on
/// stderr, teed into a daily-rolling file when one is configured.
pub fn init_logging(config: &LogConfig) -> Result<LoggingGuards> {
    let (writer, file_guard) = diagnostic_writer(config.file_path.as_deref());
    // The file copy shares the console formatter, so color stays off
    // whenever a file is attached.
    let ansi = file_guard.is_none();

    let builder = fmt::Subscriber::builder()
        .with_writer(writer)
        .with_target(config.with_target)
        .with_env_filter(config.env_filter());

    let dispatch = match config.format {
        LogFormat::Pretty => Dispatch::new(builder.with_ansi(ansi).pretty().finish()),
        LogFormat::Json => Dispatch::new(builder.with_ansi(false).json().finish()),
        LogFormat::Compact => Dispatch::new(builder.with_ansi(ansi).compact().finish()),
    };

    // A repeat init keeps the first subscriber; only the guards matter
    // then. Tests and library embedders take this path.
    let _ = tracing::dispatcher::set_global_default(dispatch);
    Ok(LoggingGuards {
        _file_guard: file_guard,
    })
}

fn diagnostic_writer(
    file: Option<&Path>,
) -> (
    BoxMakeWriter,
    Option<tracing_appender::non_blocking::WorkerGuard>,
) {
    // stdout belongs to snapshot output; diagnostics stay on stderr.
    let Some(path) = file else {
        return (BoxMakeWriter::new(std::io::stderr), None);
    };

    let (file_writer, guard) = rolling_appender(path);
    let writer = BoxMakeWriter::new(std::io::stderr.and(file_writer));
    (writer, Some(guard))
}

fn rolling_appender(
    path: &Path,
) -> (
    tracing_appender::non_blocking::NonBlocking,
    tracing_appender::non_blocking::WorkerGuard,
) {
    let dir = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .unwrap_or_else(|| OsStr::new("machmetrics.log"));
    tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, file_name))
}

fn parse_target_overrides(value: &str) -> BTreeMap<String, String> {
    value
        .split(',')
        .filter_map(|entry| {
            let (target, level) = entry.split_once('=')?;
            let target = target.trim();
            let level = level.trim().to_ascii_lowercase();
            (!target.is_empty() && is_valid_level(&level)).then(|| (target.to_string(), level))
        })
        .collect()
}

fn is_valid_level(level: &str) -> bool {
    matches!(level, "trace" | "debug" | "info" | "warn" | "error" | "off")
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .filter(|value| !value.trim().is_empty())
}
