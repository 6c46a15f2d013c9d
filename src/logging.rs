//! Daybook logging system
//!
//! Structured logging through `tracing`. CLI output stays on stdout, so log
//! lines go to stderr, or to a rolling file when the server runs detached.

use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};
use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

use crate::config::daybook_home;

/// Logging configuration options
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Minimum log level to output
    pub level: Level,
    /// Enable colored output
    pub color: bool,
    /// Show timestamps
    pub show_timestamps: bool,
    /// Show target/module name
    pub show_target: bool,
    /// Enable JSON format for machine parsing
    pub json_format: bool,
    /// Enable span events for tracing
    pub enable_spans: bool,
    /// Output to a daily-rotated file instead of stderr
    pub file_output: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self::for_mode(ApplicationMode::Cli)
    }
}

impl LoggingConfig {
    /// Create config for different application modes
    pub fn for_mode(mode: ApplicationMode) -> Self {
        match mode {
            ApplicationMode::Server => Self {
                level: Level::INFO,
                color: false,
                show_timestamps: true,
                show_target: true,
                json_format: false,
                enable_spans: true,
                file_output: None,
            },
            ApplicationMode::Cli => Self {
                level: Level::WARN,
                color: io::stderr().is_terminal(),
                show_timestamps: false,
                show_target: false,
                json_format: false,
                enable_spans: false,
                file_output: None,
            },
            ApplicationMode::Test => Self {
                level: Level::DEBUG,
                color: false,
                show_timestamps: true,
                show_target: true,
                json_format: false,
                enable_spans: true,
                file_output: None,
            },
        }
    }

    /// Create config from CLI arguments
    pub fn from_args(quiet: bool, verbose: bool, json: bool) -> Self {
        let level = if verbose {
            Level::DEBUG
        } else if quiet {
            Level::ERROR
        } else {
            Level::WARN
        };

        Self {
            level,
            color: !quiet && !json && io::stderr().is_terminal(),
            show_timestamps: verbose || json,
            show_target: verbose,
            json_format: json,
            enable_spans: verbose,
            file_output: None,
        }
    }
}

/// Application modes with different logging requirements
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplicationMode {
    /// REST server - detailed, request-level
    Server,
    /// CLI mode - only warnings unless asked
    Cli,
    /// Test mode - maximum detail for testing
    Test,
}

/// Initialize the logging system
pub fn init_logging(config: LoggingConfig) -> io::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "daybook={level},tower_http={level}",
            level = config.level
        ))
    });

    let registry = Registry::default().with(env_filter);

    if let Some(log_file) = config.file_output {
        let file_appender = tracing_appender::rolling::daily(
            log_file.parent().ok_or_else(|| {
                io::Error::new(io::ErrorKind::InvalidInput, "Invalid log file path")
            })?,
            log_file.file_name().ok_or_else(|| {
                io::Error::new(io::ErrorKind::InvalidInput, "Invalid log file name")
            })?,
        );

        if config.json_format {
            let json_layer = fmt::layer()
                .json()
                .with_current_span(config.enable_spans)
                .with_span_events(FmtSpan::CLOSE)
                .with_writer(file_appender);
            json_layer.with_subscriber(registry).try_init().map_err(io::Error::other)?;
        } else {
            let fmt_layer = fmt::layer()
                .with_target(config.show_target)
                .with_level(true)
                .with_ansi(false)
                .with_writer(file_appender);

            if config.show_timestamps {
                fmt_layer
                    .with_timer(fmt::time::ChronoUtc::rfc_3339())
                    .with_subscriber(registry)
                    .try_init()
                    .map_err(io::Error::other)?;
            } else {
                fmt_layer
                    .with_subscriber(registry)
                    .try_init()
                    .map_err(io::Error::other)?;
            }
        }
    } else if config.json_format {
        let json_layer = fmt::layer()
            .json()
            .with_current_span(config.enable_spans)
            .with_span_events(FmtSpan::CLOSE)
            .with_writer(io::stderr);
        json_layer.with_subscriber(registry).try_init().map_err(io::Error::other)?;
    } else {
        let fmt_layer = fmt::layer()
            .with_target(config.show_target)
            .with_level(true)
            .with_ansi(config.color)
            .with_writer(io::stderr);

        if config.show_timestamps {
            fmt_layer
                .with_timer(fmt::time::ChronoUtc::rfc_3339())
                .with_subscriber(registry)
                .try_init()
                .map_err(io::Error::other)?;
        } else {
            fmt_layer
                .with_subscriber(registry)
                .try_init()
                .map_err(io::Error::other)?;
        }
    }

    Ok(())
}

/// Clean up old log files based on retention policy
///
/// Only rotated files (`<name>.log.YYYY-MM-DD`) older than `retention_days`
/// are removed.
///
/// # Example
/// ```no_run
/// use std::path::Path;
/// use daybook::logging::cleanup_old_logs;
///
/// let log_dir = Path::new("/home/user/.daybook/logs");
/// cleanup_old_logs(log_dir, 7).ok();
/// ```
pub fn cleanup_old_logs(log_dir: &Path, retention_days: u32) -> io::Result<usize> {
    use std::fs;
    use std::time::{Duration, SystemTime};

    if !log_dir.exists() {
        return Ok(0);
    }

    let now = SystemTime::now();
    let retention = Duration::from_secs(u64::from(retention_days) * 24 * 60 * 60);

    let mut cleaned_count = 0;
    let mut cleaned_size: u64 = 0;

    for entry in fs::read_dir(log_dir)? {
        let entry = entry?;
        let path = entry.path();

        let is_rotated = path
            .file_name()
            .map(|name| name.to_string_lossy().contains(".log."))
            .unwrap_or(false);
        if !is_rotated || !path.is_file() {
            continue;
        }

        let metadata = entry.metadata()?;
        let Ok(age) = now.duration_since(metadata.modified()?) else {
            continue;
        };
        if age <= retention {
            continue;
        }

        match fs::remove_file(&path) {
            Ok(()) => {
                cleaned_count += 1;
                cleaned_size += metadata.len();
                tracing::info!(
                    "Cleaned up old log file: {} (age: {} days)",
                    path.display(),
                    age.as_secs() / 86400
                );
            },
            Err(e) => {
                tracing::warn!("Failed to remove old log file {}: {}", path.display(), e);
            },
        }
    }

    if cleaned_count > 0 {
        tracing::info!(
            "Log cleanup completed: removed {} files, freed {} bytes",
            cleaned_count,
            cleaned_size
        );
    }

    Ok(cleaned_count)
}

/// Directory holding daybook's log files
pub fn log_dir() -> PathBuf {
    daybook_home().join("logs")
}

/// Get log file path for a given application mode
pub fn log_file_path(mode: ApplicationMode) -> io::Result<PathBuf> {
    let dir = log_dir();
    std::fs::create_dir_all(&dir)?;

    Ok(match mode {
        ApplicationMode::Server => dir.join("server.log"),
        ApplicationMode::Cli => dir.join("cli.log"),
        ApplicationMode::Test => dir.join("test.log"),
    })
}

/// Log macro for task mutations
#[macro_export]
macro_rules! log_task_operation {
    ($operation:expr, $task_id:expr) => {
        tracing::info!(operation = $operation, task_id = $task_id, "Task operation");
    };
    ($operation:expr, $task_id:expr, $details:expr) => {
        tracing::info!(
            operation = $operation,
            task_id = $task_id,
            details = %$details,
            "Task operation"
        );
    };
}

/// Utility macro for structured error logging
#[macro_export]
macro_rules! log_error {
    ($error:expr, $context:expr) => {
        tracing::error!(
            error = %$error,
            context = $context,
            "Operation failed"
        );
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_mode_presets() {
        let server = LoggingConfig::for_mode(ApplicationMode::Server);
        assert_eq!(server.level, Level::INFO);
        assert!(server.show_timestamps);
        assert!(!server.color);

        let test = LoggingConfig::for_mode(ApplicationMode::Test);
        assert_eq!(test.level, Level::DEBUG);
    }

    #[test]
    fn test_from_args_levels() {
        assert_eq!(LoggingConfig::from_args(false, true, false).level, Level::DEBUG);
        assert_eq!(LoggingConfig::from_args(true, false, false).level, Level::ERROR);

        let json = LoggingConfig::from_args(false, false, true);
        assert!(json.json_format);
        assert!(!json.color);
    }

    #[test]
    fn test_cleanup_only_touches_rotated_files() {
        let temp = TempDir::new().unwrap();
        let current = temp.path().join("server.log");
        let rotated = temp.path().join("server.log.2024-01-01");
        let other = temp.path().join("notes.txt");
        for path in [&current, &rotated, &other] {
            fs::write(path, "line\n").unwrap();
        }
        std::thread::sleep(std::time::Duration::from_millis(20));

        let removed = cleanup_old_logs(temp.path(), 0).unwrap();

        assert_eq!(removed, 1);
        assert!(current.exists());
        assert!(!rotated.exists());
        assert!(other.exists());
    }

    #[test]
    fn test_cleanup_keeps_recent_files() {
        let temp = TempDir::new().unwrap();
        let rotated = temp.path().join("server.log.2024-01-01");
        fs::write(&rotated, "line\n").unwrap();

        assert_eq!(cleanup_old_logs(temp.path(), 7).unwrap(), 0);
        assert!(rotated.exists());
    }

    #[test]
    fn test_cleanup_missing_dir() {
        let temp = TempDir::new().unwrap();
        assert_eq!(cleanup_old_logs(&temp.path().join("nope"), 7).unwrap(), 0);
    }
}
