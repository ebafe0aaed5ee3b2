//! PlanGenie logging
//!
//! Structured logging through `tracing`. The level and output format depend
//! on how the binary is running (HTTP server, one-shot CLI, tests).

use std::io::{self, IsTerminal};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

/// Logging configuration options
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Minimum log level to output
    pub level: Level,
    pub color: bool,
    pub show_timestamps: bool,
    /// Show target/module name
    pub show_target: bool,
    /// JSON lines, one event per line
    pub json_format: bool,
    pub enable_spans: bool,
    /// Write to this file instead of stderr
    pub file_output: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self::for_mode(ApplicationMode::Cli)
    }
}

impl LoggingConfig {
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

    /// Create config from CLI flags
    pub fn from_args(quiet: bool, verbose: bool, json: bool) -> Self {
        let level = if verbose {
            Level::DEBUG
        } else if quiet {
            Level::ERROR
        } else {
            Level::INFO
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

    pub fn with_file_output(mut self, path: Option<PathBuf>) -> Self {
        self.file_output = path;
        self
    }
}

/// Application modes with different logging requirements
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplicationMode {
    /// Long-running HTTP server
    Server,
    /// One-shot command; stdout is reserved for command output
    Cli,
    Test,
}

/// Default `EnvFilter` directive when `RUST_LOG` is unset
fn default_directive(level: Level) -> String {
    format!("plangenie={},tower_http={}", level, level)
}

/// Initialize the global subscriber. Logs go to stderr (or a file) so that
/// CLI output on stdout stays machine-readable.
pub fn init_logging(config: LoggingConfig) -> io::Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(config.level)));

    let registry = Registry::default().with(env_filter);

    if let Some(log_file) = config.file_output {
        let dir = log_file
            .parent()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "Invalid log file path"))?;
        let name = log_file
            .file_name()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "Invalid log file name"))?;
        std::fs::create_dir_all(dir)?;
        let file_appender = tracing_appender::rolling::daily(dir, name);

        if config.json_format {
            fmt::layer()
                .json()
                .with_current_span(config.enable_spans)
                .with_span_events(FmtSpan::CLOSE)
                .with_writer(file_appender)
                .with_subscriber(registry)
                .try_init()
                .map_err(io::Error::other)?;
        } else {
            fmt::layer()
                .with_target(config.show_target)
                .with_ansi(false)
                .with_timer(fmt::time::ChronoUtc::rfc_3339())
                .with_writer(file_appender)
                .with_subscriber(registry)
                .try_init()
                .map_err(io::Error::other)?;
        }
    } else if config.json_format {
        fmt::layer()
            .json()
            .with_current_span(config.enable_spans)
            .with_span_events(FmtSpan::CLOSE)
            .with_writer(io::stderr)
            .with_subscriber(registry)
            .try_init()
            .map_err(io::Error::other)?;
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
                .without_time()
                .with_subscriber(registry)
                .try_init()
                .map_err(io::Error::other)?;
        }
    }

    Ok(())
}

/// Read `PLANGENIE_LOG_JSON`, `PLANGENIE_LOG_VERBOSE` and `PLANGENIE_LOG_QUIET`
/// on top of the mode defaults.
pub fn config_from_env(mode: ApplicationMode) -> LoggingConfig {
    let flag = |name: &str| std::env::var(name).as_deref() == Ok("true");

    let json = flag("PLANGENIE_LOG_JSON");
    let verbose = flag("PLANGENIE_LOG_VERBOSE");
    let quiet = flag("PLANGENIE_LOG_QUIET");

    if json || verbose || quiet {
        LoggingConfig::from_args(quiet, verbose, json)
    } else {
        LoggingConfig::for_mode(mode)
    }
}

/// Structured log line for suggestion lifecycle events
#[macro_export]
macro_rules! log_suggestion_operation {
    ($operation:expr, $suggestion_id:expr) => {
        tracing::info!(
            operation = $operation,
            suggestion_id = %$suggestion_id,
            "Suggestion operation"
        );
    };
    ($operation:expr, $suggestion_id:expr, $details:expr) => {
        tracing::info!(
            operation = $operation,
            suggestion_id = %$suggestion_id,
            details = $details,
            "Suggestion operation"
        );
    };
}
