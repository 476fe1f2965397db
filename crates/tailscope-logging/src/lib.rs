//! Structured logging setup for Tailscope hosts
//!
//! The engine and transport only emit `tracing` events; this crate is what a
//! host binary calls once at startup to decide where those events go.
//!
//! # Features
//!
//! - **JSONL Output**: one JSON object per line on the console (default)
//! - **Pretty Output**: human-readable console format for development
//! - **File Output**: JSONL files with daily/hourly rotation via tracing-appender
//! - **RUST_LOG**: overrides the configured default level
//!
//! # Quick Start
//!
//! ```ignore
//! use tailscope_logging::{LogConfig, TailscopeSubscriberBuilder};
//!
//! // JSONL to stderr
//! TailscopeSubscriberBuilder::new().init();
//!
//! // Pretty output while developing
//! let _guard = TailscopeSubscriberBuilder::new()
//!     .with_config(LogConfig::development())
//!     .init();
//! ```

pub mod config;

pub use config::{ConsoleConfig, FileConfig, JsonlConfig, LogConfig, RotationStrategy};

use std::fs::{self, File};
use std::path::PathBuf;

use thiserror::Error;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::Layered;
use tracing_subscriber::{EnvFilter, Layer, Registry, layer::SubscriberExt, util::SubscriberInitExt};

/// Standard span names shared by hosts
pub mod spans {
    /// One tailing engine instance
    pub const ENGINE: &str = "engine";
    /// A host session driving one or more engines
    pub const SESSION: &str = "session";
}

/// Errors from logging initialization
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Invalid log level directive '{level}': {reason}")]
    InvalidLevel { level: String, reason: String },

    #[error("Failed to open log file {path}: {source}")]
    LogFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create rolling appender: {0}")]
    Appender(String),

    #[error("A global subscriber is already set: {0}")]
    AlreadyInitialized(String),
}

type Base = Layered<EnvFilter, Registry>;
type BoxedLayer = Box<dyn Layer<Base> + Send + Sync>;

/// Builder for configuring and initializing the global subscriber
///
/// By default, console output uses JSONL on stderr. Use
/// [`LogConfig::development`] for pretty output.
pub struct TailscopeSubscriberBuilder {
    config: LogConfig,
}

impl TailscopeSubscriberBuilder {
    pub fn new() -> Self {
        Self {
            config: LogConfig::default(),
        }
    }

    pub fn with_config(mut self, config: LogConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the default level directive, e.g. `"debug"` or `"tailscope_engine=trace"`
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.config.default_level = level.into();
        self
    }

    pub fn with_console(mut self, enabled: bool) -> Self {
        self.config.console.enabled = enabled;
        self
    }

    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.config.console.pretty = pretty;
        self
    }

    pub fn with_file_output(mut self, config: FileConfig) -> Self {
        self.config.file = Some(config);
        self
    }

    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    /// Install the subscriber globally
    ///
    /// The returned guard flushes file output when dropped and must be kept
    /// alive for the life of the program.
    pub fn try_init(self) -> Result<Option<WorkerGuard>, LoggingError> {
        let env_filter = match EnvFilter::try_from_default_env() {
            Ok(filter) => filter,
            Err(_) => EnvFilter::try_new(&self.config.default_level).map_err(|e| {
                LoggingError::InvalidLevel {
                    level: self.config.default_level.clone(),
                    reason: e.to_string(),
                }
            })?,
        };

        let mut layers: Vec<BoxedLayer> = Vec::new();
        let mut guard = None;

        if self.config.console.enabled {
            layers.push(console_layer(&self.config));
        }

        if let Some(file_config) = &self.config.file {
            let (writer, file_guard) = file_writer(file_config)?;
            guard = Some(file_guard);
            layers.push(jsonl_layer(&self.config.jsonl, writer));
        }

        Registry::default()
            .with(env_filter)
            .with(layers)
            .try_init()
            .map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))?;

        Ok(guard)
    }

    /// Like [`try_init`](Self::try_init), but prints a warning instead of
    /// failing
    pub fn init(self) -> Option<WorkerGuard> {
        match self.try_init() {
            Ok(guard) => guard,
            Err(e) => {
                eprintln!("Warning: Failed to initialize logging: {}", e);
                None
            }
        }
    }
}

impl Default for TailscopeSubscriberBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn jsonl_layer<W>(jsonl: &JsonlConfig, writer: W) -> BoxedLayer
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    tracing_subscriber::fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(jsonl.include_spans)
        .flatten_event(jsonl.flatten_events)
        .with_file(jsonl.include_location)
        .with_line_number(jsonl.include_location)
        .with_writer(writer)
        .boxed()
}

fn console_layer(config: &LogConfig) -> BoxedLayer {
    let console = &config.console;
    match (console.pretty, console.stderr) {
        (true, true) => tracing_subscriber::fmt::layer()
            .with_ansi(console.ansi)
            .with_target(true)
            .with_writer(std::io::stderr)
            .boxed(),
        (true, false) => tracing_subscriber::fmt::layer()
            .with_ansi(console.ansi)
            .with_target(true)
            .with_writer(std::io::stdout)
            .boxed(),
        (false, true) => jsonl_layer(&config.jsonl, std::io::stderr),
        (false, false) => jsonl_layer(&config.jsonl, std::io::stdout),
    }
}

/// Open the file writer; `Never` truncates a single file, the others roll
fn file_writer(file_config: &FileConfig) -> Result<(NonBlocking, WorkerGuard), LoggingError> {
    let rotation = match file_config.rotation {
        RotationStrategy::Never => {
            let path = file_config
                .directory
                .join(format!("{}.log", file_config.prefix));
            fs::create_dir_all(&file_config.directory).map_err(|source| LoggingError::LogFile {
                path: file_config.directory.clone(),
                source,
            })?;
            let file = File::create(&path).map_err(|source| LoggingError::LogFile { path, source })?;
            return Ok(tracing_appender::non_blocking(file));
        }
        RotationStrategy::Daily => Rotation::DAILY,
        RotationStrategy::Hourly => Rotation::HOURLY,
    };

    let appender = RollingFileAppender::builder()
        .rotation(rotation)
        .filename_prefix(&file_config.prefix)
        .filename_suffix("log")
        .build(&file_config.directory)
        .map_err(|e| LoggingError::Appender(e.to_string()))?;
    Ok(tracing_appender::non_blocking(appender))
}

/// Initialize logging with default settings (JSONL to stderr)
pub fn init_default() {
    TailscopeSubscriberBuilder::new().init();
}

/// Initialize logging for development (debug level, pretty output)
pub fn init_development() {
    TailscopeSubscriberBuilder::new()
        .with_config(LogConfig::development())
        .init();
}

/// Initialize logging for tests; repeated calls are harmless
pub fn init_testing() {
    let _ = TailscopeSubscriberBuilder::new()
        .with_config(LogConfig::testing())
        .try_init();
}
