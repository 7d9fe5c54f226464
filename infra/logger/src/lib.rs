//! # Logger
//!
//! Installs the process-wide `tracing` subscriber for gatekit hosts: a compact console layer,
//! an optional rolling file (plain or JSON lines, written off-thread), and an env filter.
//!
//! Build it by hand with [`Logger::builder`] or straight from the `[logging]` section of the
//! gatekit configuration with [`Logger::from_config`].
//!
//! ## Example
//!
//! ```rust
//! # use gatekit_logger::{Logger, LevelFilter};
//!
//! let _logger = Logger::builder()
//!     .name("my-app")
//!     .console(true)
//!     .level(LevelFilter::DEBUG)
//!     .init()
//!     .unwrap();
//! ```

mod builder;
mod error;

pub use crate::builder::{ConsoleOnly, LoggerBuilder, Named, Unnamed, WithFile};
pub use crate::error::{LoggerError, LoggerErrorExt};
pub use tracing::level_filters::LevelFilter;
pub use tracing_appender::rolling::Rotation;

use gatekit_domain::config::LoggingConfig;
use std::str::FromStr;
use tracing_appender::non_blocking::WorkerGuard;

/// Handle to the installed logging system.
///
/// Holds the file writer guard, if any. Drop it only at shutdown.
#[must_use = "Dropping this handle will stop background logging threads."]
#[derive(Debug)]
pub struct Logger {
    guard: Option<WorkerGuard>,
}

impl Logger {
    /// Starts a [`LoggerBuilder`]. The name prefixes rolling files (`my-app.2026-10-15.log`).
    #[must_use = "The builder must be configured before it can be used to initialize the logger."]
    pub fn builder() -> LoggerBuilder {
        LoggerBuilder::new()
    }

    /// Installs the subscriber described by a [`LoggingConfig`].
    ///
    /// # Errors
    /// Returns [`LoggerError::InvalidConfiguration`] for an unknown `level`, plus every error
    /// of [`LoggerBuilder::init`].
    pub fn from_config(config: &LoggingConfig) -> Result<Self, LoggerError> {
        let level = parse_level(&config.level)?;
        let builder = Self::builder().name(&config.name).level(level).console(config.console);
        let builder = match &config.env_filter {
            Some(filter) => builder.env_filter(filter),
            None => builder,
        };

        match &config.path {
            Some(path) => {
                let builder = builder.path(path);
                if config.json { builder.json().init() } else { builder.init() }
            },
            None => builder.init(),
        }
    }

    pub(crate) const fn with_guard(guard: Option<WorkerGuard>) -> Self {
        Self { guard }
    }

    /// Returns the file writer guard, if file output is enabled.
    #[must_use]
    pub const fn guard(&self) -> Option<&WorkerGuard> {
        self.guard.as_ref()
    }
}

impl Drop for Logger {
    fn drop(&mut self) {
        if self.guard.is_some() {
            tracing::info!("Logging system shutting down, flushing buffers...");
        }
    }
}

/// Parses `trace`/`debug`/`info`/`warn`/`error`/`off` (case-insensitive).
///
/// # Errors
/// Returns [`LoggerError::InvalidConfiguration`] for anything else.
pub fn parse_level(level: &str) -> Result<LevelFilter, LoggerError> {
    LevelFilter::from_str(level.trim()).map_err(|e| LoggerError::InvalidConfiguration {
        message: format!("Unknown log level '{level}': {e}").into(),
        context: Some("logging.level".into()),
    })
}
