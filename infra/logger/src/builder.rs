use crate::Logger;
use crate::error::LoggerError;
use private::Sealed;
use std::fs;
use std::marker::PhantomData;
use std::path::PathBuf;
use tracing::level_filters::LevelFilter;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::layer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

const DEFAULT_MAX_FILES: usize = 10;
const LOG_FILE_SUFFIX: &str = "log";

#[derive(Debug)]
pub(crate) struct Settings {
    pub(crate) console: bool,
    pub(crate) path: Option<PathBuf>,
    pub(crate) level: LevelFilter,
    pub(crate) rotation: Rotation,
    pub(crate) max_files: usize,
    pub(crate) json: bool,
    pub(crate) env_filter: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            console: true,
            path: None,
            level: LevelFilter::INFO,
            rotation: Rotation::DAILY,
            max_files: DEFAULT_MAX_FILES,
            json: false,
            env_filter: None,
        }
    }
}

/// Builder state: no name yet.
#[derive(Debug)]
pub struct Unnamed;
/// Builder state: named, the only state that can `init`.
#[derive(Debug)]
pub struct Named(String);
/// Builder state: console only.
#[derive(Debug)]
pub struct ConsoleOnly;
/// Builder state: a log directory is set, file options are available.
#[derive(Debug)]
pub struct WithFile;

mod private {
    pub trait Sealed {}
}
impl Sealed for Unnamed {}
impl Sealed for Named {}
impl Sealed for ConsoleOnly {}
impl Sealed for WithFile {}

/// Typestate builder for the global tracing subscriber.
///
/// A name is required before [`LoggerBuilder::init`]; file-only knobs (`rotation`,
/// `max_files`, `json`) exist only after [`LoggerBuilder::path`].
#[derive(Debug)]
pub struct LoggerBuilder<N: Sealed = Unnamed, F: Sealed = ConsoleOnly> {
    pub(crate) settings: Settings,
    name: N,
    file: PhantomData<F>,
}

impl LoggerBuilder {
    pub(crate) fn new() -> Self {
        Self { settings: Settings::default(), name: Unnamed, file: PhantomData }
    }
}

impl<F: Sealed> LoggerBuilder<Unnamed, F> {
    /// Names the logger; the name prefixes rolling log files.
    pub fn name(self, name: impl Into<String>) -> LoggerBuilder<Named, F> {
        LoggerBuilder { settings: self.settings, name: Named(name.into()), file: PhantomData }
    }
}

impl LoggerBuilder<Named, WithFile> {
    #[must_use = "The builder must be configured before it can be used to initialize the logger."]
    pub const fn max_files(mut self, max: usize) -> Self {
        self.settings.max_files = max;
        self
    }

    #[must_use = "The builder must be configured before it can be used to initialize the logger."]
    pub const fn rotation(mut self, rotation: Rotation) -> Self {
        self.settings.rotation = rotation;
        self
    }

    /// Writes file records as JSON lines.
    #[must_use = "The builder must be configured before it can be used to initialize the logger."]
    pub const fn json(mut self) -> Self {
        self.settings.json = true;
        self
    }
}

impl<F: Sealed> LoggerBuilder<Named, F> {
    #[must_use = "The builder must be configured before it can be used to initialize the logger."]
    pub const fn level(mut self, level: LevelFilter) -> Self {
        self.settings.level = level;
        self
    }

    /// Programmatic filter directives (e.g. `gatekit_availability=trace`).
    ///
    /// Invalid directives make [`LoggerBuilder::init`] fail. Without this, `RUST_LOG` is read.
    #[must_use = "The builder must be configured before it can be used to initialize the logger."]
    pub fn env_filter(mut self, filter: impl Into<String>) -> Self {
        self.settings.env_filter = Some(filter.into());
        self
    }

    #[must_use = "The builder must be configured before it can be used to initialize the logger."]
    pub const fn console(mut self, enabled: bool) -> Self {
        self.settings.console = enabled;
        self
    }

    /// Sets the directory for rolling log files.
    pub fn path(self, path: impl Into<PathBuf>) -> LoggerBuilder<Named, WithFile> {
        let mut settings = self.settings;
        settings.path = Some(path.into());
        LoggerBuilder { settings, name: self.name, file: PhantomData }
    }

    /// Installs the global subscriber.
    ///
    /// The returned [`Logger`] owns the non-blocking writer guard; keep it alive until
    /// shutdown or buffered file records are lost.
    ///
    /// # Errors
    /// * [`LoggerError::InvalidConfiguration`] for an empty name, zero `max_files`, a bad
    ///   filter, or no enabled output.
    /// * [`LoggerError::Appender`] if the log directory cannot be used.
    /// * [`LoggerError::Subscriber`] if a global subscriber is already set.
    pub fn init(self) -> Result<Logger, LoggerError> {
        let name = self.name.0;
        validate(&self.settings, &name)?;
        let env_filter = build_env_filter(&self.settings)?;

        let mut layers = Vec::new();
        if self.settings.console {
            layers.push(layer().compact().with_ansi(true).boxed());
        }

        let guard = match self.settings.path {
            Some(path) => {
                fs::create_dir_all(&path).map_err(|e| LoggerError::Internal {
                    message: e.to_string().into(),
                    context: Some(format!("Failed to create path: {}", path.display()).into()),
                })?;

                let appender = RollingFileAppender::builder()
                    .rotation(self.settings.rotation)
                    .filename_prefix(&name)
                    .filename_suffix(LOG_FILE_SUFFIX)
                    .max_log_files(self.settings.max_files)
                    .build(path)?;
                let (writer, guard) = tracing_appender::non_blocking(appender);

                let file_layer = layer().with_writer(writer).with_ansi(false);
                layers.push(if self.settings.json {
                    file_layer.json().boxed()
                } else {
                    file_layer.boxed()
                });
                Some(guard)
            },
            None => None,
        };

        if layers.is_empty() {
            return Err(LoggerError::InvalidConfiguration {
                message: "No logging output enabled. Enable the console or set a path.".into(),
                context: Some(name.into()),
            });
        }

        tracing_subscriber::registry().with(env_filter).with(layers).try_init()?;
        tracing::debug!(logger = %name, "Logger initialized");

        Ok(Logger::with_guard(guard))
    }
}

fn validate(settings: &Settings, name: &str) -> Result<(), LoggerError> {
    if name.trim().is_empty() {
        return Err(LoggerError::InvalidConfiguration {
            message: "Logger name cannot be empty".into(),
            context: None,
        });
    }
    if settings.max_files == 0 {
        return Err(LoggerError::InvalidConfiguration {
            message: "max_files must be greater than zero".into(),
            context: Some(name.to_owned().into()),
        });
    }
    Ok(())
}

fn build_env_filter(settings: &Settings) -> Result<EnvFilter, LoggerError> {
    let builder = EnvFilter::builder().with_default_directive(settings.level.into());
    settings.env_filter.as_ref().map_or_else(
        || Ok(builder.from_env_lossy()),
        |filter| {
            builder.parse(filter).map_err(|e| LoggerError::InvalidConfiguration {
                message: format!("Invalid env filter '{filter}': {e}").into(),
                context: None,
            })
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn defaults_are_console_at_info() {
        let builder = LoggerBuilder::new().name("test-app").env_filter("gatekit=debug");
        assert!(builder.settings.console);
        assert_eq!(builder.settings.level, LevelFilter::INFO);
        assert_eq!(builder.settings.env_filter.as_deref(), Some("gatekit=debug"));
        assert!(builder.settings.path.is_none());
    }

    #[test]
    fn file_options_accumulate() {
        let builder = LoggerBuilder::new()
            .name("test-app")
            .path("/tmp/gatekit-logs")
            .max_files(5)
            .json()
            .level(LevelFilter::DEBUG);

        assert_eq!(builder.settings.max_files, 5);
        assert!(builder.settings.json);
        assert_eq!(builder.settings.level, LevelFilter::DEBUG);
        assert_eq!(
            builder.settings.path.as_deref(),
            Some(std::path::Path::new("/tmp/gatekit-logs"))
        );
    }

    #[test]
    #[serial]
    fn rejects_blank_name_and_disabled_outputs() {
        let err = LoggerBuilder::new().name(" ").init().unwrap_err();
        assert!(matches!(err, LoggerError::InvalidConfiguration { .. }));

        let err = LoggerBuilder::new().name("quiet").console(false).init().unwrap_err();
        assert!(matches!(err, LoggerError::InvalidConfiguration { .. }));
    }

    #[test]
    #[serial]
    fn rejects_invalid_filter() {
        let err =
            LoggerBuilder::new().name("test-app").env_filter("gatekit=loudest").init().unwrap_err();
        assert!(err.to_string().contains("Invalid env filter"));
    }
}
