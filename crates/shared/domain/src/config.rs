use serde::Deserialize;
use std::ops::{Deref, DerefMut};
use std::path::PathBuf;
use std::sync::Arc;

/// Top-level gatekit configuration shared across services.
#[derive(Default, Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GateConfigInner {
    pub availability: AvailabilityConfig,
    pub dispatch: DispatchConfig,
    pub stacks: StackConfig,
    pub logging: LoggingConfig,
}

/// Thin Arc-wrapped config for inexpensive cloning into subsystems.
#[derive(Default, Debug, Clone, Deserialize)]
pub struct GateConfig {
    #[serde(flatten, default)]
    inner: Arc<GateConfigInner>,
}

impl Deref for GateConfig {
    type Target = GateConfigInner;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl DerefMut for GateConfig {
    fn deref_mut(&mut self) -> &mut GateConfigInner {
        Arc::make_mut(&mut self.inner)
    }
}

/// Availability checker knobs.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AvailabilityConfig {
    /// Disable to evaluate every call (useful while debugging backends).
    pub cache_enabled: bool,
}

/// Action dispatcher knobs.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Deliver begin/end notifications to registered observers.
    pub notify_observers: bool,
    /// Thread name of the serial context used for the `Main` execution target.
    pub main_thread_name: String,
    /// Thread name of the serial context used for observer notifications.
    pub observer_thread_name: String,
    /// Worker threads of the `Background` execution target; `0` picks a size from the host.
    pub background_threads: usize,
}

/// Action stack tracking knobs.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StackConfig {
    /// Session used when callers do not name one.
    pub default_session: String,
    /// How many terminated stacks are kept for inspection.
    pub history_capacity: u64,
}

/// Logger settings (see `gatekit-logger`).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub name: String,
    /// One of `trace`, `debug`, `info`, `warn`, `error`, `off`.
    pub level: String,
    pub console: bool,
    pub path: Option<PathBuf>,
    pub json: bool,
    pub env_filter: Option<String>,
}

// --- Default ---

impl Default for AvailabilityConfig {
    fn default() -> Self {
        Self { cache_enabled: true }
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            notify_observers: true,
            main_thread_name: "gatekit-main".to_owned(),
            observer_thread_name: "gatekit-observers".to_owned(),
            background_threads: 0,
        }
    }
}

impl Default for StackConfig {
    fn default() -> Self {
        Self { default_session: "main".to_owned(), history_capacity: 256 }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            name: "gatekit".to_owned(),
            level: "info".to_owned(),
            console: true,
            path: None,
            json: false,
            env_filter: None,
        }
    }
}
