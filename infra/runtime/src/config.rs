use crate::error::RuntimeError;
use std::{sync::OnceLock, thread::available_parallelism, time::Duration};
use tokio::runtime::{Builder, Runtime};
use tracing::debug;

/// The default number of worker threads if detection fails.
const DEFAULT_WORKER_THREADS: usize = 4;
/// Upper bound on worker threads regardless of detection.
const MAX_WORKER_THREADS: usize = 1024;
/// The default stack size for threads (2 `MiB`).
const DEFAULT_STACK_SIZE: usize = 2 * 1024 * 1024;
/// Minimum allowed stack size (1 `MiB`).
const MIN_STACK_SIZE: usize = 1024 * 1024;
/// Maximum allowed stack size (16 `MiB`).
const MAX_STACK_SIZE: usize = 16 * 1024 * 1024;
/// How long an idle thread stays alive.
const THREAD_KEEP_ALIVE: Duration = Duration::from_secs(60);
const DEFAULT_THREAD_NAME: &str = "gatekit-worker";

static WORKER_THREADS: OnceLock<usize> = OnceLock::new();

/// Detects the number of worker threads from `TOKIO_WORKER_THREADS` or the hardware.
fn detect_worker_threads() -> usize {
    *WORKER_THREADS.get_or_init(|| {
        std::env::var("TOKIO_WORKER_THREADS")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .filter(|&n| n > 0 && n <= MAX_WORKER_THREADS)
            .unwrap_or_else(|| {
                available_parallelism()
                    .map(std::num::NonZero::get)
                    .unwrap_or(DEFAULT_WORKER_THREADS)
            })
    })
}

fn normalize_thread_name(name: String) -> String {
    if name.trim().is_empty() { DEFAULT_THREAD_NAME.to_owned() } else { name }
}

/// Configuration for the tokio pool behind a [`RuntimeContext`](crate::RuntimeContext).
///
/// Every pool thread carries `thread_name`, which is how the context recognizes its own
/// threads. Give distinct contexts distinct names.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub worker_threads: usize,
    pub stack_size: usize,
    pub thread_name: String,
    pub thread_keep_alive: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            worker_threads: detect_worker_threads(),
            stack_size: DEFAULT_STACK_SIZE,
            thread_name: DEFAULT_THREAD_NAME.to_owned(),
            thread_keep_alive: THREAD_KEEP_ALIVE,
        }
    }
}

impl RuntimeConfig {
    /// Preset for the background context of an interactive host: half the cores, short
    /// keep-alive.
    #[must_use = "Use this configuration for background action execution"]
    pub fn background() -> Self {
        Self {
            worker_threads: (detect_worker_threads() / 2).max(1),
            stack_size: DEFAULT_STACK_SIZE,
            thread_name: "gatekit-background".to_owned(),
            thread_keep_alive: Duration::from_secs(30),
        }
    }

    #[must_use = "Customize the number of worker threads for the runtime"]
    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = threads.clamp(1, MAX_WORKER_THREADS);
        self
    }

    #[must_use = "Customize the stack size for worker threads"]
    pub fn with_stack_size(mut self, size: usize) -> Self {
        self.stack_size = size.clamp(MIN_STACK_SIZE, MAX_STACK_SIZE);
        self
    }

    #[must_use = "Customize the thread name"]
    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = normalize_thread_name(name.into());
        self
    }

    fn normalized(&self) -> Self {
        Self {
            worker_threads: self.worker_threads.clamp(1, MAX_WORKER_THREADS),
            stack_size: self.stack_size.clamp(MIN_STACK_SIZE, MAX_STACK_SIZE),
            thread_name: normalize_thread_name(self.thread_name.clone()),
            thread_keep_alive: self.thread_keep_alive,
        }
    }

    /// Builds a multi-thread tokio runtime from this configuration.
    ///
    /// # Errors
    /// Returns [`RuntimeError::Io`] if the OS refuses to create the pool.
    pub(crate) fn build(&self) -> Result<(Runtime, Self), RuntimeError> {
        let config = self.normalized();
        debug!(config = ?config, "Building tokio runtime");

        let runtime = Builder::new_multi_thread()
            .worker_threads(config.worker_threads)
            .max_blocking_threads(config.worker_threads)
            .thread_name(&config.thread_name)
            .thread_stack_size(config.stack_size)
            .thread_keep_alive(config.thread_keep_alive)
            .build()
            .map_err(|source| RuntimeError::Io {
                source,
                context: Some("Failed to initialize runtime".into()),
            })?;

        Ok((runtime, config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worker_threads_are_clamped() {
        let config = RuntimeConfig::default().with_worker_threads(0);
        assert_eq!(config.worker_threads, 1);

        let config = RuntimeConfig::default().with_worker_threads(2000);
        assert_eq!(config.worker_threads, MAX_WORKER_THREADS);
    }

    #[test]
    fn stack_size_is_clamped() {
        let config = RuntimeConfig::default().with_stack_size(100);
        assert_eq!(config.stack_size, MIN_STACK_SIZE);

        let config = RuntimeConfig::default().with_stack_size(100 * 1024 * 1024);
        assert_eq!(config.stack_size, MAX_STACK_SIZE);
    }

    #[test]
    fn blank_thread_name_falls_back() {
        let config = RuntimeConfig::default().with_thread_name("  ");
        assert_eq!(config.thread_name, DEFAULT_THREAD_NAME);
    }

    #[test]
    fn background_preset_is_named_and_smaller() {
        let background = RuntimeConfig::background();
        assert_eq!(background.thread_name, "gatekit-background");
        assert!(background.worker_threads >= 1);
        assert!(background.worker_threads <= RuntimeConfig::default().worker_threads);
        assert!(background.thread_keep_alive < THREAD_KEEP_ALIVE);
    }
}
