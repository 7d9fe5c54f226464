use crate::config::RuntimeConfig;
use crate::error::RuntimeError;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle, ThreadId};
use tokio::runtime::Runtime;
use tokio::sync::mpsc;
use tracing::{debug, error, trace};

/// A unit of work handed to an [`ExecutionContext`].
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// A place where work runs.
///
/// Implementations must be usable from any thread. `execute` never blocks on the job; see
/// [`run_blocking`](crate::run_blocking) for the waiting hand-off.
pub trait ExecutionContext: Send + Sync + fmt::Debug {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Returns `true` when called from a thread owned by this context.
    fn is_current(&self) -> bool;

    /// Queues `job` on this context.
    ///
    /// # Errors
    /// Returns [`RuntimeError::Closed`] if the context no longer accepts work. The job is
    /// dropped in that case.
    fn execute(&self, job: Job) -> Result<(), RuntimeError>;
}

/// Runs every job inline on the calling thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct AnyContext;

impl ExecutionContext for AnyContext {
    fn name(&self) -> &'static str {
        "any"
    }

    fn is_current(&self) -> bool {
        true
    }

    fn execute(&self, job: Job) -> Result<(), RuntimeError> {
        job();
        Ok(())
    }
}

/// A single named thread that runs jobs one at a time in submission order.
///
/// This is the stand-in for a UI main thread: anything targeting it is serialized. A job that
/// panics is logged and skipped; the thread keeps draining the queue.
pub struct SerialContext {
    name: String,
    sender: Option<mpsc::UnboundedSender<Job>>,
    thread: ThreadId,
    handle: Option<JoinHandle<()>>,
}

impl SerialContext {
    /// Spawns the backing thread.
    ///
    /// # Errors
    /// Returns [`RuntimeError::Io`] if the thread cannot be spawned.
    pub fn spawn(name: impl Into<String>) -> Result<Self, RuntimeError> {
        let name = name.into();
        let (sender, mut receiver) = mpsc::unbounded_channel::<Job>();

        let thread_name = name.clone();
        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                while let Some(job) = receiver.blocking_recv() {
                    // A panicking job must not take the queued ones down with it.
                    if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
                        error!(context = %thread_name, "Job panicked; serial context continues");
                    }
                }
            })
            .map_err(|source| RuntimeError::Io {
                source,
                context: Some(format!("Failed to spawn serial context '{name}'").into()),
            })?;

        debug!(context = %name, "Serial context started");
        Ok(Self { thread: handle.thread().id(), name, sender: Some(sender), handle: Some(handle) })
    }
}

impl ExecutionContext for SerialContext {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_current(&self) -> bool {
        thread::current().id() == self.thread
    }

    fn execute(&self, job: Job) -> Result<(), RuntimeError> {
        let sender = self.sender.as_ref().ok_or_else(|| RuntimeError::Closed {
            message: self.name.clone().into(),
            context: Some("Serial context is shutting down".into()),
        })?;
        sender.send(job).map_err(|_| RuntimeError::Closed {
            message: self.name.clone().into(),
            context: Some("Serial context thread has exited".into()),
        })?;
        trace!(context = %self.name, "Job queued");
        Ok(())
    }
}

impl fmt::Debug for SerialContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerialContext")
            .field("name", &self.name)
            .field("thread", &self.thread)
            .finish_non_exhaustive()
    }
}

impl Drop for SerialContext {
    fn drop(&mut self) {
        // Closing the channel lets the thread drain queued jobs and exit.
        self.sender.take();
        let Some(handle) = self.handle.take() else {
            return;
        };
        if self.is_current() {
            return;
        }
        if handle.join().is_err() {
            error!(context = %self.name, "Serial context thread panicked");
        }
    }
}

/// A tokio multi-thread pool; jobs run on its blocking threads.
pub struct RuntimeContext {
    config: RuntimeConfig,
    runtime: Option<Runtime>,
}

impl RuntimeContext {
    /// Builds the pool.
    ///
    /// # Errors
    /// Returns [`RuntimeError::Io`] if the runtime cannot be created.
    pub fn new(config: &RuntimeConfig) -> Result<Self, RuntimeError> {
        let (runtime, config) = config.build()?;
        debug!(
            context = %config.thread_name,
            threads = config.worker_threads,
            "Runtime context started"
        );
        Ok(Self { config, runtime: Some(runtime) })
    }

    #[must_use]
    pub const fn config(&self) -> &RuntimeConfig {
        &self.config
    }
}

impl ExecutionContext for RuntimeContext {
    fn name(&self) -> &str {
        &self.config.thread_name
    }

    fn is_current(&self) -> bool {
        thread::current().name() == Some(self.config.thread_name.as_str())
    }

    fn execute(&self, job: Job) -> Result<(), RuntimeError> {
        let runtime = self.runtime.as_ref().ok_or_else(|| RuntimeError::Closed {
            message: self.config.thread_name.clone().into(),
            context: Some("Runtime context is shutting down".into()),
        })?;
        drop(runtime.spawn_blocking(job));
        trace!(context = %self.config.thread_name, "Job queued");
        Ok(())
    }
}

impl fmt::Debug for RuntimeContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeContext").field("config", &self.config).finish_non_exhaustive()
    }
}

impl Drop for RuntimeContext {
    fn drop(&mut self) {
        // `shutdown_background` is the only shutdown that is legal from inside another runtime.
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}
