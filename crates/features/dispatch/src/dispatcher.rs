//! Runs action bodies on their execution context and reports them to observers.

use crate::action::{Action, ActionOutcome, ExecutionTarget};
use crate::error::DispatchError;
use crate::observer::{ActionEvent, DispatchObserver};
use gatekit_completion::{CompletionRequirement, ProxyCompletion, Status};
use gatekit_domain::config::DispatchConfig;
use gatekit_runtime::{
    AnyContext, ExecutionContext, RuntimeConfig, RuntimeContext, SerialContext, run_blocking,
};
use parking_lot::RwLock;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, error, warn};

type Observers = Arc<[Arc<dyn DispatchObserver>]>;

/// Owns the execution contexts and the observer list.
///
/// * `Main` actions run on a dedicated serial thread.
/// * `Background` actions run on a tokio blocking pool.
/// * `Any` actions run inline.
///
/// Observer notifications are queued on a separate serial thread.
#[gatekit_derive::gate_handle]
pub struct ActionDispatcher {
    main: SerialContext,
    background: RuntimeContext,
    notifications: SerialContext,
    observers: RwLock<Vec<Arc<dyn DispatchObserver>>>,
    notify: bool,
}

impl ActionDispatcher {
    /// Spawns the main and notification threads and the background pool.
    ///
    /// # Errors
    /// Returns [`DispatchError::Runtime`] if a thread or the pool cannot be created.
    pub fn new(config: &DispatchConfig) -> Result<Self, DispatchError> {
        let main = SerialContext::spawn(config.main_thread_name.clone())?;
        let notifications = SerialContext::spawn(config.observer_thread_name.clone())?;
        let mut runtime = RuntimeConfig::background();
        if config.background_threads > 0 {
            runtime = runtime.with_worker_threads(config.background_threads);
        }
        let background = RuntimeContext::new(&runtime)?;

        Ok(Self::from_inner(ActionDispatcherInner {
            main,
            background,
            notifications,
            observers: RwLock::default(),
            notify: config.notify_observers,
        }))
    }

    pub fn add_observer(&self, observer: Arc<dyn DispatchObserver>) {
        self.observers.write().push(observer);
    }

    /// Returns `true` if `observer` was registered.
    pub fn remove_observer(&self, observer: &Arc<dyn DispatchObserver>) -> bool {
        let mut observers = self.observers.write();
        let before = observers.len();
        observers.retain(|registered| !Arc::ptr_eq(registered, observer));
        observers.len() != before
    }

    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.observers.read().len()
    }

    #[must_use]
    pub fn context(&self, target: ExecutionTarget) -> &dyn ExecutionContext {
        match target {
            ExecutionTarget::Any => &AnyContext,
            ExecutionTarget::Main => &self.main,
            ExecutionTarget::Background => &self.background,
        }
    }

    /// Performs `action` on the context `target` names and returns the status for the
    /// caller's `completion`.
    ///
    /// Begin observers are notified before the body runs; end observers when the outcome is
    /// delivered, whether synchronously or later.
    ///
    /// # Errors
    /// Returns [`DispatchError::Runtime`] if the context refused or dropped the body.
    ///
    /// # Panics
    /// Panics if the action returns a status that does not belong to the completion it was
    /// given. Panics raised by the action body are propagated to the caller.
    pub fn dispatch<A: Action>(
        &self,
        action: Arc<A>,
        input: A::Input,
        event: ActionEvent,
        target: ExecutionTarget,
        completion: &CompletionRequirement<ActionOutcome>,
    ) -> Result<Status, DispatchError> {
        let observers = self.snapshot();
        if let Some(observers) = &observers {
            let observers = Arc::clone(observers);
            let event = event.clone();
            self.notify(Box::new(move || {
                for observer in observers.iter() {
                    deliver(observer, &event, "action_will_begin", || {
                        observer.action_will_begin(&event);
                    });
                }
            }));
        }

        let notifier = self.clone();
        let completed = event.clone();
        let proxy = ProxyCompletion::new(completion, move |outcome: ActionOutcome, was_async| {
            debug!(
                feature = %completed.feature,
                action = %completed.action,
                success = outcome.is_success(),
                was_async,
                "Action completed"
            );
            if let Some(observers) = observers {
                let outcome = outcome.clone();
                notifier.notify(Box::new(move || {
                    for observer in observers.iter() {
                        deliver(observer, &completed, "action_did_complete", || {
                            observer.action_did_complete(&completed, &outcome);
                        });
                    }
                }));
            }
            outcome
        });

        let context = self.context(target);
        debug!(
            feature = %event.feature,
            action = %event.action,
            context = context.name(),
            "Dispatching action"
        );
        let (status, proxy) = run_blocking(context, move || {
            let status = action.perform(input, &proxy);
            (status, proxy)
        })?;

        assert!(
            proxy.verify(&status),
            "action {} returned a status that does not belong to its completion",
            event.action
        );
        Ok(proxy.relay(status))
    }

    /// Blocks until every queued observer notification has been delivered.
    ///
    /// # Errors
    /// Returns [`DispatchError::Runtime`] if the notification thread is gone.
    pub fn flush(&self) -> Result<(), DispatchError> {
        run_blocking(&self.notifications, || ())?;
        Ok(())
    }

    fn snapshot(&self) -> Option<Observers> {
        if !self.notify {
            return None;
        }
        let observers = self.observers.read();
        (!observers.is_empty()).then(|| observers.iter().cloned().collect())
    }

    fn notify(&self, job: gatekit_runtime::Job) {
        if let Err(error) = self.notifications.execute(job) {
            warn!(%error, "Observer notification dropped");
        }
    }
}

/// Calls one observer, isolating the others from its panic.
fn deliver(
    observer: &Arc<dyn DispatchObserver>,
    event: &ActionEvent,
    callback: &'static str,
    call: impl FnOnce(),
) {
    if panic::catch_unwind(AssertUnwindSafe(call)).is_err() {
        error!(
            ?observer,
            callback,
            feature = %event.feature,
            action = %event.action,
            "Dispatch observer panicked"
        );
    }
}
