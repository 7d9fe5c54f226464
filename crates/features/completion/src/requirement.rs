use crate::status::Status;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{trace, warn};

/// Receives the final value and whether it was delivered asynchronously.
pub type CompletionCallback<T> = Box<dyn FnOnce(T, bool) + Send + 'static>;

type CompletionHook<T> = Box<dyn FnOnce(&T, bool) + Send + 'static>;
type AsyncHook = Box<dyn FnOnce() + Send + 'static>;

static NEXT_REQUIREMENT: AtomicU64 = AtomicU64::new(1);

struct Pending<T> {
    callback: CompletionCallback<T>,
    hooks: Vec<CompletionHook<T>>,
    before_async: Option<AsyncHook>,
}

struct Deferred<T> {
    callback: CompletionCallback<T>,
    hooks: Vec<CompletionHook<T>>,
}

impl<T> Deferred<T> {
    fn fire(self, value: T, was_async: bool) {
        for hook in self.hooks {
            hook(&value, was_async);
        }
        (self.callback)(value, was_async);
    }
}

enum State<T> {
    Pending(Pending<T>),
    CompletedSync,
    Deferred(Deferred<T>),
    CompletedAsync,
}

impl<T> State<T> {
    const fn name(&self) -> &'static str {
        match self {
            Self::Pending(_) => "pending",
            Self::CompletedSync => "completed synchronously",
            Self::Deferred(_) => "deferred",
            Self::CompletedAsync => "completed asynchronously",
        }
    }
}

struct Shared<T> {
    id: u64,
    state: Mutex<State<T>>,
}

impl<T> Drop for Shared<T> {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        if matches!(state, State::Pending(_) | State::Deferred(_)) {
            warn!(
                requirement = self.id,
                state = state.name(),
                "Completion requirement dropped without completing"
            );
        }
    }
}

/// Swaps a pending state out, panicking (with the state restored) if it is not pending.
fn take_pending<T>(state: &mut State<T>, id: u64, operation: &str) -> Pending<T> {
    match std::mem::replace(state, State::CompletedSync) {
        State::Pending(pending) => pending,
        previous => {
            let name = previous.name();
            *state = previous;
            panic!("{operation} on completion requirement #{id}, which is already {name}");
        },
    }
}

/// A contract to report an operation's result exactly once.
///
/// The operation resolves it either inline with [`completed_sync`](Self::completed_sync), or
/// by calling [`will_complete_async`](Self::will_complete_async) and firing the returned
/// [`DeferredStatus`] later, from any thread. Both hand back a [`Status`] that the operation
/// returns as proof.
///
/// Misuse is a programming error and panics: resolving twice, deferring after completing, or
/// firing a deferred completion twice. Dropping a requirement that never completes logs a
/// warning.
///
/// # Examples
/// ```rust
/// use gatekit_completion::CompletionRequirement;
/// use std::sync::mpsc;
///
/// let (tx, rx) = mpsc::channel();
/// let requirement = CompletionRequirement::new(move |value: u32, was_async| {
///     tx.send((value, was_async)).unwrap();
/// });
///
/// let deferred = requirement.will_complete_async();
/// let status = deferred.status();
/// std::thread::spawn(move || deferred.completed(7)).join().unwrap();
///
/// assert!(requirement.verify(&status));
/// assert_eq!(rx.recv().unwrap(), (7, true));
/// ```
pub struct CompletionRequirement<T> {
    shared: Arc<Shared<T>>,
}

impl<T: Send + 'static> CompletionRequirement<T> {
    pub fn new<F>(callback: F) -> Self
    where
        F: FnOnce(T, bool) + Send + 'static,
    {
        let id = NEXT_REQUIREMENT.fetch_add(1, Ordering::Relaxed);
        trace!(requirement = id, "Completion requirement created");
        let pending = Pending { callback: Box::new(callback), hooks: Vec::new(), before_async: None };
        Self { shared: Arc::new(Shared { id, state: Mutex::new(State::Pending(pending)) }) }
    }

    #[must_use]
    pub fn id(&self) -> u64 {
        self.shared.id
    }

    /// Resolves the requirement now; the callback runs on this thread before returning.
    ///
    /// # Panics
    /// Panics if the requirement is not pending.
    pub fn completed_sync(&self, value: T) -> Status {
        let Pending { callback, hooks, .. } = {
            let mut state = self.shared.state.lock();
            take_pending(&mut state, self.shared.id, "completed_sync")
        };
        trace!(requirement = self.shared.id, "Completed synchronously");
        Deferred { callback, hooks }.fire(value, false);
        Status::new(self.shared.id, false)
    }

    /// Promises a later resolution through the returned token.
    ///
    /// # Panics
    /// Panics if the requirement is not pending.
    pub fn will_complete_async(&self) -> DeferredStatus<T> {
        let before_async = {
            let mut state = self.shared.state.lock();
            let Pending { callback, hooks, before_async } =
                take_pending(&mut state, self.shared.id, "will_complete_async");
            *state = State::Deferred(Deferred { callback, hooks });
            before_async
        };
        if let Some(hook) = before_async {
            hook();
        }
        trace!(requirement = self.shared.id, "Completion deferred");
        DeferredStatus { shared: Arc::clone(&self.shared) }
    }

    /// Runs `hook` with the final value just before the callback. Hooks run in registration
    /// order.
    ///
    /// # Panics
    /// Panics if the requirement is no longer pending.
    pub fn on_complete<F>(&self, hook: F)
    where
        F: FnOnce(&T, bool) + Send + 'static,
    {
        let mut state = self.shared.state.lock();
        let State::Pending(pending) = &mut *state else {
            panic!(
                "completion hook added to requirement #{}, which is already {}",
                self.shared.id,
                state.name()
            );
        };
        pending.hooks.push(Box::new(hook));
    }

    /// Runs `hook` on the deferring thread as part of
    /// [`will_complete_async`](Self::will_complete_async), before the token is handed out.
    pub(crate) fn before_async<F>(&self, hook: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if let State::Pending(pending) = &mut *self.shared.state.lock() {
            pending.before_async = Some(Box::new(hook));
        }
    }

    /// A second handle on the same contract, for wrappers that resolve it on the owner's
    /// behalf.
    pub(crate) fn share(&self) -> Self {
        Self { shared: Arc::clone(&self.shared) }
    }

    /// `true` if `status` was produced by this requirement.
    #[must_use]
    pub fn verify(&self, status: &Status) -> bool {
        if status.requirement() != self.shared.id {
            return false;
        }
        matches!(
            (&*self.shared.state.lock(), status.was_async()),
            (State::CompletedSync, false) | (State::Deferred(_) | State::CompletedAsync, true)
        )
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        matches!(*self.shared.state.lock(), State::Pending(_))
    }

    /// `true` once the callback has been invoked.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        matches!(*self.shared.state.lock(), State::CompletedSync | State::CompletedAsync)
    }
}

impl<T> fmt::Debug for CompletionRequirement<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletionRequirement")
            .field("id", &self.shared.id)
            .field("state", &self.shared.state.lock().name())
            .finish()
    }
}

/// The pending half of an asynchronous completion.
///
/// Clones share the same contract; whichever fires first resolves it, any later firing
/// panics.
#[must_use = "a deferred completion must eventually be fired with `completed`"]
pub struct DeferredStatus<T> {
    shared: Arc<Shared<T>>,
}

impl<T> DeferredStatus<T> {
    pub fn status(&self) -> Status {
        Status::new(self.shared.id, true)
    }

    /// Delivers `value`; the callback runs on the calling thread.
    ///
    /// # Panics
    /// Panics if this deferred completion has already fired.
    pub fn completed(&self, value: T) {
        let id = self.shared.id;
        let deferred = {
            let mut state = self.shared.state.lock();
            match std::mem::replace(&mut *state, State::CompletedAsync) {
                State::Deferred(deferred) => deferred,
                previous => {
                    let name = previous.name();
                    *state = previous;
                    panic!("deferred completion #{id} fired, but the requirement is {name}");
                },
            }
        };
        trace!(requirement = id, "Completed asynchronously");
        deferred.fire(value, true);
    }
}

impl<T> Clone for DeferredStatus<T> {
    fn clone(&self) -> Self {
        Self { shared: Arc::clone(&self.shared) }
    }
}

impl<T> fmt::Debug for DeferredStatus<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredStatus").field("requirement", &self.shared.id).finish()
    }
}

impl<T> From<DeferredStatus<T>> for Status {
    fn from(deferred: DeferredStatus<T>) -> Self {
        deferred.status()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn recording() -> (CompletionRequirement<String>, Arc<Mutex<Vec<(String, bool)>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&calls);
        let requirement = CompletionRequirement::new(move |value, was_async| {
            sink.lock().push((value, was_async));
        });
        (requirement, calls)
    }

    #[test]
    fn sync_completion_runs_inline() {
        let (requirement, calls) = recording();
        assert!(requirement.is_pending());

        let status = requirement.completed_sync("done".to_owned());
        assert!(!status.was_async());
        assert!(requirement.verify(&status));
        assert!(requirement.is_completed());
        assert_eq!(*calls.lock(), [("done".to_owned(), false)]);
    }

    #[test]
    fn status_from_another_requirement_fails_verification() {
        let (first, _) = recording();
        let (second, _) = recording();
        let status = first.completed_sync(String::new());
        assert!(!second.verify(&status));
    }

    #[test]
    fn deferred_status_verifies_before_it_fires() {
        let (requirement, calls) = recording();
        let deferred = requirement.will_complete_async();
        let status: Status = deferred.clone().into();

        assert!(requirement.verify(&status));
        assert!(!requirement.is_completed());
        assert!(calls.lock().is_empty());

        deferred.completed("later".to_owned());
        assert!(requirement.verify(&status));
        assert_eq!(*calls.lock(), [("later".to_owned(), true)]);
    }

    #[test]
    fn hooks_observe_the_value_before_the_callback() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&order);
        let requirement = CompletionRequirement::new(move |value: u8, _| {
            sink.lock().push(format!("callback {value}"));
        });
        for name in ["first", "second"] {
            let sink = Arc::clone(&order);
            requirement.on_complete(move |value, was_async| {
                sink.lock().push(format!("{name} {value} {was_async}"));
            });
        }

        let _ = requirement.completed_sync(3);
        assert_eq!(*order.lock(), ["first 3 false", "second 3 false", "callback 3"]);
    }

    #[test]
    fn before_async_runs_once_when_deferring() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);
        let requirement = CompletionRequirement::new(|(): (), _| {});
        requirement.before_async(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let deferred = requirement.will_complete_async();
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        deferred.completed(());
    }

    #[test]
    #[should_panic(expected = "already completed synchronously")]
    fn completing_twice_panics() {
        let (requirement, _) = recording();
        let _ = requirement.completed_sync(String::new());
        let _ = requirement.completed_sync(String::new());
    }

    #[test]
    #[should_panic(expected = "already completed synchronously")]
    fn deferring_after_completion_panics() {
        let (requirement, _) = recording();
        let _ = requirement.completed_sync(String::new());
        let _ = requirement.will_complete_async();
    }

    #[test]
    #[should_panic(expected = "already deferred")]
    fn sync_completion_after_deferring_panics() {
        let (requirement, _) = recording();
        let _deferred = requirement.will_complete_async();
        let _ = requirement.completed_sync(String::new());
    }

    #[test]
    #[should_panic(expected = "fired, but the requirement is completed asynchronously")]
    fn firing_a_deferred_completion_twice_panics() {
        let (requirement, _) = recording();
        let deferred = requirement.will_complete_async();
        deferred.clone().completed("once".to_owned());
        deferred.completed("twice".to_owned());
    }

    #[test]
    #[should_panic(expected = "completion hook added")]
    fn hooks_cannot_be_added_after_completion() {
        let (requirement, _) = recording();
        let _ = requirement.completed_sync(String::new());
        requirement.on_complete(|_, _| {});
    }
}
