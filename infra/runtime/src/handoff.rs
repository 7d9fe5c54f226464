use crate::context::ExecutionContext;
use crate::error::RuntimeError;
use parking_lot::{Condvar, Mutex};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::trace;

enum Reply<R> {
    Waiting,
    Returned(R),
    Panicked(Box<dyn Any + Send + 'static>),
    Abandoned,
}

struct Slot<R> {
    reply: Mutex<Reply<R>>,
    ready: Condvar,
}

impl<R> Slot<R> {
    fn fill(&self, reply: Reply<R>) {
        let mut guard = self.reply.lock();
        if matches!(*guard, Reply::Waiting) {
            *guard = reply;
            self.ready.notify_one();
        }
    }
}

/// Sender half owned by the job. Dropping it unsent reports the job as abandoned.
struct Responder<R> {
    slot: Arc<Slot<R>>,
}

impl<R> Drop for Responder<R> {
    fn drop(&mut self) {
        self.slot.fill(Reply::Abandoned);
    }
}

/// Runs `f` on `context` and blocks the caller until it returns.
///
/// When the caller is already on `context`, `f` runs inline. A panic inside `f` is resumed
/// on the calling thread.
///
/// # Errors
/// Returns [`RuntimeError::Closed`] if the context refuses the job and
/// [`RuntimeError::Abandoned`] if it drops the job without running it.
pub fn run_blocking<C, F, R>(context: &C, f: F) -> Result<R, RuntimeError>
where
    C: ExecutionContext + ?Sized,
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    if context.is_current() {
        return Ok(f());
    }

    let slot = Arc::new(Slot { reply: Mutex::new(Reply::Waiting), ready: Condvar::new() });
    let responder = Responder { slot: slot.clone() };

    trace!(context = context.name(), "Blocking hand-off");
    context.execute(Box::new(move || {
        let reply = match panic::catch_unwind(AssertUnwindSafe(f)) {
            Ok(value) => Reply::Returned(value),
            Err(payload) => Reply::Panicked(payload),
        };
        responder.slot.fill(reply);
    }))?;

    let mut guard = slot.reply.lock();
    while matches!(*guard, Reply::Waiting) {
        slot.ready.wait(&mut guard);
    }

    match std::mem::replace(&mut *guard, Reply::Abandoned) {
        Reply::Returned(value) => Ok(value),
        Reply::Panicked(payload) => {
            drop(guard);
            panic::resume_unwind(payload)
        },
        Reply::Waiting | Reply::Abandoned => Err(RuntimeError::Abandoned {
            message: context.name().to_owned().into(),
            context: Some("Context dropped the job before running it".into()),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AnyContext, SerialContext};
    use std::thread;

    #[test]
    fn inline_when_already_current() -> Result<(), RuntimeError> {
        let caller = thread::current().id();
        let ran_on = run_blocking(&AnyContext, move || thread::current().id())?;
        assert_eq!(ran_on, caller);
        Ok(())
    }

    #[test]
    fn waits_for_the_body_on_another_thread() -> Result<(), RuntimeError> {
        let context = SerialContext::spawn("test-handoff")?;
        let value = run_blocking(&context, || {
            thread::sleep(std::time::Duration::from_millis(20));
            thread::current().name().map(str::to_owned)
        })?;
        assert_eq!(value.as_deref(), Some("test-handoff"));
        Ok(())
    }

    #[test]
    #[should_panic(expected = "body failed")]
    fn body_panic_resumes_on_caller() {
        let context = SerialContext::spawn("test-handoff-panic").unwrap();
        let _ = run_blocking(&context, || -> u8 { panic!("body failed") });
    }
}
