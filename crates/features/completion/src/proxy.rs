use crate::requirement::{CompletionRequirement, DeferredStatus};
use crate::status::Status;
use parking_lot::Mutex;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

struct Relay<T> {
    /// Inner token, stored when the proxy goes asynchronous.
    token: Option<DeferredStatus<T>>,
    /// Inner status, available once the inner requirement resolved or deferred.
    status: Option<Status>,
}

/// Stands in for an inner requirement and rewrites the value on its way through.
///
/// The proxy dereferences to its own [`CompletionRequirement`], which is what the wrapped
/// operation receives. When the operation completes synchronously the value is transformed
/// and the inner requirement completes synchronously too. When it defers, the inner
/// requirement is deferred at the same moment, and the inner token is fired with the
/// transformed value once the proxy's own deferred completion fires.
///
/// # Examples
/// ```rust
/// use gatekit_completion::{CompletionRequirement, ProxyCompletion};
/// use std::sync::{Arc, Mutex};
///
/// let seen = Arc::new(Mutex::new(None));
/// let sink = seen.clone();
/// let inner = CompletionRequirement::new(move |title: String, _| {
///     *sink.lock().unwrap() = Some(title);
/// });
///
/// let proxy = ProxyCompletion::new(&inner, |value: String, _| format!("Title: {value}"));
/// let status = proxy.relay(proxy.completed_sync("Voices".to_owned()));
///
/// assert!(inner.verify(&status));
/// assert_eq!(seen.lock().unwrap().as_deref(), Some("Title: Voices"));
/// ```
pub struct ProxyCompletion<T> {
    own: CompletionRequirement<T>,
    relay: Arc<Mutex<Relay<T>>>,
}

impl<T: Send + 'static> ProxyCompletion<T> {
    pub fn new<F>(inner: &CompletionRequirement<T>, transform: F) -> Self
    where
        F: FnOnce(T, bool) -> T + Send + 'static,
    {
        let relay = Arc::new(Mutex::new(Relay { token: None, status: None }));

        let inner_handle = inner.share();
        let forward = Arc::clone(&relay);
        let own = CompletionRequirement::new(move |value: T, was_async: bool| {
            let value = transform(value, was_async);
            if was_async {
                let token = forward.lock().token.take();
                let Some(token) = token else {
                    panic!(
                        "proxy for requirement #{} completed asynchronously without an inner token",
                        inner_handle.id()
                    );
                };
                token.completed(value);
            } else {
                let status = inner_handle.completed_sync(value);
                forward.lock().status = Some(status);
            }
        });

        let inner_handle = inner.share();
        let stash = Arc::clone(&relay);
        own.before_async(move || {
            let token = inner_handle.will_complete_async();
            let mut relay = stash.lock();
            relay.status = Some(token.status());
            relay.token = Some(token);
        });

        Self { own, relay }
    }

    /// Exchanges a status produced by this proxy for the inner requirement's status.
    ///
    /// # Panics
    /// Panics if `status` did not come from this proxy, or if the inner requirement has not
    /// been resolved or deferred yet.
    pub fn relay(&self, status: Status) -> Status {
        assert!(
            self.own.verify(&status),
            "status does not belong to proxy requirement #{}",
            self.own.id()
        );
        let inner = self.relay.lock().status;
        inner.unwrap_or_else(|| {
            panic!("proxy requirement #{} has no inner status to relay", self.own.id())
        })
    }
}

impl<T> Deref for ProxyCompletion<T> {
    type Target = CompletionRequirement<T>;

    fn deref(&self) -> &Self::Target {
        &self.own
    }
}

impl<T> fmt::Debug for ProxyCompletion<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let relay = self.relay.lock();
        f.debug_struct("ProxyCompletion")
            .field("own", &self.own)
            .field("inner_deferred", &relay.token.is_some())
            .field("inner_status", &relay.status)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recording() -> (CompletionRequirement<String>, Arc<Mutex<Vec<(String, bool)>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&calls);
        let requirement = CompletionRequirement::new(move |value, was_async| {
            sink.lock().push((value, was_async));
        });
        (requirement, calls)
    }

    #[test]
    fn sync_proxy_transforms_and_completes_inner() {
        let (inner, calls) = recording();
        let proxy = ProxyCompletion::new(&inner, |value: String, _| value.to_uppercase());

        let status = proxy.relay(proxy.completed_sync("voices".to_owned()));
        assert!(!status.was_async());
        assert!(inner.verify(&status));
        assert_eq!(*calls.lock(), [("VOICES".to_owned(), false)]);
    }

    #[test]
    fn deferring_the_proxy_defers_the_inner_requirement() {
        let (inner, calls) = recording();
        let proxy = ProxyCompletion::new(&inner, |value: String, _| value);

        let deferred = proxy.will_complete_async();
        assert!(!inner.is_pending());
        assert!(!inner.is_completed());
        assert!(proxy.relay(deferred.status()).was_async());

        deferred.completed("late".to_owned());
        assert!(inner.is_completed());
        assert_eq!(calls.lock().len(), 1);
    }

    #[test]
    #[should_panic(expected = "does not belong to proxy")]
    fn foreign_status_cannot_be_relayed() {
        let (inner, _) = recording();
        let (other, _) = recording();
        let proxy = ProxyCompletion::new(&inner, |value: String, _| value);
        let _ = proxy.relay(other.completed_sync(String::new()));
    }
}
