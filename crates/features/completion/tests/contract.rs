use gatekit_completion::{CompletionRequirement, ProxyCompletion, Status};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;

type Calls = Arc<Mutex<Vec<(String, bool)>>>;

fn recording() -> (CompletionRequirement<String>, Calls) {
    let calls: Calls = Arc::default();
    let sink = calls.clone();
    let requirement = CompletionRequirement::new(move |value, was_async| {
        sink.lock().unwrap().push((value, was_async));
    });
    (requirement, calls)
}

/// An operation that finishes on a worker thread.
fn load_title(completion: &CompletionRequirement<String>) -> (Status, thread::JoinHandle<()>) {
    let deferred = completion.will_complete_async();
    let status = deferred.status();
    let worker = thread::spawn(move || deferred.completed("Voices".to_owned()));
    (status, worker)
}

#[test]
fn async_proxy_relays_exactly_once_after_its_own_completion() {
    let (inner, calls) = recording();
    let proxy = ProxyCompletion::new(&inner, |value: String, _| format!("Title: {value}"));

    let (status, worker) = load_title(&proxy);
    let inner_status = proxy.relay(status);
    assert!(inner.verify(&inner_status));
    assert!(inner_status.was_async());

    worker.join().unwrap();
    assert_eq!(*calls.lock().unwrap(), [("Title: Voices".to_owned(), true)]);
    assert!(inner.is_completed());
    assert!(proxy.is_completed());
}

#[test]
fn inner_callback_waits_for_the_proxy_to_complete() {
    let (tx, rx) = mpsc::channel();
    let inner = CompletionRequirement::new(move |value: String, was_async| {
        tx.send((value, was_async)).unwrap();
    });
    let proxy = ProxyCompletion::new(&inner, |value: String, _| format!("Title: {value}"));

    let deferred = proxy.will_complete_async();
    assert!(rx.try_recv().is_err());

    deferred.completed("Voices".to_owned());
    assert_eq!(rx.recv().unwrap(), ("Title: Voices".to_owned(), true));
    assert!(rx.try_recv().is_err());
}

#[test]
fn completion_from_many_threads_fires_once() {
    let (requirement, calls) = recording();
    let deferred = requirement.will_complete_async();

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let deferred = deferred.clone();
            thread::spawn(move || {
                std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                    deferred.completed(format!("worker {i}"));
                }))
                .is_ok()
            })
        })
        .collect();
    let fired = handles.into_iter().map(|h| h.join().unwrap()).filter(|ok| *ok).count();

    assert_eq!(fired, 1);
    assert_eq!(calls.lock().unwrap().len(), 1);
}

#[test]
#[should_panic(expected = "already completed synchronously")]
fn double_sync_completion_panics() {
    let (requirement, _) = recording();
    let _ = requirement.completed_sync("a".to_owned());
    let _ = requirement.completed_sync("b".to_owned());
}
