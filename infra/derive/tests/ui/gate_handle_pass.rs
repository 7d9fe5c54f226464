use gatekit_derive::gate_handle;

#[gate_handle]
pub struct Counter {
    hits: std::sync::atomic::AtomicU64,
}

fn main() {
    let counter = Counter::from_inner(CounterInner { hits: std::sync::atomic::AtomicU64::new(0) });
    let clone = counter.clone();
    clone.hits.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    assert!(counter.ptr_eq(&clone));
    assert_eq!(counter.hits.load(std::sync::atomic::Ordering::SeqCst), 1);
}
