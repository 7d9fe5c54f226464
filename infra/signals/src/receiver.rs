use crate::bus::Signal;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Lag-tolerant receive for async signal listeners.
///
/// Invalidation signals only matter as "something changed", so a lagged listener skips to
/// the oldest retained signal instead of failing.
pub trait SignalReceiverExt<T> {
    /// Receive the next signal, returning `None` once the bus slot is closed.
    fn next_signal(&mut self) -> impl Future<Output = Option<Arc<T>>> + Send;
}

impl<T: Signal> SignalReceiverExt<T> for broadcast::Receiver<Arc<T>> {
    async fn next_signal(&mut self) -> Option<Arc<T>> {
        let mut skipped = 0u64;

        loop {
            match self.recv().await {
                Ok(signal) => {
                    if skipped > 0 {
                        warn!(
                            signal = std::any::type_name::<T>(),
                            skipped, "Signal listener lagged; continuing from oldest retained"
                        );
                    }
                    return Some(signal);
                },
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    skipped = skipped.saturating_add(n);
                    debug!(
                        signal = std::any::type_name::<T>(),
                        skipped = n,
                        total_skipped = skipped,
                        "Signal listener lagged"
                    );
                },
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
