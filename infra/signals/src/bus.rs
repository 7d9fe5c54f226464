use crate::error::SignalError;
use fxhash::FxHashMap;
use parking_lot::RwLock;
use std::any::{Any, TypeId};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::broadcast;
use tracing::{trace, warn};

/// Default buffer for async listeners. Change signals are small and bursty.
const DEFAULT_CAPACITY: usize = 128;
const MIN_CAPACITY: usize = 1;

/// Marker trait for types that can travel over the [`SignalBus`].
///
/// Any type that is `Send + Sync + 'static` automatically implements this trait.
pub trait Signal: Any + Send + Sync + 'static {}
impl<T: Any + Send + Sync + 'static> Signal for T {}

type Handler<T> = Arc<dyn Fn(&T) + Send + Sync>;
type ErasedSlot = Box<dyn Any + Send + Sync>;

struct Slot<T: Signal> {
    handlers: Vec<(u64, Handler<T>)>,
    sender: Option<(broadcast::Sender<Arc<T>>, usize)>,
}

impl<T: Signal> Default for Slot<T> {
    fn default() -> Self {
        Self { handlers: Vec::new(), sender: None }
    }
}

#[derive(Default)]
struct BusInner {
    slots: RwLock<FxHashMap<TypeId, ErasedSlot>>,
    next_handler: AtomicU64,
}

/// Typed change-notification bus.
///
/// Every signal type gets its own slot keyed by [`TypeId`]. A slot carries synchronous
/// handlers (see [`SignalBus::connect`]), invoked on the emitting thread in connection order,
/// and an optional broadcast channel for async listeners (see [`SignalBus::subscribe`]).
#[derive(Clone, Default)]
pub struct SignalBus {
    inner: Arc<BusInner>,
}

impl fmt::Debug for SignalBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalBus").field("slots", &self.inner.slots.read().len()).finish()
    }
}

impl SignalBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Connects a synchronous handler for signals of type `T`.
    ///
    /// The handler stays connected for as long as the returned [`Subscription`] lives,
    /// or forever after [`Subscription::detach`].
    ///
    /// # Errors
    /// Returns [`SignalError::TypeMismatch`] if the slot registry is corrupted.
    ///
    /// # Examples
    /// ```rust
    /// use gatekit_signals::SignalBus;
    /// use std::sync::Arc;
    /// use std::sync::atomic::{AtomicUsize, Ordering};
    ///
    /// struct Changed;
    ///
    /// # fn main() -> Result<(), gatekit_signals::SignalError> {
    /// let bus = SignalBus::new();
    /// let hits = Arc::new(AtomicUsize::new(0));
    /// let counter = hits.clone();
    /// let _sub = bus.connect(move |_: &Changed| {
    ///     counter.fetch_add(1, Ordering::SeqCst);
    /// })?;
    /// bus.emit(Changed);
    /// assert_eq!(hits.load(Ordering::SeqCst), 1);
    /// # Ok(())
    /// # }
    /// ```
    pub fn connect<T, F>(&self, handler: F) -> Result<Subscription, SignalError>
    where
        T: Signal,
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = self.inner.next_handler.fetch_add(1, Ordering::Relaxed);
        {
            let mut slots = self.inner.slots.write();
            let slot = slot_mut::<T>(&mut slots)?;
            slot.handlers.push((id, Arc::new(handler)));
        }
        trace!(signal = std::any::type_name::<T>(), handler = id, "Handler connected");

        Ok(Subscription {
            bus: Arc::downgrade(&self.inner),
            type_id: TypeId::of::<T>(),
            handler: id,
            remove: remove_handler::<T>,
            signal: std::any::type_name::<T>(),
        })
    }

    /// Subscribes an async listener with the default broadcast capacity.
    ///
    /// # Errors
    /// Returns [`SignalError::TypeMismatch`] if the slot registry is corrupted.
    pub fn subscribe<T: Signal>(&self) -> Result<broadcast::Receiver<Arc<T>>, SignalError> {
        self.subscribe_with_capacity::<T>(DEFAULT_CAPACITY)
    }

    /// Subscribes an async listener with a specific broadcast buffer capacity.
    ///
    /// The capacity is fixed by the first subscriber of `T`; later requests only warn.
    ///
    /// # Errors
    /// Returns [`SignalError::InvalidCapacity`] if `capacity` is zero.
    pub fn subscribe_with_capacity<T: Signal>(
        &self,
        capacity: usize,
    ) -> Result<broadcast::Receiver<Arc<T>>, SignalError> {
        let capacity = validate_capacity(capacity)?;
        let mut slots = self.inner.slots.write();
        let slot = slot_mut::<T>(&mut slots)?;

        match &slot.sender {
            Some((tx, existing_capacity)) => {
                if *existing_capacity != capacity {
                    warn!(
                        signal = std::any::type_name::<T>(),
                        existing_capacity,
                        requested_capacity = capacity,
                        "Broadcast channel already initialized with a different capacity"
                    );
                }
                Ok(tx.subscribe())
            },
            None => {
                trace!(
                    signal = std::any::type_name::<T>(),
                    capacity,
                    "Initializing broadcast channel"
                );
                let (tx, rx) = broadcast::channel::<Arc<T>>(capacity);
                slot.sender = Some((tx, capacity));
                Ok(rx)
            },
        }
    }

    /// Emits a signal.
    ///
    /// Handlers are snapshotted under the read lock and invoked after it is released, so a
    /// handler may connect, disconnect, or emit without deadlocking. Returns the number of
    /// deliveries (handlers invoked plus async listeners reached).
    pub fn emit<T: Signal>(&self, signal: T) -> usize {
        let (handlers, sender) = {
            let slots = self.inner.slots.read();
            let Some(slot) = slots.get(&TypeId::of::<T>()) else {
                trace!(signal = std::any::type_name::<T>(), "Signal dropped: no listeners");
                return 0;
            };
            let Some(slot) = slot.downcast_ref::<Slot<T>>() else {
                warn!(signal = std::any::type_name::<T>(), "Signal slot has an unexpected type");
                return 0;
            };
            let handlers: Vec<Handler<T>> =
                slot.handlers.iter().map(|(_, handler)| handler.clone()).collect();
            (handlers, slot.sender.as_ref().map(|(tx, _)| tx.clone()))
        };

        for handler in &handlers {
            handler(&signal);
        }

        let listeners = sender.map_or(0, |tx| tx.send(Arc::new(signal)).unwrap_or(0));
        let delivered = handlers.len() + listeners;
        trace!(signal = std::any::type_name::<T>(), delivered, "Signal emitted");
        delivered
    }

    /// Number of synchronous handlers currently connected for `T`.
    #[must_use]
    pub fn handler_count<T: Signal>(&self) -> usize {
        self.inner
            .slots
            .read()
            .get(&TypeId::of::<T>())
            .and_then(|slot| slot.downcast_ref::<Slot<T>>())
            .map_or(0, |slot| slot.handlers.len())
    }

    /// Drops every slot: handlers are disconnected and async listeners observe closure.
    ///
    /// Returns the number of signal types that were cleared.
    #[must_use]
    pub fn shutdown(&self) -> usize {
        let mut slots = self.inner.slots.write();
        let count = slots.len();
        slots.clear();
        count
    }
}

/// Keeps a handler connected; disconnects it on drop.
#[must_use = "dropping a Subscription disconnects the handler immediately"]
pub struct Subscription {
    bus: Weak<BusInner>,
    type_id: TypeId,
    handler: u64,
    remove: fn(&mut ErasedSlot, u64) -> bool,
    signal: &'static str,
}

impl Subscription {
    /// Leaves the handler connected for the lifetime of the bus.
    pub fn detach(mut self) {
        self.bus = Weak::new();
    }

    /// Disconnects the handler now. Returns `false` if it was already gone.
    pub fn disconnect(mut self) -> bool {
        self.disconnect_inner()
    }

    fn disconnect_inner(&mut self) -> bool {
        let Some(bus) = self.bus.upgrade() else {
            return false;
        };
        self.bus = Weak::new();

        let removed = bus
            .slots
            .write()
            .get_mut(&self.type_id)
            .is_some_and(|slot| (self.remove)(slot, self.handler));
        if removed {
            trace!(signal = self.signal, handler = self.handler, "Handler disconnected");
        }
        removed
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("signal", &self.signal)
            .field("handler", &self.handler)
            .finish_non_exhaustive()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.disconnect_inner();
    }
}

fn slot_mut<T: Signal>(
    slots: &mut FxHashMap<TypeId, ErasedSlot>,
) -> Result<&mut Slot<T>, SignalError> {
    slots
        .entry(TypeId::of::<T>())
        .or_insert_with(|| Box::new(Slot::<T>::default()))
        .downcast_mut::<Slot<T>>()
        .ok_or_else(|| SignalError::TypeMismatch {
            message: std::any::type_name::<T>().into(),
            context: Some("Unexpected signal slot type".into()),
        })
}

fn remove_handler<T: Signal>(slot: &mut ErasedSlot, handler: u64) -> bool {
    let Some(slot) = slot.downcast_mut::<Slot<T>>() else {
        return false;
    };
    let before = slot.handlers.len();
    slot.handlers.retain(|(id, _)| *id != handler);
    slot.handlers.len() != before
}

fn validate_capacity(capacity: usize) -> Result<usize, SignalError> {
    if capacity < MIN_CAPACITY {
        return Err(SignalError::InvalidCapacity {
            message: "capacity must be greater than zero".into(),
            context: None,
        });
    }
    Ok(capacity)
}
