#![allow(dead_code)]

use gatekit_availability::{
    AuthorizationCallback, AvailabilityChecker, ConstraintsEvaluator, MemoryPurchaseTracker,
    MemoryToggleStore, PermissionChecker, PermissionEvaluator, PurchaseEvaluator,
    PurchaseTracker, RuntimeToggleEvaluator, RuntimeToggles, UserToggleEvaluator,
    UserToggleStore,
};
use gatekit_domain::config::AvailabilityConfig;
use gatekit_domain::{FeatureId, PermissionKind, PermissionStatus, ProductId};
use gatekit_signals::SignalBus;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Purchase tracker that counts backend lookups.
#[derive(Debug)]
pub struct CountingTracker {
    pub inner: MemoryPurchaseTracker,
    pub calls: AtomicUsize,
}

impl PurchaseTracker for CountingTracker {
    fn is_purchased(&self, product: &ProductId) -> Option<bool> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.is_purchased(product)
    }
}

/// Toggle store that counts backend lookups.
#[derive(Debug)]
pub struct CountingToggles {
    pub inner: MemoryToggleStore,
    pub calls: AtomicUsize,
}

impl UserToggleStore for CountingToggles {
    fn is_enabled(&self, feature: &FeatureId) -> Option<bool> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.is_enabled(feature)
    }
}

/// Permission checker with scripted statuses that counts lookups. Unscripted kinds are
/// undetermined.
#[derive(Debug, Default)]
pub struct CountingPermissions {
    pub statuses: Mutex<HashMap<PermissionKind, PermissionStatus>>,
    pub calls: AtomicUsize,
}

impl CountingPermissions {
    pub fn set(&self, kind: PermissionKind, status: PermissionStatus) {
        self.statuses.lock().unwrap().insert(kind, status);
    }
}

impl PermissionChecker for CountingPermissions {
    fn status(&self, kind: &PermissionKind) -> PermissionStatus {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.statuses.lock().unwrap().get(kind).copied().unwrap_or(PermissionStatus::NotDetermined)
    }

    fn request_authorization(&self, kind: &PermissionKind, callback: AuthorizationCallback) {
        callback(self.status(kind));
    }
}

/// A checker wired to in-memory, counting backends.
pub struct Harness {
    pub bus: SignalBus,
    pub tracker: Arc<CountingTracker>,
    pub toggles: Arc<CountingToggles>,
    pub permissions: Arc<CountingPermissions>,
    pub runtime: RuntimeToggles,
    pub evaluator: Arc<ConstraintsEvaluator>,
    pub checker: AvailabilityChecker,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(&AvailabilityConfig::default())
    }

    pub fn with_config(config: &AvailabilityConfig) -> Self {
        let bus = SignalBus::new();
        let tracker = Arc::new(CountingTracker {
            inner: MemoryPurchaseTracker::new(bus.clone()),
            calls: AtomicUsize::new(0),
        });
        let toggles = Arc::new(CountingToggles {
            inner: MemoryToggleStore::new(bus.clone()),
            calls: AtomicUsize::new(0),
        });
        let permissions = Arc::new(CountingPermissions::default());
        let runtime = RuntimeToggles::new();
        let evaluator = Arc::new(
            ConstraintsEvaluator::new()
                .with_evaluator(Arc::new(PurchaseEvaluator::new(tracker.clone())))
                .with_evaluator(Arc::new(UserToggleEvaluator::new(toggles.clone())))
                .with_evaluator(Arc::new(RuntimeToggleEvaluator::new(runtime.clone())))
                .with_evaluator(Arc::new(PermissionEvaluator::new(permissions.clone()))),
        );
        let checker = AvailabilityChecker::new(evaluator.clone(), &bus, config).unwrap();
        Self { bus, tracker, toggles, permissions, runtime, evaluator, checker }
    }

    pub fn purchase_calls(&self) -> usize {
        self.tracker.calls.load(Ordering::SeqCst)
    }

    pub fn toggle_calls(&self) -> usize {
        self.toggles.calls.load(Ordering::SeqCst)
    }

    pub fn permission_calls(&self) -> usize {
        self.permissions.calls.load(Ordering::SeqCst)
    }
}

pub fn id(path: &str) -> FeatureId {
    FeatureId::parse(path).unwrap()
}
