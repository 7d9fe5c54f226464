//! System permission checks.
//!
//! Platform-specific code lives behind [`PermissionAdapter`]. Adapters are registered per
//! [`PermissionKind`] in a [`PermissionAdapterRegistry`] together with a capability
//! predicate; [`AdapterPermissionChecker`] resolves them once, when it is built.

use crate::sources::PermissionStatusChanged;
use fxhash::FxHashMap;
use gatekit_domain::{PermissionKind, PermissionStatus};
use gatekit_signals::SignalBus;
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Callback receiving the outcome of an authorization request.
pub type AuthorizationCallback = Box<dyn FnOnce(PermissionStatus) + Send + 'static>;

/// Answers and requests system permissions.
pub trait PermissionChecker: Send + Sync + fmt::Debug {
    fn status(&self, kind: &PermissionKind) -> PermissionStatus;

    /// Asks the user (or the platform) for `kind`. `callback` runs exactly once, possibly on
    /// another thread.
    fn request_authorization(&self, kind: &PermissionKind, callback: AuthorizationCallback);
}

/// Platform binding for a single permission.
pub trait PermissionAdapter: Send + Sync + fmt::Debug {
    fn status(&self) -> PermissionStatus;

    fn request(&self, callback: AuthorizationCallback);
}

type SupportProbe = Arc<dyn Fn() -> bool + Send + Sync>;
type AdapterFactory = Arc<dyn Fn() -> Arc<dyn PermissionAdapter> + Send + Sync>;

#[derive(Clone)]
struct Registration {
    is_supported: SupportProbe,
    construct: AdapterFactory,
}

/// Maps each permission kind to an adapter constructor guarded by a support probe.
#[derive(Clone, Default)]
pub struct PermissionAdapterRegistry {
    entries: FxHashMap<PermissionKind, Registration>,
}

impl fmt::Debug for PermissionAdapterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PermissionAdapterRegistry")
            .field("kinds", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl PermissionAdapterRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `construct` for `kind`, used only if `is_supported` holds at resolution.
    /// A later registration for the same kind replaces the earlier one.
    #[must_use]
    pub fn register<P, C>(mut self, kind: PermissionKind, is_supported: P, construct: C) -> Self
    where
        P: Fn() -> bool + Send + Sync + 'static,
        C: Fn() -> Arc<dyn PermissionAdapter> + Send + Sync + 'static,
    {
        self.entries.insert(
            kind,
            Registration { is_supported: Arc::new(is_supported), construct: Arc::new(construct) },
        );
        self
    }

    fn resolve(&self) -> FxHashMap<PermissionKind, Arc<dyn PermissionAdapter>> {
        self.entries
            .iter()
            .filter(|(kind, registration)| {
                let supported = (registration.is_supported)();
                debug!(permission = %kind, supported, "Resolving permission adapter");
                supported
            })
            .map(|(kind, registration)| (*kind, (registration.construct)()))
            .collect()
    }
}

/// [`PermissionChecker`] over resolved adapters with an in-process grant cache.
///
/// Kinds without a supported adapter report [`PermissionStatus::Unsupported`]. Decisions
/// obtained through [`request_authorization`](PermissionChecker::request_authorization) are
/// remembered for the process lifetime and announced with [`PermissionStatusChanged`].
#[derive(Debug, Clone)]
pub struct AdapterPermissionChecker {
    adapters: Arc<FxHashMap<PermissionKind, Arc<dyn PermissionAdapter>>>,
    grants: Arc<RwLock<FxHashMap<PermissionKind, PermissionStatus>>>,
    bus: SignalBus,
}

impl AdapterPermissionChecker {
    #[must_use]
    pub fn new(registry: &PermissionAdapterRegistry, bus: SignalBus) -> Self {
        let adapters = registry.resolve();
        info!(adapters = adapters.len(), "Permission checker ready");
        Self { adapters: Arc::new(adapters), grants: Arc::default(), bus }
    }

    /// Drops the cached grant for `kind` and re-reads the adapter, emitting a change signal
    /// if the status moved.
    pub fn refresh(&self, kind: &PermissionKind) -> PermissionStatus {
        let previous = self.grants.write().remove(kind);
        let current = self.status(kind);
        if previous.is_some_and(|p| p != current) {
            self.bus.emit(PermissionStatusChanged { kind: *kind, status: current });
        }
        current
    }

    fn record(&self, kind: PermissionKind, status: PermissionStatus) {
        if status == PermissionStatus::NotDetermined {
            return;
        }
        let previous = self.grants.write().insert(kind, status);
        if previous != Some(status) {
            debug!(permission = %kind, status = %status, "Permission decision recorded");
            self.bus.emit(PermissionStatusChanged { kind, status });
        }
    }
}

impl PermissionChecker for AdapterPermissionChecker {
    fn status(&self, kind: &PermissionKind) -> PermissionStatus {
        if let Some(status) = self.grants.read().get(kind) {
            return *status;
        }
        self.adapters.get(kind).map_or(PermissionStatus::Unsupported, |adapter| adapter.status())
    }

    fn request_authorization(&self, kind: &PermissionKind, callback: AuthorizationCallback) {
        let current = self.status(kind);
        let Some(adapter) = self.adapters.get(kind).filter(|_| current.fulfilment().is_none())
        else {
            callback(current);
            return;
        };

        let checker = self.clone();
        let kind = *kind;
        adapter.request(Box::new(move |status| {
            checker.record(kind, status);
            callback(status);
        }));
    }
}

/// Adapter with a scripted answer, for hosts without a permission system and for tests.
#[derive(Debug)]
pub struct FixedPermissionAdapter {
    status: Mutex<PermissionStatus>,
    on_request: PermissionStatus,
}

impl FixedPermissionAdapter {
    /// Reports `status` until a request resolves it to `on_request`.
    #[must_use]
    pub const fn new(status: PermissionStatus, on_request: PermissionStatus) -> Self {
        Self { status: Mutex::new(status), on_request }
    }
}

impl PermissionAdapter for FixedPermissionAdapter {
    fn status(&self) -> PermissionStatus {
        *self.status.lock()
    }

    fn request(&self, callback: AuthorizationCallback) {
        *self.status.lock() = self.on_request;
        callback(self.on_request);
    }
}
