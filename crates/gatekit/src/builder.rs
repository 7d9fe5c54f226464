use crate::error::GatekitError;
use crate::gate::{Gatekit, GatekitInner};
use gatekit_availability::{
    AdapterPermissionChecker, AvailabilityChecker, ConstraintsEvaluator, MemoryPurchaseTracker,
    MemoryToggleStore, PermissionAdapterRegistry, PermissionChecker, PermissionEvaluator,
    PlatformEvaluator, PurchaseEvaluator, PurchaseTracker, RuntimeToggleEvaluator, RuntimeToggles,
    UserToggleEvaluator, UserToggleStore,
};
use gatekit_dispatch::{ActionDispatcher, FeatureCatalog, StackTracker};
use gatekit_domain::config::GateConfig;
use gatekit_signals::SignalBus;
use std::sync::Arc;
use tracing::{info, warn};

/// Assembles a [`Gatekit`].
///
/// Every backend is optional. Missing ones fall back to:
/// * purchases and user toggles: in-memory stores on the builder's bus,
/// * permissions: an [`AdapterPermissionChecker`] without adapters (everything unsupported),
/// * platform: [`PlatformEvaluator::detect`].
///
/// Pass a `bus` explicitly when a backend you construct must emit on it. Building with an
/// injected backend but no bus logs a warning: the checker then listens on a bus of its own
/// and never hears that backend's change signals.
#[derive(Debug, Default)]
#[must_use = "The builder does nothing until `build` is called."]
pub struct GatekitBuilder {
    config: GateConfig,
    bus: Option<SignalBus>,
    purchases: Option<Arc<dyn PurchaseTracker>>,
    toggles: Option<Arc<dyn UserToggleStore>>,
    permissions: Option<Arc<dyn PermissionChecker>>,
    platform: Option<PlatformEvaluator>,
    runtime_toggles: Option<RuntimeToggles>,
}

impl GatekitBuilder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: GateConfig) -> Self {
        self.config = config;
        self
    }

    pub fn bus(mut self, bus: SignalBus) -> Self {
        self.bus = Some(bus);
        self
    }

    pub fn purchases(mut self, tracker: Arc<dyn PurchaseTracker>) -> Self {
        self.purchases = Some(tracker);
        self
    }

    pub fn user_toggles(mut self, store: Arc<dyn UserToggleStore>) -> Self {
        self.toggles = Some(store);
        self
    }

    pub fn permissions(mut self, checker: Arc<dyn PermissionChecker>) -> Self {
        self.permissions = Some(checker);
        self
    }

    pub fn platform(mut self, platform: PlatformEvaluator) -> Self {
        self.platform = Some(platform);
        self
    }

    pub fn runtime_toggles(mut self, toggles: RuntimeToggles) -> Self {
        self.runtime_toggles = Some(toggles);
        self
    }

    /// Wires the evaluators, catalog, checker, dispatcher and stack tracker.
    ///
    /// # Errors
    /// * [`GatekitError::Availability`] if the checker cannot subscribe to change signals.
    /// * [`GatekitError::Dispatch`] if the dispatcher's threads cannot be started.
    pub fn build(self) -> Result<Gatekit, GatekitError> {
        let Self { config, bus, purchases, toggles, permissions, platform, runtime_toggles } = self;
        if bus.is_none() {
            warn_on_private_bus(purchases.is_some(), toggles.is_some(), permissions.is_some());
        }
        let bus = bus.unwrap_or_default();

        let (purchases, memory_purchases) = match purchases {
            Some(injected) => (injected, None),
            None => {
                let memory = MemoryPurchaseTracker::new(bus.clone());
                (Arc::new(memory.clone()) as Arc<dyn PurchaseTracker>, Some(memory))
            }
        };
        let (user_toggles, memory_toggles) = match toggles {
            Some(injected) => (injected, None),
            None => {
                let memory = MemoryToggleStore::new(bus.clone());
                (Arc::new(memory.clone()) as Arc<dyn UserToggleStore>, Some(memory))
            }
        };
        let permissions = permissions.unwrap_or_else(|| {
            Arc::new(AdapterPermissionChecker::new(&PermissionAdapterRegistry::new(), bus.clone()))
        });
        let platform = platform.unwrap_or_else(PlatformEvaluator::detect);
        let runtime_toggles = runtime_toggles.unwrap_or_default();

        let evaluator = Arc::new(
            ConstraintsEvaluator::new()
                .with_evaluator(Arc::new(platform))
                .with_evaluator(Arc::new(RuntimeToggleEvaluator::new(runtime_toggles.clone())))
                .with_evaluator(Arc::new(UserToggleEvaluator::new(Arc::clone(&user_toggles))))
                .with_evaluator(Arc::new(PurchaseEvaluator::new(Arc::clone(&purchases))))
                .with_evaluator(Arc::new(PermissionEvaluator::new(Arc::clone(&permissions)))),
        );

        let catalog = FeatureCatalog::new(Arc::clone(&evaluator));
        let checker = AvailabilityChecker::new(evaluator, &bus, &config.availability)?;
        let dispatcher = ActionDispatcher::new(&config.dispatch)?;
        let stacks = Arc::new(StackTracker::new(&config.stacks));

        info!(
            cache = config.availability.cache_enabled,
            observers = config.dispatch.notify_observers,
            default_session = %config.stacks.default_session,
            "Gatekit ready"
        );

        Ok(Gatekit::from_inner(GatekitInner {
            config,
            bus,
            purchases,
            memory_purchases,
            user_toggles,
            memory_toggles,
            runtime_toggles,
            permissions,
            catalog,
            checker,
            dispatcher,
            stacks,
        }))
    }
}

fn warn_on_private_bus(purchases: bool, toggles: bool, permissions: bool) {
    let injected: Vec<&str> =
        [(purchases, "purchases"), (toggles, "user_toggles"), (permissions, "permissions")]
            .into_iter()
            .filter_map(|(set, name)| set.then_some(name))
            .collect();
    if !injected.is_empty() {
        warn!(
            backends = ?injected,
            "Backends injected without a bus; their change signals will not reach the checker"
        );
    }
}
