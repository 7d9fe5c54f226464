//! The assembled service and its optional process-wide slot.

use crate::builder::GatekitBuilder;
use crate::error::GatekitError;
use gatekit_availability::{
    AvailabilityChecker, MemoryPurchaseTracker, MemoryToggleStore, PermissionChecker,
    PurchaseTracker, RuntimeToggles, UserToggleStore,
};
use gatekit_dispatch::{ActionDispatcher, ActionSession, FeatureCatalog, StackTracker};
use gatekit_domain::FeatureId;
use gatekit_domain::config::GateConfig;
use gatekit_kernel::config::load_gate_config;
use gatekit_logger::Logger;
use gatekit_signals::SignalBus;
use parking_lot::RwLock;
use std::path::Path;
use std::sync::{Arc, LazyLock};
use tracing::{debug, info};

static GLOBAL: LazyLock<RwLock<Option<Gatekit>>> = LazyLock::new(RwLock::default);

/// Every gatekit service, wired together and shared by cloning.
///
/// Hosts usually build one per process, register their features on [`catalog`](Self::catalog)
/// and perform actions through [`session`](Self::session). [`install`](Self::install) makes the
/// instance reachable through [`global`](Self::global) for code that cannot be handed one.
#[gatekit_derive::gate_handle]
pub struct Gatekit {
    pub(crate) config: GateConfig,
    pub(crate) bus: SignalBus,
    pub(crate) purchases: Arc<dyn PurchaseTracker>,
    pub(crate) memory_purchases: Option<MemoryPurchaseTracker>,
    pub(crate) user_toggles: Arc<dyn UserToggleStore>,
    pub(crate) memory_toggles: Option<MemoryToggleStore>,
    pub(crate) runtime_toggles: RuntimeToggles,
    pub(crate) permissions: Arc<dyn PermissionChecker>,
    pub(crate) catalog: FeatureCatalog,
    pub(crate) checker: AvailabilityChecker,
    pub(crate) dispatcher: ActionDispatcher,
    pub(crate) stacks: Arc<StackTracker>,
}

impl Gatekit {
    pub fn builder() -> GatekitBuilder {
        GatekitBuilder::new()
    }

    /// Loads the layered configuration (file at `path` or `gatekit.*`, then `GATEKIT__`
    /// variables) and builds with default backends.
    ///
    /// # Errors
    /// [`GatekitError::Config`] for unreadable configuration, plus every error of
    /// [`GatekitBuilder::build`].
    pub fn load(path: Option<impl AsRef<Path>>) -> Result<Self, GatekitError> {
        let config = load_gate_config(path)?;
        Self::builder().config(config).build()
    }

    /// Installs the `tracing` subscriber described by the `[logging]` section.
    ///
    /// # Errors
    /// Returns [`GatekitError::Logger`] for an invalid section or when a subscriber is
    /// already installed.
    pub fn init_logging(&self) -> Result<Logger, GatekitError> {
        Ok(Logger::from_config(&self.config.logging)?)
    }

    #[must_use]
    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// The bus change signals travel on. Backends built outside the facade emit here.
    #[must_use]
    pub fn bus(&self) -> &SignalBus {
        &self.bus
    }

    /// The purchase tracker the evaluators consult, injected or built in.
    #[must_use]
    pub fn purchases(&self) -> &Arc<dyn PurchaseTracker> {
        &self.purchases
    }

    /// The built-in purchase store, present when no tracker was injected.
    #[must_use]
    pub fn memory_purchases(&self) -> Option<&MemoryPurchaseTracker> {
        self.memory_purchases.as_ref()
    }

    #[must_use]
    pub fn user_toggles(&self) -> &Arc<dyn UserToggleStore> {
        &self.user_toggles
    }

    /// The built-in user toggle store, present when no store was injected.
    #[must_use]
    pub fn memory_toggles(&self) -> Option<&MemoryToggleStore> {
        self.memory_toggles.as_ref()
    }

    #[must_use]
    pub fn runtime_toggles(&self) -> &RuntimeToggles {
        &self.runtime_toggles
    }

    #[must_use]
    pub fn permissions(&self) -> &Arc<dyn PermissionChecker> {
        &self.permissions
    }

    #[must_use]
    pub fn catalog(&self) -> &FeatureCatalog {
        &self.catalog
    }

    #[must_use]
    pub fn checker(&self) -> &AvailabilityChecker {
        &self.checker
    }

    #[must_use]
    pub fn dispatcher(&self) -> &ActionDispatcher {
        &self.dispatcher
    }

    #[must_use]
    pub fn stacks(&self) -> &Arc<StackTracker> {
        &self.stacks
    }

    /// A session named `name`. Sessions with the same name share their stacks.
    #[must_use]
    pub fn session(&self, name: &str) -> ActionSession {
        ActionSession::new(
            name,
            self.catalog.clone(),
            self.checker.clone(),
            self.dispatcher.clone(),
            Arc::clone(&self.stacks),
        )
    }

    /// The session named by `stacks.default_session`.
    #[must_use]
    pub fn main_session(&self) -> ActionSession {
        self.session(&self.config.stacks.default_session)
    }

    /// Shorthand for [`AvailabilityChecker::is_available`].
    ///
    /// # Errors
    /// Returns [`GatekitError::Availability`] for unregistered features.
    pub fn is_available(&self, feature: &FeatureId) -> Result<Option<bool>, GatekitError> {
        Ok(self.checker.is_available(feature)?)
    }

    /// Makes this instance the process-wide one.
    ///
    /// # Errors
    /// Returns [`GatekitError::AlreadyInstalled`] if another instance is installed; call
    /// [`reset`](Self::reset) first to replace it.
    pub fn install(self) -> Result<(), GatekitError> {
        let mut slot = GLOBAL.write();
        if slot.is_some() {
            return Err(GatekitError::AlreadyInstalled {
                message: "reset the installed instance first".into(),
                context: None,
            });
        }
        *slot = Some(self);
        drop(slot);
        info!("Gatekit installed");
        Ok(())
    }

    /// The installed instance, if any.
    #[must_use]
    pub fn global() -> Option<Self> {
        GLOBAL.read().clone()
    }

    /// Uninstalls the process-wide instance and clears its registries: catalog, evaluator
    /// registrations, cached verdicts and action stacks.
    ///
    /// Returns the uninstalled instance. Handles cloned earlier see the cleared state.
    pub fn reset() -> Option<Self> {
        let previous = GLOBAL.write().take()?;
        previous.catalog.reset();
        previous.checker.invalidate();
        previous.stacks.reset();
        debug!("Gatekit reset");
        Some(previous)
    }
}
