//! Backends the evaluators consult, and the change signals they emit.
//!
//! Hosts implement [`PurchaseTracker`] and [`UserToggleStore`] over their own stores. The
//! in-memory implementations here are complete enough for prototypes and tests.

use fxhash::FxHashMap;
use gatekit_domain::{FeatureId, PermissionKind, PermissionStatus, ProductId};
use gatekit_signals::SignalBus;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Purchase state changed; `product` is `None` when the whole store reloaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseStatusChanged {
    pub product: Option<ProductId>,
}

/// A user preference changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserToggleChanged {
    pub feature: FeatureId,
}

/// A permission's authorization state changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionStatusChanged {
    pub kind: PermissionKind,
    pub status: PermissionStatus,
}

/// Answers whether a product has been purchased.
pub trait PurchaseTracker: Send + Sync + fmt::Debug {
    /// `None` while the purchase state is still loading.
    fn is_purchased(&self, product: &ProductId) -> Option<bool>;
}

/// Stores per-feature user preferences.
pub trait UserToggleStore: Send + Sync + fmt::Debug {
    /// `None` when the user has not expressed a preference.
    fn is_enabled(&self, feature: &FeatureId) -> Option<bool>;
}

/// In-memory [`PurchaseTracker`]. Unknown products report `None`.
#[derive(Debug, Clone)]
pub struct MemoryPurchaseTracker {
    purchases: Arc<RwLock<FxHashMap<ProductId, bool>>>,
    bus: SignalBus,
}

impl MemoryPurchaseTracker {
    #[must_use]
    pub fn new(bus: SignalBus) -> Self {
        Self { purchases: Arc::default(), bus }
    }

    /// Records the purchase state of `product` and emits [`PurchaseStatusChanged`].
    pub fn set_purchased(&self, product: impl Into<ProductId>, purchased: bool) {
        let product = product.into();
        let previous = self.purchases.write().insert(product.clone(), purchased);
        if previous != Some(purchased) {
            debug!(product = %product, purchased, "Purchase state changed");
            self.bus.emit(PurchaseStatusChanged { product: Some(product) });
        }
    }

    /// Forgets every product, as if the store were reloading.
    pub fn reset(&self) {
        self.purchases.write().clear();
        self.bus.emit(PurchaseStatusChanged { product: None });
    }
}

impl PurchaseTracker for MemoryPurchaseTracker {
    fn is_purchased(&self, product: &ProductId) -> Option<bool> {
        self.purchases.read().get(product).copied()
    }
}

/// In-memory [`UserToggleStore`].
#[derive(Debug, Clone)]
pub struct MemoryToggleStore {
    toggles: Arc<RwLock<FxHashMap<FeatureId, bool>>>,
    bus: SignalBus,
}

impl MemoryToggleStore {
    #[must_use]
    pub fn new(bus: SignalBus) -> Self {
        Self { toggles: Arc::default(), bus }
    }

    /// Stores a preference and emits [`UserToggleChanged`] if it changed.
    pub fn set(&self, feature: &FeatureId, enabled: bool) {
        let previous = self.toggles.write().insert(feature.clone(), enabled);
        if previous != Some(enabled) {
            debug!(feature = %feature, enabled, "User toggle changed");
            self.bus.emit(UserToggleChanged { feature: feature.clone() });
        }
    }

    /// Removes the preference so the declared default applies again.
    pub fn clear(&self, feature: &FeatureId) {
        if self.toggles.write().remove(feature).is_some() {
            self.bus.emit(UserToggleChanged { feature: feature.clone() });
        }
    }
}

impl UserToggleStore for MemoryToggleStore {
    fn is_enabled(&self, feature: &FeatureId) -> Option<bool> {
        self.toggles.read().get(feature).copied()
    }
}

/// Live flags for features declaring `RuntimeEnabled`. Unset flags read as disabled.
///
/// Results depending on these flags are never cached, so flipping one needs no signal.
#[derive(Debug, Clone, Default)]
pub struct RuntimeToggles {
    flags: Arc<RwLock<FxHashMap<FeatureId, bool>>>,
}

impl RuntimeToggles {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, feature: &FeatureId, enabled: bool) {
        self.flags.write().insert(feature.clone(), enabled);
    }

    #[must_use]
    pub fn is_enabled(&self, feature: &FeatureId) -> bool {
        self.flags.read().get(feature).copied().unwrap_or(false)
    }
}
