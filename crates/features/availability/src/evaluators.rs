//! One evaluator per constraint kind.

use crate::permissions::PermissionChecker;
use crate::sources::{PurchaseTracker, RuntimeToggles, UserToggleStore};
use gatekit_domain::{
    Constraint, ConstraintKinds, FeatureId, MatchCriteria, Os, PlatformInfo, PurchaseRequirement,
    Version,
};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

/// Decides whether one kind of constraint is fulfilled for a feature.
///
/// Evaluators consulting external systems must answer `None` rather than block.
pub trait ConstraintEvaluator: Send + Sync + fmt::Debug {
    /// The kinds this evaluator handles.
    fn kinds(&self) -> ConstraintKinds;

    /// Whether `constraint` applies in this process at all. Inactive constraints are
    /// reported `NotActive` and ignored.
    fn is_active(&self, _constraint: &Constraint) -> bool {
        true
    }

    fn is_fulfilled(&self, constraint: &Constraint, feature: &FeatureId) -> Option<bool>;
}

/// Platform constraints against the OS the process runs on.
#[derive(Debug, Clone, Copy)]
pub struct PlatformEvaluator {
    platform: Option<PlatformInfo>,
}

impl PlatformEvaluator {
    #[must_use]
    pub const fn new(platform: PlatformInfo) -> Self {
        Self { platform: Some(platform) }
    }

    /// Uses the compile-time OS and the running kernel version (`0.0.0` if unreadable).
    /// On an OS outside [`Os`] every platform constraint is inactive.
    #[must_use]
    pub fn detect() -> Self {
        let platform = Os::current().map(|os| PlatformInfo { os, version: detect_version() });
        debug!(?platform, "Detected platform");
        Self { platform }
    }

    #[must_use]
    pub const fn platform(&self) -> Option<PlatformInfo> {
        self.platform
    }
}

#[cfg(target_os = "linux")]
fn detect_version() -> Version {
    std::fs::read_to_string("/proc/sys/kernel/osrelease")
        .ok()
        .and_then(|release| release.parse().ok())
        .unwrap_or_default()
}

#[cfg(not(target_os = "linux"))]
fn detect_version() -> Version {
    Version::default()
}

impl ConstraintEvaluator for PlatformEvaluator {
    fn kinds(&self) -> ConstraintKinds {
        ConstraintKinds::PLATFORM
    }

    fn is_active(&self, constraint: &Constraint) -> bool {
        match (constraint, self.platform) {
            (Constraint::Platform { os, .. }, Some(platform)) => *os == platform.os,
            _ => false,
        }
    }

    fn is_fulfilled(&self, constraint: &Constraint, _feature: &FeatureId) -> Option<bool> {
        match (constraint, self.platform) {
            (Constraint::Platform { os, version }, Some(platform)) if *os == platform.os => {
                Some(version.matches(&platform.version))
            },
            _ => Some(false),
        }
    }
}

/// `RuntimeEnabled` against [`RuntimeToggles`]; always determinate.
#[derive(Debug, Clone)]
pub struct RuntimeToggleEvaluator {
    toggles: RuntimeToggles,
}

impl RuntimeToggleEvaluator {
    #[must_use]
    pub const fn new(toggles: RuntimeToggles) -> Self {
        Self { toggles }
    }
}

impl ConstraintEvaluator for RuntimeToggleEvaluator {
    fn kinds(&self) -> ConstraintKinds {
        ConstraintKinds::RUNTIME_TOGGLE
    }

    fn is_fulfilled(&self, _constraint: &Constraint, feature: &FeatureId) -> Option<bool> {
        Some(self.toggles.is_enabled(feature))
    }
}

/// `UserToggled` against the stored preference. The declared default is not applied here.
#[derive(Debug, Clone)]
pub struct UserToggleEvaluator {
    store: Arc<dyn UserToggleStore>,
}

impl UserToggleEvaluator {
    #[must_use]
    pub fn new(store: Arc<dyn UserToggleStore>) -> Self {
        Self { store }
    }
}

impl ConstraintEvaluator for UserToggleEvaluator {
    fn kinds(&self) -> ConstraintKinds {
        ConstraintKinds::USER_TOGGLE
    }

    fn is_fulfilled(&self, _constraint: &Constraint, feature: &FeatureId) -> Option<bool> {
        self.store.is_enabled(feature)
    }
}

/// `Purchase` requirements against a [`PurchaseTracker`].
#[derive(Debug, Clone)]
pub struct PurchaseEvaluator {
    tracker: Arc<dyn PurchaseTracker>,
}

impl PurchaseEvaluator {
    #[must_use]
    pub fn new(tracker: Arc<dyn PurchaseTracker>) -> Self {
        Self { tracker }
    }

    /// Three-valued evaluation: a decided product settles `Any`/`All` even while others are
    /// unknown. Dependencies must hold as well.
    fn evaluate(&self, requirement: &PurchaseRequirement) -> Option<bool> {
        let products = requirement.products.iter().map(|p| self.tracker.is_purchased(p));
        let own = match requirement.criteria {
            MatchCriteria::All => kleene_all(products),
            MatchCriteria::Any => kleene_any(products),
        };
        let dependencies = kleene_all(requirement.dependencies.iter().map(|d| self.evaluate(d)));
        let result = kleene_all([own, dependencies]);
        trace!(products = ?requirement.products, ?result, "Purchase requirement evaluated");
        result
    }
}

impl ConstraintEvaluator for PurchaseEvaluator {
    fn kinds(&self) -> ConstraintKinds {
        ConstraintKinds::PURCHASE
    }

    fn is_fulfilled(&self, constraint: &Constraint, _feature: &FeatureId) -> Option<bool> {
        match constraint {
            Constraint::Purchase(requirement) => self.evaluate(requirement),
            _ => Some(false),
        }
    }
}

/// `Permission` constraints against a [`PermissionChecker`].
#[derive(Debug, Clone)]
pub struct PermissionEvaluator {
    checker: Arc<dyn PermissionChecker>,
}

impl PermissionEvaluator {
    #[must_use]
    pub fn new(checker: Arc<dyn PermissionChecker>) -> Self {
        Self { checker }
    }
}

impl ConstraintEvaluator for PermissionEvaluator {
    fn kinds(&self) -> ConstraintKinds {
        ConstraintKinds::PERMISSION
    }

    fn is_fulfilled(&self, constraint: &Constraint, _feature: &FeatureId) -> Option<bool> {
        match constraint {
            Constraint::Permission(kind) => self.checker.status(kind).fulfilment(),
            _ => Some(false),
        }
    }
}

/// Kleene conjunction: any `false` wins, then any `None`.
pub(crate) fn kleene_all(values: impl IntoIterator<Item = Option<bool>>) -> Option<bool> {
    let mut result = Some(true);
    for value in values {
        match value {
            Some(false) => return Some(false),
            None => result = None,
            Some(true) => {},
        }
    }
    result
}

/// Kleene disjunction: any `true` wins, then any `None`. Empty is `false`.
fn kleene_any(values: impl IntoIterator<Item = Option<bool>>) -> Option<bool> {
    let mut result = Some(false);
    for value in values {
        match value {
            Some(true) => return Some(true),
            None => result = None,
            Some(false) => {},
        }
    }
    result
}
