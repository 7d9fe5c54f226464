//! Cached, hierarchical availability checks.
//!
//! A feature is available when every active constraint it declares holds and its nearest
//! conditional ancestor is available. Results are tri-state: `None` means some backend has not
//! answered yet, and is never cached.

use crate::declaration::DeclaredConstraints;
use crate::error::AvailabilityError;
use crate::evaluator::{ConstraintEvaluation, ConstraintsEvaluator};
use crate::evaluators::kleene_all;
use crate::sources::{PermissionStatusChanged, PurchaseStatusChanged, UserToggleChanged};
use fxhash::FxHashMap;
use gatekit_domain::config::AvailabilityConfig;
use gatekit_domain::{Constraint, ConstraintResult, ConstraintStatus, FeatureId};
use gatekit_signals::{Signal, SignalBus, Subscription};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, trace};

#[derive(Debug, Default)]
struct AvailabilityCache {
    entries: FxHashMap<FeatureId, bool>,
    /// Bumped on every invalidation; a computation only stores its result if the generation it
    /// started under is still current.
    generation: u64,
}

impl AvailabilityCache {
    fn invalidate(&mut self) {
        self.entries.clear();
        self.generation = self.generation.wrapping_add(1);
    }
}

/// Answers `is_available` for registered features.
///
/// Cloning is cheap; clones share the cache. The cache is cleared whenever a
/// [`PurchaseStatusChanged`], [`UserToggleChanged`] or [`PermissionStatusChanged`] signal is
/// emitted on the bus the checker was built with.
#[gatekit_derive::gate_handle]
pub struct AvailabilityChecker {
    evaluator: Arc<ConstraintsEvaluator>,
    cache: Arc<Mutex<AvailabilityCache>>,
    cache_enabled: bool,
    subscriptions: Vec<Subscription>,
}

impl AvailabilityChecker {
    /// Builds a checker over `evaluator` and connects its invalidation handlers to `bus`.
    ///
    /// # Errors
    /// Returns [`AvailabilityError::Signal`] if a handler cannot be connected.
    pub fn new(
        evaluator: Arc<ConstraintsEvaluator>,
        bus: &SignalBus,
        config: &AvailabilityConfig,
    ) -> Result<Self, AvailabilityError> {
        let cache = Arc::new(Mutex::new(AvailabilityCache::default()));
        let subscriptions = vec![
            invalidate_on::<PurchaseStatusChanged>(bus, &cache)?,
            invalidate_on::<UserToggleChanged>(bus, &cache)?,
            invalidate_on::<PermissionStatusChanged>(bus, &cache)?,
        ];
        debug!(cache_enabled = config.cache_enabled, "Availability checker ready");

        Ok(Self::from_inner(AvailabilityCheckerInner {
            evaluator,
            cache,
            cache_enabled: config.cache_enabled,
            subscriptions,
        }))
    }

    #[must_use]
    pub fn evaluator(&self) -> &Arc<ConstraintsEvaluator> {
        &self.evaluator
    }

    /// Whether `feature` is available: `Some(true)`, `Some(false)`, or `None` while
    /// undetermined.
    ///
    /// # Errors
    /// Returns [`AvailabilityError::UnknownFeature`] for an unregistered feature.
    pub fn is_available(&self, feature: &FeatureId) -> Result<Option<bool>, AvailabilityError> {
        let declared = self.declared(feature)?;
        let cacheable = self.cache_enabled && self.is_cacheable(feature, &declared);

        let generation = {
            let cache = self.cache.lock();
            if cacheable {
                if let Some(&available) = cache.entries.get(feature) {
                    trace!(feature = %feature, available, "Availability cache hit");
                    return Ok(Some(available));
                }
            }
            cache.generation
        };

        let verdict = self.compute(feature, &declared)?;

        if let Some(available) = verdict.filter(|_| cacheable) {
            let mut cache = self.cache.lock();
            if cache.generation == generation {
                cache.entries.insert(feature.clone(), available);
            } else {
                trace!(feature = %feature, "Discarding result computed before an invalidation");
            }
        }
        Ok(verdict)
    }

    /// Raw per-constraint evaluation of `feature`, without hierarchy or caching.
    ///
    /// # Errors
    /// Returns [`AvailabilityError::UnknownFeature`] for an unregistered feature.
    pub fn evaluation(&self, feature: &FeatureId) -> Result<ConstraintEvaluation, AvailabilityError> {
        self.evaluator.evaluate(feature)
    }

    /// Clears every cached result.
    pub fn invalidate(&self) {
        self.cache.lock().invalidate();
        debug!("Availability cache invalidated");
    }

    #[must_use]
    pub fn cached_len(&self) -> usize {
        self.cache.lock().entries.len()
    }

    #[must_use]
    pub fn handler_count(&self) -> usize {
        self.subscriptions.len()
    }

    fn declared(&self, feature: &FeatureId) -> Result<Arc<DeclaredConstraints>, AvailabilityError> {
        self.evaluator.declared(feature).ok_or_else(|| AvailabilityError::UnknownFeature {
            message: feature.to_string().into(),
            context: Some("is_available".into()),
        })
    }

    /// A result is cacheable only if neither the feature nor any ancestor depends on a
    /// runtime toggle.
    fn is_cacheable(&self, feature: &FeatureId, declared: &DeclaredConstraints) -> bool {
        declared.is_cacheable()
            && feature
                .ancestors()
                .filter_map(|ancestor| self.evaluator.declared(&ancestor))
                .all(|ancestor| ancestor.is_cacheable())
    }

    fn compute(
        &self,
        feature: &FeatureId,
        declared: &DeclaredConstraints,
    ) -> Result<Option<bool>, AvailabilityError> {
        if !declared.is_empty() {
            let evaluation = self.evaluator.evaluate_declared(feature, declared);
            let own = kleene_all(evaluation.iter().filter_map(fulfilment));
            if own != Some(true) {
                debug!(feature = %feature, verdict = ?own, "Feature constraints not met");
                return Ok(own);
            }
        }

        match self.nearest_conditional_ancestor(feature) {
            Some(ancestor) => {
                let verdict = self.is_available(&ancestor)?;
                trace!(feature = %feature, ancestor = %ancestor, ?verdict, "Ancestor consulted");
                Ok(verdict)
            },
            None => Ok(Some(true)),
        }
    }

    fn nearest_conditional_ancestor(&self, feature: &FeatureId) -> Option<FeatureId> {
        feature.ancestors().find(|ancestor| {
            self.evaluator.declared(ancestor).is_some_and(|declared| !declared.is_empty())
        })
    }
}

/// Maps one result onto the tri-state conjunction; `None` drops inactive constraints.
fn fulfilment(result: &ConstraintResult) -> Option<Option<bool>> {
    match (result.status, &result.constraint) {
        (ConstraintStatus::NotActive, _) => None,
        (ConstraintStatus::NotDetermined, Constraint::UserToggled { default }) => {
            Some(Some(*default))
        },
        (ConstraintStatus::NotDetermined, _) => Some(None),
        (ConstraintStatus::NotSatisfied, _) => Some(Some(false)),
        (ConstraintStatus::Satisfied, _) => Some(Some(true)),
    }
}

fn invalidate_on<T: Signal>(
    bus: &SignalBus,
    cache: &Arc<Mutex<AvailabilityCache>>,
) -> Result<Subscription, AvailabilityError> {
    let cache = Arc::clone(cache);
    let subscription = bus.connect(move |_: &T| {
        cache.lock().invalidate();
        debug!(signal = std::any::type_name::<T>(), "Availability cache invalidated");
    })?;
    Ok(subscription)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluators::{PlatformEvaluator, PurchaseEvaluator, UserToggleEvaluator};
    use crate::sources::{MemoryPurchaseTracker, MemoryToggleStore, PurchaseTracker};
    use gatekit_domain::{Os, PlatformInfo, ProductId, PurchaseRequirement, Version};

    fn id(path: &str) -> FeatureId {
        FeatureId::parse(path).unwrap()
    }

    /// Emits a purchase change from inside the evaluation, as a concurrent update would.
    #[derive(Debug)]
    struct ChangingTracker {
        bus: SignalBus,
    }

    impl PurchaseTracker for ChangingTracker {
        fn is_purchased(&self, product: &ProductId) -> Option<bool> {
            self.bus.emit(PurchaseStatusChanged { product: Some(product.clone()) });
            Some(true)
        }
    }

    #[test]
    fn invalidation_during_evaluation_discards_the_result() {
        let bus = SignalBus::new();
        let evaluator = ConstraintsEvaluator::new()
            .with_evaluator(Arc::new(PurchaseEvaluator::new(Arc::new(ChangingTracker {
                bus: bus.clone(),
            }))));
        let feature = id("store");
        evaluator
            .register(
                &feature,
                DeclaredConstraints::build(|b| {
                    b.purchase(PurchaseRequirement::product("PROD-A"));
                })
                .unwrap(),
            )
            .unwrap();

        let checker =
            AvailabilityChecker::new(Arc::new(evaluator), &bus, &AvailabilityConfig::default())
                .unwrap();
        assert_eq!(checker.is_available(&feature).unwrap(), Some(true));
        assert_eq!(checker.cached_len(), 0);
    }

    #[test]
    fn inactive_platform_constraints_are_ignored() {
        let bus = SignalBus::new();
        let evaluator = ConstraintsEvaluator::new().with_evaluator(Arc::new(
            PlatformEvaluator::new(PlatformInfo { os: Os::Linux, version: Version::new(6, 1, 0) }),
        ));
        let feature = id("widgets");
        evaluator
            .register(
                &feature,
                DeclaredConstraints::build(|b| {
                    b.platform(Os::Ios, gatekit_domain::VersionRequirement::Unsupported);
                })
                .unwrap(),
            )
            .unwrap();

        let checker =
            AvailabilityChecker::new(Arc::new(evaluator), &bus, &AvailabilityConfig::default())
                .unwrap();
        assert_eq!(checker.is_available(&feature).unwrap(), Some(true));
    }

    #[test]
    fn user_toggle_default_and_invalidation() {
        let bus = SignalBus::new();
        let store = MemoryToggleStore::new(bus.clone());
        let tracker = MemoryPurchaseTracker::new(bus.clone());
        let evaluator = ConstraintsEvaluator::new()
            .with_evaluator(Arc::new(UserToggleEvaluator::new(Arc::new(store.clone()))))
            .with_evaluator(Arc::new(PurchaseEvaluator::new(Arc::new(tracker))));
        let feature = id("voices");
        evaluator
            .register(
                &feature,
                DeclaredConstraints::build(|b| {
                    b.user_toggled(false);
                })
                .unwrap(),
            )
            .unwrap();

        let checker =
            AvailabilityChecker::new(Arc::new(evaluator), &bus, &AvailabilityConfig::default())
                .unwrap();
        assert_eq!(checker.handler_count(), 3);
        assert_eq!(checker.is_available(&feature).unwrap(), Some(false));
        assert_eq!(checker.cached_len(), 1);

        store.set(&feature, true);
        assert_eq!(checker.cached_len(), 0);
        assert_eq!(checker.is_available(&feature).unwrap(), Some(true));
    }

    #[test]
    fn unknown_feature_is_an_error() {
        let checker = AvailabilityChecker::new(
            Arc::new(ConstraintsEvaluator::new()),
            &SignalBus::new(),
            &AvailabilityConfig::default(),
        )
        .unwrap();
        assert!(matches!(
            checker.is_available(&id("ghost")),
            Err(AvailabilityError::UnknownFeature { .. })
        ));
    }
}
