//! The declared-set registry and the evaluation that routes each constraint to its evaluator.

use crate::declaration::DeclaredConstraints;
use crate::error::AvailabilityError;
use crate::evaluators::ConstraintEvaluator;
use fxhash::FxHashMap;
use gatekit_domain::{
    Constraint, ConstraintCategory, ConstraintKinds, ConstraintResult, ConstraintStatus, FeatureId,
};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, info};

/// Results of one category, with status views derived on demand.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryResults {
    results: Vec<ConstraintResult>,
}

impl CategoryResults {
    pub fn all(&self) -> impl Iterator<Item = &ConstraintResult> {
        self.results.iter()
    }

    pub fn satisfied(&self) -> impl Iterator<Item = &ConstraintResult> {
        self.with_status(ConstraintStatus::Satisfied)
    }

    pub fn not_satisfied(&self) -> impl Iterator<Item = &ConstraintResult> {
        self.with_status(ConstraintStatus::NotSatisfied)
    }

    pub fn not_determined(&self) -> impl Iterator<Item = &ConstraintResult> {
        self.with_status(ConstraintStatus::NotDetermined)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    fn with_status(&self, status: ConstraintStatus) -> impl Iterator<Item = &ConstraintResult> {
        self.results.iter().filter(move |r| r.status == status)
    }
}

/// Evaluation of every constraint a feature declares.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConstraintEvaluation {
    pub platforms: CategoryResults,
    pub preconditions: CategoryResults,
    pub permissions: CategoryResults,
}

impl ConstraintEvaluation {
    /// Every result: platforms, then preconditions, then permissions.
    pub fn iter(&self) -> impl Iterator<Item = &ConstraintResult> {
        self.platforms.all().chain(self.preconditions.all()).chain(self.permissions.all())
    }

    fn push(&mut self, result: ConstraintResult) {
        let bucket = match result.constraint.category() {
            ConstraintCategory::Platform => &mut self.platforms,
            ConstraintCategory::Precondition => &mut self.preconditions,
            ConstraintCategory::Permission => &mut self.permissions,
        };
        bucket.results.push(result);
    }
}

/// Holds every registered feature's declaration and one evaluator per constraint kind.
#[derive(Debug, Default)]
pub struct ConstraintsEvaluator {
    declared: RwLock<FxHashMap<FeatureId, Arc<DeclaredConstraints>>>,
    evaluators: Vec<Arc<dyn ConstraintEvaluator>>,
}

impl ConstraintsEvaluator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs an evaluator. The first one installed for a kind wins.
    #[must_use]
    pub fn with_evaluator(mut self, evaluator: Arc<dyn ConstraintEvaluator>) -> Self {
        self.evaluators.push(evaluator);
        self
    }

    /// Kinds for which an evaluator is installed.
    #[must_use]
    pub fn supported_kinds(&self) -> ConstraintKinds {
        self.evaluators.iter().fold(ConstraintKinds::empty(), |acc, e| acc | e.kinds())
    }

    /// Registers `feature` with its declaration (empty for unconditional features).
    ///
    /// # Errors
    /// * [`AvailabilityError::AlreadyRegistered`] if `feature` was registered before.
    /// * [`AvailabilityError::ParentNotRegistered`] if its parent is unknown.
    /// * [`AvailabilityError::MissingEvaluator`] if a declared kind has no evaluator.
    pub fn register(
        &self,
        feature: &FeatureId,
        declared: DeclaredConstraints,
    ) -> Result<(), AvailabilityError> {
        let missing = declared.kinds().difference(self.supported_kinds());
        if !missing.is_empty() {
            return Err(AvailabilityError::MissingEvaluator {
                message: format!("{missing:?}").into(),
                context: Some(feature.to_string().into()),
            });
        }

        let mut registry = self.declared.write();
        if registry.contains_key(feature) {
            return Err(AvailabilityError::AlreadyRegistered {
                message: feature.to_string().into(),
                context: None,
            });
        }
        if let Some(parent) = feature.parent().filter(|p| !registry.contains_key(p)) {
            return Err(AvailabilityError::ParentNotRegistered {
                message: parent.to_string().into(),
                context: Some(feature.to_string().into()),
            });
        }

        info!(feature = %feature, constraints = declared.len(), "Feature registered");
        registry.insert(feature.clone(), Arc::new(declared));
        Ok(())
    }

    #[must_use]
    pub fn declared(&self, feature: &FeatureId) -> Option<Arc<DeclaredConstraints>> {
        self.declared.read().get(feature).cloned()
    }

    #[must_use]
    pub fn is_registered(&self, feature: &FeatureId) -> bool {
        self.declared.read().contains_key(feature)
    }

    /// Forgets every registered feature.
    pub fn reset(&self) {
        self.declared.write().clear();
    }

    /// Evaluates every constraint `feature` declares.
    ///
    /// # Errors
    /// Returns [`AvailabilityError::UnknownFeature`] for an unregistered feature.
    ///
    /// # Panics
    /// Panics if a declared constraint has no evaluator. Registration rejects such features,
    /// so reaching this is a configuration bug.
    pub fn evaluate(&self, feature: &FeatureId) -> Result<ConstraintEvaluation, AvailabilityError> {
        let declared = self.declared(feature).ok_or_else(|| AvailabilityError::UnknownFeature {
            message: feature.to_string().into(),
            context: Some("evaluate".into()),
        })?;
        Ok(self.evaluate_declared(feature, &declared))
    }

    pub(crate) fn evaluate_declared(
        &self,
        feature: &FeatureId,
        declared: &DeclaredConstraints,
    ) -> ConstraintEvaluation {
        let mut evaluation = ConstraintEvaluation::default();
        for constraint in declared.constraints() {
            let status = self.status_of(&constraint, feature);
            evaluation.push(ConstraintResult { constraint, status });
        }
        let satisfied =
            evaluation.iter().filter(|r| r.status == ConstraintStatus::Satisfied).count();
        debug!(feature = %feature, satisfied, total = declared.len(), "Constraints evaluated");
        evaluation
    }

    fn status_of(&self, constraint: &Constraint, feature: &FeatureId) -> ConstraintStatus {
        let kind = constraint.kind();
        let Some(evaluator) = self.evaluators.iter().find(|e| e.kinds().contains(kind)) else {
            panic!("no evaluator installed for {kind:?} (feature {feature})");
        };
        if !evaluator.is_active(constraint) {
            return ConstraintStatus::NotActive;
        }
        evaluator.is_fulfilled(constraint, feature).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluators::{PlatformEvaluator, RuntimeToggleEvaluator};
    use crate::sources::RuntimeToggles;
    use gatekit_domain::{Os, PlatformInfo, Version, VersionRequirement};

    fn id(path: &str) -> FeatureId {
        FeatureId::parse(path).unwrap()
    }

    fn evaluator(toggles: &RuntimeToggles) -> ConstraintsEvaluator {
        ConstraintsEvaluator::new()
            .with_evaluator(Arc::new(PlatformEvaluator::new(PlatformInfo {
                os: Os::Linux,
                version: Version::new(6, 8, 0),
            })))
            .with_evaluator(Arc::new(RuntimeToggleEvaluator::new(toggles.clone())))
    }

    #[test]
    fn parent_must_be_registered_first() {
        let evaluator = evaluator(&RuntimeToggles::new());
        let err = evaluator.register(&id("media.player"), DeclaredConstraints::none()).unwrap_err();
        assert!(matches!(err, AvailabilityError::ParentNotRegistered { .. }));

        evaluator.register(&id("media"), DeclaredConstraints::none()).unwrap();
        evaluator.register(&id("media.player"), DeclaredConstraints::none()).unwrap();
        let err = evaluator.register(&id("media"), DeclaredConstraints::none()).unwrap_err();
        assert!(matches!(err, AvailabilityError::AlreadyRegistered { .. }));
    }

    #[test]
    fn missing_evaluator_is_rejected_at_registration() {
        let evaluator = evaluator(&RuntimeToggles::new());
        let declared = DeclaredConstraints::build(|b| {
            b.user_toggled(true);
        })
        .unwrap();
        let err = evaluator.register(&id("settings"), declared).unwrap_err();
        assert!(matches!(err, AvailabilityError::MissingEvaluator { .. }));
    }

    #[test]
    fn results_are_grouped_by_category() {
        let toggles = RuntimeToggles::new();
        let evaluator = evaluator(&toggles);
        let feature = id("labs");
        let declared = DeclaredConstraints::build(|b| {
            b.platform(Os::Linux, VersionRequirement::AtLeast(Version::new(5, 0, 0)))
                .platform(Os::Windows, VersionRequirement::Any)
                .runtime_enabled();
        })
        .unwrap();
        evaluator.register(&feature, declared).unwrap();

        let evaluation = evaluator.evaluate(&feature).unwrap();
        assert_eq!(evaluation.platforms.all().count(), 2);
        assert_eq!(evaluation.platforms.satisfied().count(), 1);
        assert!(evaluation.platforms.all().any(|r| r.status == ConstraintStatus::NotActive));
        assert_eq!(evaluation.preconditions.not_satisfied().count(), 1);
        assert!(evaluation.permissions.is_empty());

        toggles.set(&feature, true);
        let evaluation = evaluator.evaluate(&feature).unwrap();
        assert_eq!(evaluation.preconditions.satisfied().count(), 1);
    }

    #[test]
    fn unknown_feature_is_an_error() {
        let evaluator = evaluator(&RuntimeToggles::new());
        assert!(matches!(
            evaluator.evaluate(&id("ghost")),
            Err(AvailabilityError::UnknownFeature { .. })
        ));
    }
}
