//! The process registry of features and the actions declared on them.

use crate::action::{Action, ActionDescriptor};
use crate::error::DispatchError;
use fxhash::FxHashMap;
use gatekit_availability::{ConstraintsEvaluator, DeclaredConstraints};
use gatekit_domain::FeatureId;
use parking_lot::RwLock;
use std::any::TypeId;
use std::borrow::Cow;
use std::sync::Arc;
use tracing::{debug, info};

/// Descriptive metadata of a feature. The name defaults to the last path segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureDescriptor {
    id: FeatureId,
    name: Cow<'static, str>,
    description: Option<Cow<'static, str>>,
}

impl FeatureDescriptor {
    #[must_use]
    pub fn new(id: FeatureId) -> Self {
        let name = Cow::Owned(id.name().to_owned());
        Self { id, name, description: None }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.name = name.into();
        self
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<Cow<'static, str>>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub const fn id(&self) -> &FeatureId {
        &self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }
}

#[derive(Debug)]
struct FeatureEntry {
    descriptor: FeatureDescriptor,
    conditional: bool,
    actions: FxHashMap<TypeId, ActionDescriptor>,
}

/// Registered features and their declared actions.
///
/// Registering a feature also registers its constraints with the shared
/// [`ConstraintsEvaluator`], so the two registries never disagree.
#[gatekit_derive::gate_handle]
pub struct FeatureCatalog {
    evaluator: Arc<ConstraintsEvaluator>,
    features: RwLock<FxHashMap<FeatureId, FeatureEntry>>,
}

impl FeatureCatalog {
    #[must_use]
    pub fn new(evaluator: Arc<ConstraintsEvaluator>) -> Self {
        Self::from_inner(FeatureCatalogInner { evaluator, features: RwLock::default() })
    }

    /// Registers a feature. Pass [`DeclaredConstraints::none`] for an unconditional one.
    ///
    /// # Errors
    /// Returns [`DispatchError::Availability`] when the evaluator rejects the registration
    /// (duplicate feature, unregistered parent, missing evaluator).
    pub fn register(
        &self,
        descriptor: FeatureDescriptor,
        constraints: DeclaredConstraints,
    ) -> Result<(), DispatchError> {
        let conditional = !constraints.is_empty();
        let mut features = self.features.write();
        self.evaluator.register(descriptor.id(), constraints)?;
        info!(feature = %descriptor.id(), conditional, "Feature added to catalog");
        features.insert(
            descriptor.id().clone(),
            FeatureEntry { descriptor, conditional, actions: FxHashMap::default() },
        );
        Ok(())
    }

    /// Declares action type `A` on `feature` and returns its descriptor.
    ///
    /// # Errors
    /// * [`DispatchError::UnknownFeature`] if `feature` is not registered.
    /// * [`DispatchError::ActionAlreadyDeclared`] if `A` is already declared on it.
    pub fn declare<A: Action>(&self, feature: &FeatureId) -> Result<ActionDescriptor, DispatchError> {
        let mut features = self.features.write();
        let entry = features.get_mut(feature).ok_or_else(|| unknown_feature(feature))?;
        let descriptor = A::descriptor();
        if entry.actions.contains_key(&TypeId::of::<A>()) {
            return Err(DispatchError::ActionAlreadyDeclared {
                message: descriptor.name().to_owned().into(),
                context: Some(feature.to_string().into()),
            });
        }
        debug!(
            feature = %feature,
            action = descriptor.name(),
            target = %descriptor.target(),
            "Action declared"
        );
        entry.actions.insert(TypeId::of::<A>(), descriptor.clone());
        Ok(descriptor)
    }

    /// The descriptor of `A` as declared on `feature`.
    ///
    /// # Errors
    /// [`DispatchError::UnknownFeature`] or [`DispatchError::UnknownAction`].
    pub fn action<A: Action>(&self, feature: &FeatureId) -> Result<ActionDescriptor, DispatchError> {
        let features = self.features.read();
        let entry = features.get(feature).ok_or_else(|| unknown_feature(feature))?;
        entry.actions.get(&TypeId::of::<A>()).cloned().ok_or_else(|| {
            DispatchError::UnknownAction {
                message: A::descriptor().name().to_owned().into(),
                context: Some(feature.to_string().into()),
            }
        })
    }

    #[must_use]
    pub fn feature(&self, feature: &FeatureId) -> Option<FeatureDescriptor> {
        self.features.read().get(feature).map(|entry| entry.descriptor.clone())
    }

    #[must_use]
    pub fn contains(&self, feature: &FeatureId) -> bool {
        self.features.read().contains_key(feature)
    }

    /// `true` when neither `feature` nor any ancestor declares constraints. Actions on such
    /// features are never gated.
    #[must_use]
    pub fn is_always_available(&self, feature: &FeatureId) -> bool {
        let features = self.features.read();
        std::iter::once(feature.clone())
            .chain(feature.ancestors())
            .all(|id| features.get(&id).is_some_and(|entry| !entry.conditional))
    }

    /// All registered features, ordered by id.
    #[must_use]
    pub fn features(&self) -> Vec<FeatureDescriptor> {
        let mut all: Vec<_> =
            self.features.read().values().map(|entry| entry.descriptor.clone()).collect();
        all.sort_by(|a, b| a.id().cmp(b.id()));
        all
    }

    /// Actions declared on `feature`, ordered by name.
    #[must_use]
    pub fn actions(&self, feature: &FeatureId) -> Vec<ActionDescriptor> {
        let mut actions: Vec<_> = self
            .features
            .read()
            .get(feature)
            .map(|entry| entry.actions.values().cloned().collect())
            .unwrap_or_default();
        actions.sort_by(|a, b| a.name().cmp(b.name()));
        actions
    }

    #[must_use]
    pub fn evaluator(&self) -> &Arc<ConstraintsEvaluator> {
        &self.evaluator
    }

    /// Forgets every feature here and in the evaluator.
    pub fn reset(&self) {
        let mut features = self.features.write();
        features.clear();
        self.evaluator.reset();
        debug!("Feature catalog reset");
    }
}

fn unknown_feature(feature: &FeatureId) -> DispatchError {
    DispatchError::UnknownFeature { message: feature.to_string().into(), context: None }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{ActionOutcome, ExecutionTarget};
    use gatekit_availability::RuntimeToggleEvaluator;
    use gatekit_availability::RuntimeToggles;
    use gatekit_completion::{CompletionRequirement, Status};

    #[derive(Debug)]
    struct Open;

    impl Action for Open {
        type Input = ();

        fn descriptor() -> ActionDescriptor {
            ActionDescriptor::of::<Self>().on(ExecutionTarget::Any).with_analytics_id("open")
        }

        fn perform(&self, (): (), completion: &CompletionRequirement<ActionOutcome>) -> Status {
            completion.completed_sync(ActionOutcome::success())
        }
    }

    fn id(path: &str) -> FeatureId {
        FeatureId::parse(path).unwrap()
    }

    fn catalog() -> FeatureCatalog {
        FeatureCatalog::new(Arc::new(
            ConstraintsEvaluator::new()
                .with_evaluator(Arc::new(RuntimeToggleEvaluator::new(RuntimeToggles::new()))),
        ))
    }

    #[test]
    fn actions_must_be_declared_on_registered_features() {
        let catalog = catalog();
        assert!(matches!(
            catalog.declare::<Open>(&id("docs")),
            Err(DispatchError::UnknownFeature { .. })
        ));

        catalog.register(FeatureDescriptor::new(id("docs")), DeclaredConstraints::none()).unwrap();
        assert!(matches!(
            catalog.action::<Open>(&id("docs")),
            Err(DispatchError::UnknownAction { .. })
        ));

        let declared = catalog.declare::<Open>(&id("docs")).unwrap();
        assert_eq!(declared.name(), "Open");
        assert_eq!(declared.analytics_id(), Some("open"));
        assert_eq!(catalog.action::<Open>(&id("docs")).unwrap(), declared);
        assert!(matches!(
            catalog.declare::<Open>(&id("docs")),
            Err(DispatchError::ActionAlreadyDeclared { .. })
        ));
    }

    #[test]
    fn registration_is_shared_with_the_evaluator() {
        let catalog = catalog();
        let err = catalog
            .register(FeatureDescriptor::new(id("docs.search")), DeclaredConstraints::none())
            .unwrap_err();
        assert!(matches!(err, DispatchError::Availability { .. }));

        catalog.register(FeatureDescriptor::new(id("docs")), DeclaredConstraints::none()).unwrap();
        assert!(catalog.evaluator().is_registered(&id("docs")));

        catalog.reset();
        assert!(!catalog.contains(&id("docs")));
        assert!(!catalog.evaluator().is_registered(&id("docs")));
    }

    #[test]
    fn conditional_ancestors_make_children_gated() {
        let catalog = catalog();
        let labs = DeclaredConstraints::build(|b| {
            b.runtime_enabled();
        })
        .unwrap();
        catalog.register(FeatureDescriptor::new(id("labs")), labs).unwrap();
        catalog
            .register(FeatureDescriptor::new(id("labs.preview")), DeclaredConstraints::none())
            .unwrap();
        catalog.register(FeatureDescriptor::new(id("help")), DeclaredConstraints::none()).unwrap();

        assert!(!catalog.is_always_available(&id("labs.preview")));
        assert!(catalog.is_always_available(&id("help")));
        assert_eq!(catalog.feature(&id("labs.preview")).unwrap().name(), "preview");
        assert_eq!(catalog.features().len(), 3);
    }
}
