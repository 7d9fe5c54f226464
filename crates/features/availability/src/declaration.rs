//! Immutable per-feature constraint declarations.

use crate::error::AvailabilityError;
use gatekit_domain::{
    Constraint, ConstraintCategory, ConstraintKinds, Os, PermissionKind, PurchaseRequirement,
    VersionRequirement,
};
use std::collections::BTreeMap;

/// The constraints a conditional feature declares, grouped the way they are evaluated.
///
/// Created once at registration and never mutated afterwards. An empty set marks an
/// unconditional feature.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeclaredConstraints {
    platforms: BTreeMap<Os, VersionRequirement>,
    preconditions: Vec<Constraint>,
    permissions: Vec<PermissionKind>,
}

impl DeclaredConstraints {
    /// Runs `configure` against a fresh builder and returns the finished set.
    ///
    /// # Errors
    /// Returns the first declaration error recorded by the builder
    /// ([`AvailabilityError::ConflictingPlatform`] or
    /// [`AvailabilityError::InvalidDeclaration`]).
    ///
    /// # Examples
    /// ```rust
    /// use gatekit_availability::DeclaredConstraints;
    /// use gatekit_domain::{Os, PurchaseRequirement, VersionRequirement};
    ///
    /// let declared = DeclaredConstraints::build(|b| {
    ///     b.platform(Os::Linux, VersionRequirement::Any)
    ///         .purchase(PurchaseRequirement::product("PROD-A"))
    ///         .user_toggled(true);
    /// })
    /// .unwrap();
    /// assert_eq!(declared.len(), 3);
    /// ```
    pub fn build<F>(configure: F) -> Result<Self, AvailabilityError>
    where
        F: FnOnce(&mut DeclarationBuilder),
    {
        let mut builder = DeclarationBuilder::default();
        configure(&mut builder);
        builder.finish()
    }

    /// The declaration of an unconditional feature.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.platforms.is_empty() && self.preconditions.is_empty() && self.permissions.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.platforms.len() + self.preconditions.len() + self.permissions.len()
    }

    pub fn platforms(&self) -> impl Iterator<Item = Constraint> + '_ {
        self.platforms.iter().map(|(&os, &version)| Constraint::Platform { os, version })
    }

    pub fn preconditions(&self) -> impl Iterator<Item = &Constraint> {
        self.preconditions.iter()
    }

    pub fn permissions(&self) -> impl Iterator<Item = Constraint> + '_ {
        self.permissions.iter().map(|&kind| Constraint::Permission(kind))
    }

    /// All declared constraints: platforms, then preconditions, then permissions.
    pub fn constraints(&self) -> impl Iterator<Item = Constraint> + '_ {
        self.platforms().chain(self.preconditions.iter().cloned()).chain(self.permissions())
    }

    /// Union of the declared constraint kinds.
    #[must_use]
    pub fn kinds(&self) -> ConstraintKinds {
        let mut kinds = ConstraintKinds::empty();
        if !self.platforms.is_empty() {
            kinds |= ConstraintKinds::PLATFORM;
        }
        if !self.permissions.is_empty() {
            kinds |= ConstraintKinds::PERMISSION;
        }
        for constraint in &self.preconditions {
            kinds |= constraint.kind();
        }
        kinds
    }

    /// Whether results for this set may be cached.
    #[must_use]
    pub fn is_cacheable(&self) -> bool {
        !self.kinds().intersects(ConstraintKinds::UNCACHEABLE)
    }
}

/// Accumulates a [`DeclaredConstraints`]. Obtain one through [`DeclaredConstraints::build`].
///
/// Preconditions and permissions behave like sets: repeating one is a no-op.
#[derive(Debug, Default)]
pub struct DeclarationBuilder {
    declared: DeclaredConstraints,
    error: Option<AvailabilityError>,
}

impl DeclarationBuilder {
    /// Declares the version requirement for `os`.
    ///
    /// Repeating the same requirement is a no-op; a different one records
    /// [`AvailabilityError::ConflictingPlatform`].
    pub fn platform(&mut self, os: Os, version: VersionRequirement) -> &mut Self {
        match self.declared.platforms.get(&os) {
            Some(existing) if *existing == version => {},
            Some(existing) => {
                let message = format!("{os}: {existing:?} already declared, got {version:?}");
                self.fail(AvailabilityError::ConflictingPlatform {
                    message: message.into(),
                    context: None,
                });
            },
            None => {
                self.declared.platforms.insert(os, version);
            },
        }
        self
    }

    /// Declares a precondition (`UserToggled`, `RuntimeEnabled` or `Purchase`).
    pub fn precondition(&mut self, constraint: Constraint) -> &mut Self {
        if constraint.category() != ConstraintCategory::Precondition {
            self.fail(AvailabilityError::InvalidDeclaration {
                message: format!("{constraint:?} is not a precondition").into(),
                context: Some("precondition".into()),
            });
        } else if !self.declared.preconditions.contains(&constraint) {
            self.declared.preconditions.push(constraint);
        }
        self
    }

    pub fn purchase(&mut self, requirement: PurchaseRequirement) -> &mut Self {
        self.precondition(Constraint::Purchase(requirement))
    }

    /// Availability follows a user preference, `default` until the user sets one.
    pub fn user_toggled(&mut self, default: bool) -> &mut Self {
        self.precondition(Constraint::UserToggled { default })
    }

    /// Availability follows a flag the application flips at runtime.
    pub fn runtime_enabled(&mut self) -> &mut Self {
        self.precondition(Constraint::RuntimeEnabled)
    }

    pub fn permission(&mut self, kind: PermissionKind) -> &mut Self {
        if !self.declared.permissions.contains(&kind) {
            self.declared.permissions.push(kind);
        }
        self
    }

    fn fail(&mut self, error: AvailabilityError) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }

    fn finish(self) -> Result<DeclaredConstraints, AvailabilityError> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.declared),
        }
    }
}
