//! # Feature Availability
//!
//! Decides whether a conditionally available feature may be used right now.
//!
//! ## Architecture
//!
//! 1.  **Declaration ([`declaration`]):** each feature registers an immutable
//!     [`DeclaredConstraints`] set (platforms, preconditions, permissions).
//! 2.  **Evaluation ([`evaluators`], [`evaluator`]):** one [`ConstraintEvaluator`] per
//!     constraint kind answers `Some(true)`, `Some(false)` or `None` (undetermined). The
//!     [`ConstraintsEvaluator`] routes every declared constraint to its evaluator.
//! 3.  **Availability ([`checker`]):** [`AvailabilityChecker`] reduces an evaluation to a
//!     verdict, combines it with the nearest conditional ancestor and caches decided results
//!     until a purchase, user-toggle or permission change is signalled.
//!
//! Backends ([`sources`], [`permissions`]) are traits; the in-memory implementations emit the
//! change signals the checker listens to.
//!
//! ## Example
//!
//! ```rust
//! use gatekit_availability::{
//!     AvailabilityChecker, ConstraintsEvaluator, DeclaredConstraints, MemoryPurchaseTracker,
//!     PurchaseEvaluator,
//! };
//! use gatekit_domain::{config::AvailabilityConfig, FeatureId, PurchaseRequirement};
//! use gatekit_signals::SignalBus;
//! use std::sync::Arc;
//!
//! let bus = SignalBus::new();
//! let tracker = MemoryPurchaseTracker::new(bus.clone());
//! let evaluator = ConstraintsEvaluator::new()
//!     .with_evaluator(Arc::new(PurchaseEvaluator::new(Arc::new(tracker.clone()))));
//!
//! let pro = FeatureId::parse("pro").unwrap();
//! let declared = DeclaredConstraints::build(|b| {
//!     b.purchase(PurchaseRequirement::product("PROD-A"));
//! })
//! .unwrap();
//! evaluator.register(&pro, declared).unwrap();
//!
//! let checker =
//!     AvailabilityChecker::new(Arc::new(evaluator), &bus, &AvailabilityConfig::default()).unwrap();
//! assert_eq!(checker.is_available(&pro).unwrap(), None);
//!
//! tracker.set_purchased("PROD-A", true);
//! assert_eq!(checker.is_available(&pro).unwrap(), Some(true));
//! ```

pub mod checker;
pub mod declaration;
mod error;
pub mod evaluator;
pub mod evaluators;
pub mod permissions;
pub mod sources;

pub use crate::checker::AvailabilityChecker;
pub use crate::declaration::{DeclarationBuilder, DeclaredConstraints};
pub use crate::error::{AvailabilityError, AvailabilityErrorExt};
pub use crate::evaluator::{CategoryResults, ConstraintEvaluation, ConstraintsEvaluator};
pub use crate::evaluators::{
    ConstraintEvaluator, PermissionEvaluator, PlatformEvaluator, PurchaseEvaluator,
    RuntimeToggleEvaluator, UserToggleEvaluator,
};
pub use crate::permissions::{
    AdapterPermissionChecker, AuthorizationCallback, FixedPermissionAdapter, PermissionAdapter,
    PermissionAdapterRegistry, PermissionChecker,
};
pub use crate::sources::{
    MemoryPurchaseTracker, MemoryToggleStore, PermissionStatusChanged, PurchaseStatusChanged,
    PurchaseTracker, RuntimeToggles, UserToggleChanged, UserToggleStore,
};
