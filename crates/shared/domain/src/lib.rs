//! # Domain Models
//!
//! Pure data types for feature gating, with minimal dependencies (`serde`, `bitflags`, `strum`).
//! Keep it lean: no I/O, no threads, no evaluation logic, just data and simple helpers.

pub mod config;
pub mod constraint;
pub mod feature;

pub use constraint::{
    Constraint, ConstraintCategory, ConstraintKinds, ConstraintResult, ConstraintStatus,
    LocationUsage, MatchCriteria, Os, PermissionKind, PermissionStatus, PlatformInfo, ProductId,
    PurchaseRequirement, Version, VersionRequirement,
};
pub use feature::{FeatureId, InvalidFeatureId};
