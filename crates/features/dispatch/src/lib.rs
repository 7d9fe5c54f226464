//! # Action Dispatch
//!
//! Gated execution of actions bound to features.
//!
//! ## Flow
//!
//! 1.  **Catalog ([`catalog`]):** features are registered with their constraints, and action
//!     types are declared on them.
//! 2.  **Gate ([`session`]):** [`ActionSession::perform`] checks the declaration, asks the
//!     [`AvailabilityChecker`](gatekit_availability::AvailabilityChecker) for a verdict and
//!     records the action on the feature's [`ActionStack`].
//! 3.  **Dispatch ([`dispatcher`]):** [`ActionDispatcher`] runs the body on the context the
//!     action declares and wraps the caller's completion so observers hear about the outcome.
//! 4.  **Stacks ([`stack`]):** [`StackTracker`] keeps the per-session trail, nesting stacks
//!     opened from within another feature and terminating them on stack-closing outcomes.

pub mod action;
pub mod catalog;
pub mod dispatcher;
mod error;
pub mod observer;
pub mod session;
pub mod stack;

pub use crate::action::{
    Action, ActionDescriptor, ActionOutcome, ActionRequest, ActionSource, ExecutionTarget,
};
pub use crate::catalog::{FeatureCatalog, FeatureDescriptor};
pub use crate::dispatcher::ActionDispatcher;
pub use crate::error::{DispatchError, DispatchErrorExt};
pub use crate::observer::{ActionEvent, DispatchObserver};
pub use crate::session::{ActionSession, RouteDecision};
pub use crate::stack::{ActionStack, ActionStackEntry, EntryDetails, StackTracker};
