//! # Completion Contracts
//!
//! A gated operation reports its result exactly once, either before it returns or later from
//! any thread. [`CompletionRequirement`] enforces that contract at runtime:
//!
//! ```text
//! Pending ──completed_sync──▶ CompletedSync
//!    │
//!    └──will_complete_async──▶ Deferred ──DeferredStatus::completed──▶ CompletedAsync
//! ```
//!
//! Every resolution yields a [`Status`], an opaque proof the caller can
//! [`verify`](CompletionRequirement::verify). [`ProxyCompletion`] sits between an operation and
//! the caller's requirement to rewrite the value (the dispatcher uses it to notify observers).

mod proxy;
mod requirement;
mod status;

pub use crate::proxy::ProxyCompletion;
pub use crate::requirement::{CompletionCallback, CompletionRequirement, DeferredStatus};
pub use crate::status::Status;
