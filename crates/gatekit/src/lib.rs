//! # Gatekit
//!
//! Facade over the gatekit crates. Keep this crate thin: it composes the feature crates into a
//! [`Gatekit`] instance and re-exports what hosts need, nothing more.
//!
//! * [`availability`]: constraint declarations, evaluators and the cached availability checker.
//! * [`dispatch`]: the feature catalog, gated sessions, the dispatcher and action stacks.
//! * [`completion`]: the exactly-once completion contract actions report through.
//!
//! ## Usage
//!
//! ```rust
//! use gatekit::availability::DeclaredConstraints;
//! use gatekit::dispatch::FeatureDescriptor;
//! use gatekit::domain::{FeatureId, PurchaseRequirement};
//! use gatekit::Gatekit;
//!
//! let gate = Gatekit::builder().build().unwrap();
//! let pro = FeatureId::parse("pro").unwrap();
//! let declared = DeclaredConstraints::build(|b| {
//!     b.purchase(PurchaseRequirement::product("PROD-A"));
//! })
//! .unwrap();
//! gate.catalog().register(FeatureDescriptor::new(pro.clone()), declared).unwrap();
//!
//! // The default purchase tracker knows nothing yet.
//! assert_eq!(gate.is_available(&pro).unwrap(), None);
//! ```

mod builder;
mod error;
pub mod gate;

pub use crate::builder::GatekitBuilder;
pub use crate::error::{GatekitError, GatekitErrorExt};
pub use crate::gate::Gatekit;

pub use gatekit_availability as availability;
pub use gatekit_completion as completion;
pub use gatekit_dispatch as dispatch;
pub use gatekit_domain as domain;
pub use gatekit_kernel as kernel;
pub use gatekit_logger as logger;
pub use gatekit_signals as signals;
