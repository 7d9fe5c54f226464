//! # Runtime
//!
//! Execution contexts for gated actions.
//!
//! An action declares where its body must run; the dispatcher resolves that to one of the
//! contexts here and hands the body off with [`run_blocking`].
//!
//! * [`AnyContext`]: inline on the caller.
//! * [`SerialContext`]: one named thread, jobs run in submission order (the "main" context).
//! * [`RuntimeContext`]: a [Tokio](https://tokio.rs) pool built from [`RuntimeConfig`].
//!
//! ## Example
//!
//! ```rust
//! use gatekit_runtime::{run_blocking, RuntimeError, SerialContext};
//!
//! # fn main() -> Result<(), RuntimeError> {
//! let main = SerialContext::spawn("app-main")?;
//! let answer = run_blocking(&main, || 6 * 7)?;
//! assert_eq!(answer, 42);
//! # Ok(())
//! # }
//! ```

mod config;
mod context;
mod error;
mod handoff;

pub use config::RuntimeConfig;
pub use context::{AnyContext, ExecutionContext, Job, RuntimeContext, SerialContext};
pub use error::{RuntimeError, RuntimeErrorExt};
pub use handoff::run_blocking;
