//! # Signals
//!
//! Typed change notifications shared by the gatekit crates.
//!
//! A [`SignalBus`] keys every signal by its Rust type. Synchronous handlers run on the
//! emitting thread (cache invalidation relies on this), while async listeners receive an
//! `Arc` of each signal over a `tokio` broadcast channel.
//!
//! # Example
//!
//! ```rust
//! use gatekit_signals::{SignalBus, SignalError, SignalReceiverExt};
//!
//! #[derive(Debug, PartialEq)]
//! struct ToggleChanged { feature: &'static str }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), SignalError> {
//!     let bus = SignalBus::new();
//!     let mut rx = bus.subscribe::<ToggleChanged>()?;
//!     bus.emit(ToggleChanged { feature: "media.voices" });
//!
//!     let signal = rx.next_signal().await;
//!     assert_eq!(signal.map(|s| s.feature), Some("media.voices"));
//!     Ok(())
//! }
//! ```

mod bus;
mod error;
mod receiver;

pub use bus::{Signal, SignalBus, Subscription};
pub use error::{SignalError, SignalErrorExt};
pub use receiver::SignalReceiverExt;
