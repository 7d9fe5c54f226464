use std::borrow::Cow;

/// Errors that can occur during signal bus operations.
#[gatekit_derive::gate_error]
pub enum SignalError {
    /// An internal dynamic cast failed.
    /// This indicates an invariant violation in the type registry.
    #[error("Type mismatch{}: {message}", format_context(.context))]
    TypeMismatch { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// Capacity must be greater than zero for broadcast channels.
    #[error("Invalid capacity{}: {message}", format_context(.context))]
    InvalidCapacity { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}
