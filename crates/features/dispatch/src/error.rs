use gatekit_availability::AvailabilityError;
use gatekit_runtime::RuntimeError;
use std::borrow::Cow;

/// Failures of catalog registration and gated dispatch.
///
/// Everything except [`DispatchError::Unavailable`] is a usage or wiring error.
#[gatekit_derive::gate_error]
pub enum DispatchError {
    #[error("Feature is not in the catalog{}: {message}", format_context(.context))]
    UnknownFeature { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// The action was never declared on the feature it is performed for.
    #[error("Action is not declared{}: {message}", format_context(.context))]
    UnknownAction { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Action is already declared{}: {message}", format_context(.context))]
    ActionAlreadyDeclared { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// The gate refused: the verdict was `Some(false)` or undetermined (`None`).
    #[error("Feature is unavailable{}: {message} (verdict: {verdict:?})", format_context(.context))]
    Unavailable {
        verdict: Option<bool>,
        message: Cow<'static, str>,
        context: Option<Cow<'static, str>>,
    },

    #[error("Availability error{}: {source}", format_context(.context))]
    Availability { source: AvailabilityError, context: Option<Cow<'static, str>> },

    /// The execution context could not run the action body.
    #[error("Execution error{}: {source}", format_context(.context))]
    Runtime { source: RuntimeError, context: Option<Cow<'static, str>> },

    #[error("Internal dispatch error{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}
