use std::borrow::Cow;

/// Registry usage errors. Callers treat these as programming bugs.
#[gatekit_derive::gate_error]
pub enum AvailabilityError {
    #[error("Feature is not registered{}: {message}", format_context(.context))]
    UnknownFeature { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Feature is already registered{}: {message}", format_context(.context))]
    AlreadyRegistered { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// A child was registered before its parent.
    #[error("Parent feature is not registered{}: {message}", format_context(.context))]
    ParentNotRegistered { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// Two different version requirements were declared for the same OS.
    #[error("Conflicting platform declaration{}: {message}", format_context(.context))]
    ConflictingPlatform { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// A constraint was declared in the wrong collection (e.g. a permission as a precondition).
    #[error("Invalid declaration{}: {message}", format_context(.context))]
    InvalidDeclaration { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// No evaluator is installed for a declared constraint kind.
    #[error("Missing constraint evaluator{}: {message}", format_context(.context))]
    MissingEvaluator { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// Invalidation handlers could not be connected.
    #[error("Signal error{}: {source}", format_context(.context))]
    Signal { source: gatekit_signals::SignalError, context: Option<Cow<'static, str>> },

    #[error("Internal availability error{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}
