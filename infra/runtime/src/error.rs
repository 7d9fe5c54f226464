use std::borrow::Cow;

#[gatekit_derive::gate_error]
pub enum RuntimeError {
    /// Thread or runtime creation failed at the OS level.
    #[error("Runtime I/O error{}: {source}", format_context(.context))]
    Io { source: std::io::Error, context: Option<Cow<'static, str>> },

    /// The context no longer accepts work.
    #[error("Execution context closed{}: {message}", format_context(.context))]
    Closed { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// The context accepted a job but dropped it without running it.
    #[error("Job abandoned{}: {message}", format_context(.context))]
    Abandoned { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}
