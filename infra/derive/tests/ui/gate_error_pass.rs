use gatekit_derive::gate_error;
use std::borrow::Cow;

#[gate_error]
pub enum LookupError {
    #[error("IO error{}: {source}", format_context(.context))]
    Io {
        #[source]
        source: std::io::Error,
        context: Option<Cow<'static, str>>,
    },

    #[error("Internal error{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

fn main() {
    let err = LookupError::from("boom");
    assert!(err.context_note().is_none());
}
