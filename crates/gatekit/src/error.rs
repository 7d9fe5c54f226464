use gatekit_availability::AvailabilityError;
use gatekit_dispatch::DispatchError;
use gatekit_kernel::config::ConfigError;
use gatekit_logger::LoggerError;
use std::borrow::Cow;

#[gatekit_derive::gate_error]
pub enum GatekitError {
    #[error("Configuration error{}: {source}", format_context(.context))]
    Config { source: ConfigError, context: Option<Cow<'static, str>> },

    #[error("Logger error{}: {source}", format_context(.context))]
    Logger { source: LoggerError, context: Option<Cow<'static, str>> },

    #[error("Availability error{}: {source}", format_context(.context))]
    Availability { source: AvailabilityError, context: Option<Cow<'static, str>> },

    #[error("Dispatch error{}: {source}", format_context(.context))]
    Dispatch { source: DispatchError, context: Option<Cow<'static, str>> },

    /// [`Gatekit::install`](crate::Gatekit::install) was called while an instance is installed.
    #[error("Gatekit is already installed{}: {message}", format_context(.context))]
    AlreadyInstalled { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Internal error{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}
