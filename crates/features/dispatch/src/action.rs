//! What an action is, how it is described, and what it reports back.

use gatekit_completion::{CompletionRequirement, Status};
use gatekit_domain::FeatureId;
use std::borrow::Cow;
use std::error::Error;
use std::fmt;
use std::sync::Arc;
use strum_macros::{Display, EnumIter, EnumString, IntoStaticStr};
use typed_builder::TypedBuilder;

/// Where an action body runs.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, EnumString, EnumIter, IntoStaticStr,
)]
#[strum(serialize_all = "snake_case")]
pub enum ExecutionTarget {
    /// Inline on whichever thread performs the action.
    Any,
    /// The serial main context.
    #[default]
    Main,
    /// The background pool.
    Background,
}

/// Static description of an action type.
///
/// [`ActionDescriptor::of`] derives the name from the type; everything else is optional.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionDescriptor {
    name: Cow<'static, str>,
    description: Option<Cow<'static, str>>,
    analytics_id: Option<Cow<'static, str>>,
    target: ExecutionTarget,
}

impl ActionDescriptor {
    #[must_use]
    pub fn named(name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            name: name.into(),
            description: None,
            analytics_id: None,
            target: ExecutionTarget::default(),
        }
    }

    /// A descriptor named after `A`'s type, without its module path.
    #[must_use]
    pub fn of<A: ?Sized>() -> Self {
        let full = std::any::type_name::<A>();
        let path = full.split('<').next().unwrap_or(full);
        let name = path.rsplit("::").next().unwrap_or(path);
        Self::named(name.to_owned())
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<Cow<'static, str>>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn with_analytics_id(mut self, id: impl Into<Cow<'static, str>>) -> Self {
        self.analytics_id = Some(id.into());
        self
    }

    #[must_use]
    pub const fn on(mut self, target: ExecutionTarget) -> Self {
        self.target = target;
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Only actions with an analytics id are reported to analytics collaborators.
    #[must_use]
    pub fn analytics_id(&self) -> Option<&str> {
        self.analytics_id.as_deref()
    }

    #[must_use]
    pub const fn target(&self) -> ExecutionTarget {
        self.target
    }
}

/// A unit of work bound to a feature.
///
/// `perform` must resolve `completion` exactly once and return the resulting [`Status`]:
/// either `completion.completed_sync(..)` before returning, or the status of
/// `completion.will_complete_async()` with the deferred token fired later.
///
/// # Examples
/// ```rust
/// use gatekit_completion::{CompletionRequirement, Status};
/// use gatekit_dispatch::{Action, ActionDescriptor, ActionOutcome, ExecutionTarget};
///
/// #[derive(Debug)]
/// struct ShowTitle;
///
/// impl Action for ShowTitle {
///     type Input = String;
///
///     fn descriptor() -> ActionDescriptor {
///         ActionDescriptor::of::<Self>().on(ExecutionTarget::Any)
///     }
///
///     fn perform(&self, input: String, completion: &CompletionRequirement<ActionOutcome>) -> Status {
///         println!("{input}");
///         completion.completed_sync(ActionOutcome::success())
///     }
/// }
///
/// assert_eq!(ShowTitle::descriptor().name(), "ShowTitle");
/// ```
pub trait Action: Send + Sync + 'static {
    /// Recorded on the action stack through its `Debug` output only.
    type Input: fmt::Debug + Send + 'static;

    fn descriptor() -> ActionDescriptor
    where
        Self: Sized;

    fn perform(
        &self,
        input: Self::Input,
        completion: &CompletionRequirement<ActionOutcome>,
    ) -> Status;
}

/// The result an action reports through its completion.
///
/// Either variant may close the feature's action stack.
#[derive(Debug, Clone)]
pub enum ActionOutcome {
    Success { close_stack: bool },
    Failure { error: Arc<dyn Error + Send + Sync>, close_stack: bool },
}

impl ActionOutcome {
    #[must_use]
    pub const fn success() -> Self {
        Self::Success { close_stack: false }
    }

    /// Success that also ends the feature's current use.
    #[must_use]
    pub const fn success_closing() -> Self {
        Self::Success { close_stack: true }
    }

    pub fn failure<E: Error + Send + Sync + 'static>(error: E) -> Self {
        Self::Failure { error: Arc::new(error), close_stack: false }
    }

    pub fn failure_closing<E: Error + Send + Sync + 'static>(error: E) -> Self {
        Self::Failure { error: Arc::new(error), close_stack: true }
    }

    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    #[must_use]
    pub const fn closes_stack(&self) -> bool {
        match self {
            Self::Success { close_stack } | Self::Failure { close_stack, .. } => *close_stack,
        }
    }

    #[must_use]
    pub fn error(&self) -> Option<&(dyn Error + Send + Sync)> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { error, .. } => Some(error.as_ref()),
        }
    }
}

/// What triggered an action.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, EnumString, EnumIter, IntoStaticStr,
)]
#[strum(serialize_all = "snake_case")]
pub enum ActionSource {
    /// The application itself, e.g. a timer or another action.
    #[default]
    Application,
    /// A direct user interaction.
    User,
    OpenUrl,
    ContinueActivity,
    Shortcut,
}

impl ActionSource {
    /// Sources that imply the user asked for the action.
    #[must_use]
    pub const fn is_user_facing(self) -> bool {
        !matches!(self, Self::Application)
    }
}

/// Everything needed to perform one action on one feature.
///
/// ```rust
/// # use gatekit_completion::{CompletionRequirement, Status};
/// # use gatekit_dispatch::{Action, ActionDescriptor, ActionOutcome, ActionRequest, ActionSource};
/// # use gatekit_domain::FeatureId;
/// # #[derive(Debug)]
/// # struct Play;
/// # impl Action for Play {
/// #     type Input = u32;
/// #     fn descriptor() -> ActionDescriptor { ActionDescriptor::of::<Self>() }
/// #     fn perform(&self, _: u32, c: &CompletionRequirement<ActionOutcome>) -> Status {
/// #         c.completed_sync(ActionOutcome::success())
/// #     }
/// # }
/// let request = ActionRequest::builder()
///     .feature(FeatureId::parse("media.player").unwrap())
///     .action(Play)
///     .input(42)
///     .source(ActionSource::User)
///     .build();
/// assert!(request.user_initiated);
/// ```
#[derive(Debug, TypedBuilder)]
pub struct ActionRequest<A: Action> {
    pub feature: FeatureId,
    #[builder(setter(transform = |action: A| Arc::new(action)))]
    pub action: Arc<A>,
    pub input: A::Input,
    #[builder(default)]
    pub source: ActionSource,
    /// Defaults to whether `source` is user-facing.
    #[builder(default = source.is_user_facing())]
    pub user_initiated: bool,
}
