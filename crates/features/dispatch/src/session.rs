//! The gate every action passes before it runs.

use crate::action::{Action, ActionOutcome, ActionRequest};
use crate::catalog::FeatureCatalog;
use crate::dispatcher::ActionDispatcher;
use crate::error::DispatchError;
use crate::observer::ActionEvent;
use crate::stack::{ActionStack, StackTracker};
use chrono::Utc;
use gatekit_availability::AvailabilityChecker;
use gatekit_completion::{CompletionRequirement, Status};
use gatekit_domain::FeatureId;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Outcome of routing a request before it reaches the core.
///
/// Routing collaborators (URL handlers, shortcut handlers) resolve a request to one of these;
/// only [`RouteDecision::Ready`] carries something to perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision<P> {
    Unsupported,
    UserCancelled,
    AppCancelled,
    AlreadyPerformed,
    Ready(P),
}

impl<P> RouteDecision<P> {
    pub fn into_ready(self) -> Option<P> {
        match self {
            Self::Ready(ready) => Some(ready),
            Self::Unsupported | Self::UserCancelled | Self::AppCancelled | Self::AlreadyPerformed => {
                None
            },
        }
    }
}

/// A named context in which actions are performed, e.g. `main` or a background session.
///
/// Each session tracks its own action stacks.
#[derive(Debug, Clone)]
pub struct ActionSession {
    name: Arc<str>,
    catalog: FeatureCatalog,
    checker: AvailabilityChecker,
    dispatcher: ActionDispatcher,
    stacks: Arc<StackTracker>,
}

impl ActionSession {
    #[must_use]
    pub fn new(
        name: &str,
        catalog: FeatureCatalog,
        checker: AvailabilityChecker,
        dispatcher: ActionDispatcher,
        stacks: Arc<StackTracker>,
    ) -> Self {
        Self { name: Arc::from(name), catalog, checker, dispatcher, stacks }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Performs `request`, reporting the outcome through `completion`.
    ///
    /// Actions on conditional features (or features under a conditional ancestor) only run
    /// when the feature is available (`Some(true)`). The action is recorded on the feature's
    /// stack for this session; an outcome that closes the stack terminates it.
    ///
    /// # Errors
    /// * [`DispatchError::UnknownFeature`] / [`DispatchError::UnknownAction`] for undeclared
    ///   combinations.
    /// * [`DispatchError::Unavailable`] when the gate refuses. `completion` is left pending.
    /// * [`DispatchError::Runtime`] when the execution context cannot run the body.
    pub fn perform<A: Action>(
        &self,
        request: ActionRequest<A>,
        completion: &CompletionRequirement<ActionOutcome>,
    ) -> Result<Status, DispatchError> {
        let ActionRequest { feature, action, input, source, user_initiated } = request;
        let descriptor = self.catalog.action::<A>(&feature)?;
        self.gate(&feature)?;

        let stack = self.stacks.stack_for(&self.name, &feature, user_initiated);
        let snapshot = format!("{input:?}");
        let index = stack.push_action(descriptor.name(), source, snapshot.clone(), user_initiated);
        let entry = EntryGuard { stacks: &self.stacks, stack: &stack, index, armed: true };
        self.close_on_completion(completion, &stack);

        let event = ActionEvent {
            feature,
            action: descriptor.name().to_owned(),
            analytics_id: descriptor.analytics_id().map(str::to_owned),
            session: self.name.to_string(),
            stack: stack.id().to_owned(),
            source,
            user_initiated,
            input: snapshot,
            started_at: Utc::now(),
        };
        let status =
            self.dispatcher.dispatch(action, input, event, descriptor.target(), completion)?;
        entry.disarm();
        Ok(status)
    }

    /// Performs a routed request, or returns `Ok(None)` when routing did not produce one.
    ///
    /// # Errors
    /// As [`perform`](Self::perform).
    pub fn perform_routed<A: Action>(
        &self,
        decision: RouteDecision<ActionRequest<A>>,
        completion: &CompletionRequirement<ActionOutcome>,
    ) -> Result<Option<Status>, DispatchError> {
        match decision {
            RouteDecision::Ready(request) => self.perform(request, completion).map(Some),
            other => {
                debug!(session = %self.name, decision = route_name(&other), "Nothing to perform");
                Ok(None)
            },
        }
    }

    /// The verdict the gate would apply to `feature` right now.
    ///
    /// # Errors
    /// Returns [`DispatchError::UnknownFeature`] for features outside the catalog.
    pub fn verdict(&self, feature: &FeatureId) -> Result<Option<bool>, DispatchError> {
        if !self.catalog.contains(feature) {
            return Err(DispatchError::UnknownFeature {
                message: feature.to_string().into(),
                context: Some("verdict".into()),
            });
        }
        if self.catalog.is_always_available(feature) {
            return Ok(Some(true));
        }
        Ok(self.checker.is_available(feature)?)
    }

    /// The active stack of `feature` in this session.
    #[must_use]
    pub fn stack(&self, feature: &FeatureId) -> Option<Arc<ActionStack>> {
        self.stacks.active(&self.name, feature)
    }

    /// The stack this session used last, if still active.
    #[must_use]
    pub fn current_stack(&self) -> Option<Arc<ActionStack>> {
        self.stacks.current(&self.name)
    }

    fn gate(&self, feature: &FeatureId) -> Result<(), DispatchError> {
        let verdict = self.verdict(feature)?;
        if verdict == Some(true) {
            return Ok(());
        }
        info!(session = %self.name, feature = %feature, ?verdict, "Action refused by gate");
        Err(DispatchError::Unavailable {
            verdict,
            message: feature.to_string().into(),
            context: Some(self.name.to_string().into()),
        })
    }

    fn close_on_completion(
        &self,
        completion: &CompletionRequirement<ActionOutcome>,
        stack: &Arc<ActionStack>,
    ) {
        let stacks = Arc::clone(&self.stacks);
        let stack = Arc::clone(stack);
        completion.on_complete(move |outcome, _| {
            if outcome.closes_stack() {
                stacks.terminate(&stack);
            }
        });
    }
}

/// Takes back the entry of an action whose hand-off failed or unwound, and the stack too if
/// that entry was its only one.
struct EntryGuard<'a> {
    stacks: &'a StackTracker,
    stack: &'a Arc<ActionStack>,
    index: usize,
    armed: bool,
}

impl EntryGuard<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for EntryGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        self.stack.retract(self.index);
        warn!(
            session = self.stack.session(),
            feature = %self.stack.feature(),
            stack = self.stack.id(),
            "Action did not complete its hand-off; stack entry retracted"
        );
        if self.stack.is_empty() {
            self.stacks.terminate(self.stack);
        }
    }
}

const fn route_name<P>(decision: &RouteDecision<P>) -> &'static str {
    match decision {
        RouteDecision::Unsupported => "unsupported",
        RouteDecision::UserCancelled => "user_cancelled",
        RouteDecision::AppCancelled => "app_cancelled",
        RouteDecision::AlreadyPerformed => "already_performed",
        RouteDecision::Ready(_) => "ready",
    }
}
