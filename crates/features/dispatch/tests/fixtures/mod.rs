#![allow(dead_code)]

use gatekit_availability::{
    AvailabilityChecker, ConstraintsEvaluator, MemoryPurchaseTracker, PurchaseEvaluator,
};
use gatekit_completion::{CompletionRequirement, Status};
use gatekit_dispatch::{
    Action, ActionDescriptor, ActionDispatcher, ActionEvent, ActionOutcome, ActionSession,
    DispatchObserver, ExecutionTarget, FeatureCatalog, StackTracker,
};
use gatekit_domain::FeatureId;
use gatekit_domain::config::{AvailabilityConfig, DispatchConfig, StackConfig};
use gatekit_signals::SignalBus;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::sync::mpsc;

pub fn id(path: &str) -> FeatureId {
    FeatureId::parse(path).unwrap()
}

/// Fully wired dispatch stack over an in-memory purchase tracker.
pub struct World {
    pub bus: SignalBus,
    pub purchases: MemoryPurchaseTracker,
    pub catalog: FeatureCatalog,
    pub checker: AvailabilityChecker,
    pub dispatcher: ActionDispatcher,
    pub stacks: Arc<StackTracker>,
}

impl World {
    pub fn new() -> Self {
        let bus = SignalBus::new();
        let purchases = MemoryPurchaseTracker::new(bus.clone());
        let evaluator = Arc::new(
            ConstraintsEvaluator::new()
                .with_evaluator(Arc::new(PurchaseEvaluator::new(Arc::new(purchases.clone())))),
        );
        let catalog = FeatureCatalog::new(evaluator.clone());
        let checker =
            AvailabilityChecker::new(evaluator, &bus, &AvailabilityConfig::default()).unwrap();
        let dispatcher = ActionDispatcher::new(&DispatchConfig {
            background_threads: 2,
            ..DispatchConfig::default()
        })
        .unwrap();
        let stacks = Arc::new(StackTracker::new(&StackConfig::default()));
        Self { bus, purchases, catalog, checker, dispatcher, stacks }
    }

    pub fn session(&self, name: &str) -> ActionSession {
        ActionSession::new(
            name,
            self.catalog.clone(),
            self.checker.clone(),
            self.dispatcher.clone(),
            self.stacks.clone(),
        )
    }
}

/// Completion that forwards every delivery into a channel.
pub fn completion() -> (CompletionRequirement<ActionOutcome>, mpsc::Receiver<(ActionOutcome, bool)>)
{
    let (tx, rx) = mpsc::channel();
    let requirement = CompletionRequirement::new(move |outcome, was_async| {
        let _ = tx.send((outcome, was_async));
    });
    (requirement, rx)
}

#[derive(Debug)]
pub struct Play;

impl Action for Play {
    type Input = u32;

    fn descriptor() -> ActionDescriptor {
        ActionDescriptor::of::<Self>().with_analytics_id("media-play")
    }

    fn perform(&self, _track: u32, completion: &CompletionRequirement<ActionOutcome>) -> Status {
        completion.completed_sync(ActionOutcome::success())
    }
}

#[derive(Debug)]
pub struct Dismiss;

impl Action for Dismiss {
    type Input = ();

    fn descriptor() -> ActionDescriptor {
        ActionDescriptor::of::<Self>().on(ExecutionTarget::Any)
    }

    fn perform(&self, (): (), completion: &CompletionRequirement<ActionOutcome>) -> Status {
        completion.completed_sync(ActionOutcome::success_closing())
    }
}

/// Panics before resolving its completion.
#[derive(Debug)]
pub struct Explode;

impl Action for Explode {
    type Input = ();

    fn descriptor() -> ActionDescriptor {
        ActionDescriptor::of::<Self>()
    }

    fn perform(&self, (): (), _completion: &CompletionRequirement<ActionOutcome>) -> Status {
        panic!("action body failed");
    }
}

#[derive(Debug)]
pub struct LoadFailed;

impl fmt::Display for LoadFailed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("load failed")
    }
}

impl std::error::Error for LoadFailed {}

/// Finishes on its own thread after the body returned.
#[derive(Debug)]
pub struct Load;

impl Action for Load {
    type Input = bool;

    fn descriptor() -> ActionDescriptor {
        ActionDescriptor::of::<Self>().on(ExecutionTarget::Background)
    }

    fn perform(&self, succeed: bool, completion: &CompletionRequirement<ActionOutcome>) -> Status {
        let deferred = completion.will_complete_async();
        let status = deferred.status();
        std::thread::spawn(move || {
            let outcome = if succeed {
                ActionOutcome::success()
            } else {
                ActionOutcome::failure_closing(LoadFailed)
            };
            deferred.completed(outcome);
        });
        status
    }
}

/// Records begin/end notifications as strings.
#[derive(Debug, Default)]
pub struct Recorder {
    pub name: &'static str,
    pub log: Arc<Mutex<Vec<String>>>,
}

impl DispatchObserver for Recorder {
    fn action_will_begin(&self, event: &ActionEvent) {
        self.log.lock().push(format!("{} begin {}", self.name, event.action));
    }

    fn action_did_complete(&self, event: &ActionEvent, outcome: &ActionOutcome) {
        let result = if outcome.is_success() { "ok" } else { "failed" };
        self.log.lock().push(format!("{} end {} {result}", self.name, event.action));
    }
}

/// Panics on every notification.
#[derive(Debug)]
pub struct Faulty;

impl DispatchObserver for Faulty {
    fn action_will_begin(&self, event: &ActionEvent) {
        panic!("observer failed on begin of {}", event.action);
    }

    fn action_did_complete(&self, event: &ActionEvent, _outcome: &ActionOutcome) {
        panic!("observer failed on end of {}", event.action);
    }
}
