mod fixtures;

use fixtures::{Dismiss, Explode, Faulty, Load, Play, Recorder, World, completion, id};
use gatekit_availability::DeclaredConstraints;
use gatekit_dispatch::{
    ActionRequest, ActionSource, DispatchError, DispatchObserver, EntryDetails, FeatureDescriptor,
    RouteDecision,
};
use gatekit_domain::PurchaseRequirement;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

const WAIT: Duration = Duration::from_secs(5);

fn world() -> World {
    let world = World::new();
    let pro = DeclaredConstraints::build(|b| {
        b.purchase(PurchaseRequirement::product("PROD-A"));
    })
    .unwrap();
    world.catalog.register(FeatureDescriptor::new(id("media")), DeclaredConstraints::none()).unwrap();
    world.catalog.register(FeatureDescriptor::new(id("pro")), pro).unwrap();
    world.catalog.register(FeatureDescriptor::new(id("pro.export")), DeclaredConstraints::none()).unwrap();
    world.catalog.register(FeatureDescriptor::new(id("share")), DeclaredConstraints::none()).unwrap();

    for feature in ["media", "pro", "pro.export", "share"] {
        world.catalog.declare::<Play>(&id(feature)).unwrap();
        world.catalog.declare::<Dismiss>(&id(feature)).unwrap();
    }
    world.catalog.declare::<Load>(&id("media")).unwrap();
    world.catalog.declare::<Explode>(&id("media")).unwrap();
    world.catalog.declare::<Explode>(&id("share")).unwrap();
    world
}

fn play(feature: &str, track: u32) -> ActionRequest<Play> {
    ActionRequest::builder().feature(id(feature)).action(Play).input(track).build()
}

fn dismiss(feature: &str) -> ActionRequest<Dismiss> {
    ActionRequest::builder()
        .feature(id(feature))
        .action(Dismiss)
        .input(())
        .source(ActionSource::User)
        .build()
}

#[test]
fn undeclared_actions_are_rejected() {
    let world = world();
    let session = world.session("main");
    let (requirement, _rx) = completion();

    let request = ActionRequest::builder().feature(id("share")).action(Load).input(true).build();
    let err = session.perform(request, &requirement).unwrap_err();
    assert!(matches!(err, DispatchError::UnknownAction { .. }));

    let err = session.perform(play("missing", 1), &requirement).unwrap_err();
    assert!(matches!(err, DispatchError::UnknownFeature { .. }));
    assert!(requirement.is_pending());
}

#[test]
fn gate_refuses_until_the_feature_is_available() {
    let world = world();
    let session = world.session("main");

    let (requirement, _rx) = completion();
    let err = session.perform(play("pro", 1), &requirement).unwrap_err();
    assert!(matches!(err, DispatchError::Unavailable { verdict: None, .. }));
    assert!(requirement.is_pending());
    assert!(session.stack(&id("pro")).is_none());

    world.purchases.set_purchased("PROD-A", false);
    let err = session.perform(play("pro.export", 1), &requirement).unwrap_err();
    assert!(matches!(err, DispatchError::Unavailable { verdict: Some(false), .. }));

    world.purchases.set_purchased("PROD-A", true);
    let (requirement, rx) = completion();
    let status = session.perform(play("pro.export", 1), &requirement).unwrap();
    assert!(requirement.verify(&status));
    assert!(!status.was_async());
    let (outcome, was_async) = rx.recv_timeout(WAIT).unwrap();
    assert!(outcome.is_success());
    assert!(!was_async);
}

#[test]
fn unconditional_features_are_never_gated() {
    let world = world();
    let session = world.session("main");

    assert_eq!(session.verdict(&id("media")).unwrap(), Some(true));
    assert_eq!(session.verdict(&id("pro.export")).unwrap(), None);
    assert!(matches!(session.verdict(&id("missing")), Err(DispatchError::UnknownFeature { .. })));

    let (requirement, rx) = completion();
    session.perform(play("media", 3), &requirement).unwrap();
    assert!(rx.recv_timeout(WAIT).unwrap().0.is_success());
}

#[test]
fn actions_are_recorded_on_the_feature_stack() {
    let world = world();
    let session = world.session("main");

    for track in [1, 2] {
        let (requirement, _rx) = completion();
        session.perform(play("media", track), &requirement).unwrap();
    }

    let stack = session.stack(&id("media")).unwrap();
    let inputs: Vec<_> = stack
        .entries()
        .into_iter()
        .map(|entry| match entry.details {
            EntryDetails::Action { name, input, .. } => format!("{name}({input})"),
            EntryDetails::Substack(_) => "substack".to_owned(),
        })
        .collect();
    assert_eq!(inputs, ["Play(1)", "Play(2)"]);
    assert!(stack.entries().iter().all(|entry| !entry.user_initiated));
    assert!(Arc::ptr_eq(&session.current_stack().unwrap(), &stack));
}

#[test]
fn nested_stacks_close_back_to_their_parent() {
    let world = world();
    let session = world.session("main");

    let (requirement, _rx) = completion();
    session.perform(play("media", 1), &requirement).unwrap();
    let (requirement, _rx) = completion();
    session.perform(play("share", 1), &requirement).unwrap();

    let media = session.stack(&id("media")).unwrap();
    let share = session.stack(&id("share")).unwrap();
    assert!(Arc::ptr_eq(&share.parent().unwrap(), &media));
    assert!(matches!(
        media.entries().last().map(|entry| &entry.details),
        Some(EntryDetails::Substack(nested)) if Arc::ptr_eq(nested, &share)
    ));

    let (requirement, rx) = completion();
    session.perform(dismiss("share"), &requirement).unwrap();
    assert!(rx.recv_timeout(WAIT).unwrap().0.closes_stack());

    assert!(session.stack(&id("share")).is_none());
    assert!(world.stacks.terminated(share.id()).is_some());
    assert_eq!(share.len(), 2);
    assert!(share.entries()[1].user_initiated);
    assert!(Arc::ptr_eq(&session.current_stack().unwrap(), &media));
}

#[test]
fn sessions_keep_separate_stacks() {
    let world = world();
    let main = world.session("main");
    let widget = world.session("widget");

    let (requirement, _rx) = completion();
    main.perform(play("media", 1), &requirement).unwrap();
    let (requirement, _rx) = completion();
    widget.perform(play("media", 1), &requirement).unwrap();

    let a = main.stack(&id("media")).unwrap();
    let b = widget.stack(&id("media")).unwrap();
    assert!(!Arc::ptr_eq(&a, &b));
    assert_eq!(b.session(), "widget");
}

#[test]
fn async_outcomes_are_relayed_once() {
    let world = world();
    let session = world.session("main");

    let (requirement, rx) = completion();
    let request = ActionRequest::builder().feature(id("media")).action(Load).input(false).build();
    let status = session.perform(request, &requirement).unwrap();
    assert!(requirement.verify(&status));
    assert!(status.was_async());

    let (outcome, was_async) = rx.recv_timeout(WAIT).unwrap();
    assert!(was_async);
    assert!(!outcome.is_success());
    assert_eq!(outcome.error().map(ToString::to_string).as_deref(), Some("load failed"));
    assert!(requirement.is_completed());
    assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());

    // The failure closed the stack.
    assert!(session.stack(&id("media")).is_none());
}

#[test]
fn observers_hear_begin_and_end_in_registration_order() {
    let world = world();
    let session = world.session("main");
    let first = Arc::new(Recorder { name: "first", ..Recorder::default() });
    let second = Arc::new(Recorder { name: "second", log: first.log.clone() });
    world.dispatcher.add_observer(first.clone());
    world.dispatcher.add_observer(second.clone());

    let (requirement, _rx) = completion();
    session.perform(play("media", 1), &requirement).unwrap();
    let (requirement, rx) = completion();
    let request = ActionRequest::builder().feature(id("media")).action(Load).input(true).build();
    session.perform(request, &requirement).unwrap();
    rx.recv_timeout(WAIT).unwrap();
    world.dispatcher.flush().unwrap();

    assert_eq!(
        *first.log.lock(),
        [
            "first begin Play",
            "second begin Play",
            "first end Play ok",
            "second end Play ok",
            "first begin Load",
            "second begin Load",
            "first end Load ok",
            "second end Load ok",
        ]
    );

    let removed: Arc<dyn DispatchObserver> = second;
    assert!(world.dispatcher.remove_observer(&removed));
    assert_eq!(world.dispatcher.observer_count(), 1);
}

#[test]
fn panicking_observer_does_not_silence_the_others() {
    let world = world();
    let session = world.session("main");
    let faulty: Arc<dyn DispatchObserver> = Arc::new(Faulty);
    let recorder = Arc::new(Recorder { name: "rec", ..Recorder::default() });
    world.dispatcher.add_observer(faulty.clone());
    world.dispatcher.add_observer(recorder.clone());

    let (requirement, _rx) = completion();
    session.perform(play("media", 1), &requirement).unwrap();
    world.dispatcher.flush().unwrap();
    assert_eq!(*recorder.log.lock(), ["rec begin Play", "rec end Play ok"]);

    assert!(world.dispatcher.remove_observer(&faulty));
    let (requirement, _rx) = completion();
    session.perform(play("media", 2), &requirement).unwrap();
    world.dispatcher.flush().unwrap();
    assert_eq!(recorder.log.lock().len(), 4);
}

fn explode(feature: &str) -> ActionRequest<Explode> {
    ActionRequest::builder().feature(id(feature)).action(Explode).input(()).build()
}

#[test]
fn failed_hand_off_leaves_no_trace_on_the_stack() {
    let world = world();
    let session = world.session("main");

    let (requirement, _rx) = completion();
    session.perform(play("media", 1), &requirement).unwrap();

    let (requirement, _rx) = completion();
    let unwound =
        panic::catch_unwind(AssertUnwindSafe(|| session.perform(explode("media"), &requirement)));
    assert!(unwound.is_err());
    let media = session.stack(&id("media")).unwrap();
    assert_eq!(media.len(), 1);

    let (requirement, _rx) = completion();
    let unwound =
        panic::catch_unwind(AssertUnwindSafe(|| session.perform(explode("share"), &requirement)));
    assert!(unwound.is_err());
    assert!(session.stack(&id("share")).is_none());
    assert!(Arc::ptr_eq(&session.current_stack().unwrap(), &media));
}

#[test]
fn routed_requests_only_run_when_ready() {
    let world = world();
    let session = world.session("main");
    let (requirement, rx) = completion();

    let skipped = session.perform_routed::<Play>(RouteDecision::UserCancelled, &requirement).unwrap();
    assert!(skipped.is_none());
    assert!(requirement.is_pending());

    let decision = RouteDecision::Ready(play("media", 9));
    let status = session.perform_routed(decision, &requirement).unwrap().unwrap();
    assert!(requirement.verify(&status));
    assert!(rx.recv_timeout(WAIT).unwrap().0.is_success());
}
