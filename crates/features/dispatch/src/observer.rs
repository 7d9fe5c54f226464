use crate::action::{ActionOutcome, ActionSource};
use chrono::{DateTime, Utc};
use gatekit_domain::FeatureId;
use std::fmt;

/// Identity of one dispatched action, as observers see it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionEvent {
    pub feature: FeatureId,
    pub action: String,
    pub analytics_id: Option<String>,
    pub session: String,
    pub stack: String,
    pub source: ActionSource,
    pub user_initiated: bool,
    /// `Debug` rendering of the input.
    pub input: String,
    pub started_at: DateTime<Utc>,
}

/// Notified when dispatched actions begin and complete.
///
/// Calls arrive on the dispatcher's notification thread, in observer registration order,
/// never on the thread that performed the action. A panicking observer is logged and skipped;
/// the others still receive the call.
pub trait DispatchObserver: Send + Sync + fmt::Debug {
    fn action_will_begin(&self, event: &ActionEvent);

    fn action_did_complete(&self, event: &ActionEvent, outcome: &ActionOutcome);
}
