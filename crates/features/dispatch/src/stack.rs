//! Per-session trails of performed actions.
//!
//! Each session keeps at most one active [`ActionStack`] per feature. Performing an action on
//! a feature without an active stack opens one; if another feature's stack is current at
//! that moment, the new stack is nested inside it as a [`EntryDetails::Substack`] entry. A
//! stack-closing outcome terminates the stack and moves it to a bounded history.

use crate::action::ActionSource;
use chrono::{DateTime, Utc};
use fxhash::FxHashMap;
use gatekit_domain::FeatureId;
use gatekit_domain::config::StackConfig;
use gatekit_kernel::safe_nanoid;
use moka::sync::Cache;
use parking_lot::Mutex;
use std::fmt;
use std::sync::{Arc, Weak};
use tracing::{debug, trace};

/// What an entry records.
#[derive(Debug, Clone)]
pub enum EntryDetails {
    /// A performed action. `input` is the `Debug` rendering of the input, never the input.
    Action { name: String, source: ActionSource, input: String },
    /// A stack opened while this one was current.
    Substack(Arc<ActionStack>),
}

/// One immutable line of an [`ActionStack`].
#[derive(Debug, Clone)]
pub struct ActionStackEntry {
    pub timestamp: DateTime<Utc>,
    pub user_initiated: bool,
    pub feature: FeatureId,
    pub session: String,
    pub details: EntryDetails,
}

/// The trail of one feature's current use in one session.
pub struct ActionStack {
    id: String,
    started_at: DateTime<Utc>,
    parent: Option<Weak<Self>>,
    feature: FeatureId,
    session: String,
    user_initiated: bool,
    entries: Mutex<Vec<ActionStackEntry>>,
}

impl ActionStack {
    fn open(
        session: &str,
        feature: &FeatureId,
        user_initiated: bool,
        parent: Option<&Arc<Self>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            id: safe_nanoid!(),
            started_at: Utc::now(),
            parent: parent.map(Arc::downgrade),
            feature: feature.clone(),
            session: session.to_owned(),
            user_initiated,
            entries: Mutex::new(Vec::new()),
        })
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub const fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// The stack this one was nested in, while that stack is still alive.
    #[must_use]
    pub fn parent(&self) -> Option<Arc<Self>> {
        self.parent.as_ref().and_then(Weak::upgrade)
    }

    #[must_use]
    pub const fn feature(&self) -> &FeatureId {
        &self.feature
    }

    #[must_use]
    pub fn session(&self) -> &str {
        &self.session
    }

    #[must_use]
    pub const fn user_initiated(&self) -> bool {
        self.user_initiated
    }

    /// Snapshot of the entries in append order.
    #[must_use]
    pub fn entries(&self) -> Vec<ActionStackEntry> {
        self.entries.lock().clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Appends an action entry and returns its position.
    pub fn push_action(
        &self,
        name: impl Into<String>,
        source: ActionSource,
        input: impl Into<String>,
        user_initiated: bool,
    ) -> usize {
        self.push(
            EntryDetails::Action { name: name.into(), source, input: input.into() },
            user_initiated,
        )
    }

    /// Removes the entry at `index`, for an action that never got to run.
    pub(crate) fn retract(&self, index: usize) {
        let mut entries = self.entries.lock();
        if index < entries.len() {
            entries.remove(index);
        }
    }

    fn push(&self, details: EntryDetails, user_initiated: bool) -> usize {
        let entry = ActionStackEntry {
            timestamp: Utc::now(),
            user_initiated,
            feature: self.feature.clone(),
            session: self.session.clone(),
            details,
        };
        let mut entries = self.entries.lock();
        entries.push(entry);
        entries.len() - 1
    }
}

impl fmt::Debug for ActionStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionStack")
            .field("id", &self.id)
            .field("feature", &self.feature)
            .field("session", &self.session)
            .field("parent", &self.parent().map(|p| p.id.clone()))
            .field("entries", &self.len())
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Default)]
struct SessionStacks {
    active: FxHashMap<FeatureId, Arc<ActionStack>>,
    current: Option<FeatureId>,
}

/// Tracks active stacks per session and keeps a bounded history of terminated ones.
pub struct StackTracker {
    sessions: Mutex<FxHashMap<String, SessionStacks>>,
    history: Cache<String, Arc<ActionStack>>,
}

impl StackTracker {
    #[must_use]
    pub fn new(config: &StackConfig) -> Self {
        Self { sessions: Mutex::default(), history: Cache::new(config.history_capacity) }
    }

    /// The active stack of `feature` in `session`, opening (and possibly nesting) a new one
    /// if there is none. The returned stack becomes the session's current stack.
    pub fn stack_for(
        &self,
        session: &str,
        feature: &FeatureId,
        user_initiated: bool,
    ) -> Arc<ActionStack> {
        let mut sessions = self.sessions.lock();
        let stacks = sessions.entry(session.to_owned()).or_default();

        if let Some(stack) = stacks.active.get(feature) {
            let stack = Arc::clone(stack);
            stacks.current = Some(feature.clone());
            return stack;
        }

        let parent = stacks
            .current
            .as_ref()
            .filter(|current| *current != feature)
            .and_then(|current| stacks.active.get(current))
            .cloned();
        let stack = ActionStack::open(session, feature, user_initiated, parent.as_ref());
        if let Some(parent) = &parent {
            parent.push(EntryDetails::Substack(Arc::clone(&stack)), user_initiated);
        }
        debug!(
            session,
            feature = %feature,
            stack = stack.id(),
            parent = parent.as_ref().map(|p| p.id()),
            "Action stack opened"
        );

        stacks.active.insert(feature.clone(), Arc::clone(&stack));
        stacks.current = Some(feature.clone());
        stack
    }

    /// Removes `stack` from its session's active set and records it in the history.
    ///
    /// Returns `false` if it was already terminated. Nested stacks stay active. If it was the
    /// current stack, its parent becomes current again when the parent is still active.
    pub fn terminate(&self, stack: &Arc<ActionStack>) -> bool {
        let mut sessions = self.sessions.lock();
        let Some(stacks) = sessions.get_mut(stack.session()) else {
            return false;
        };
        let is_active =
            stacks.active.get(stack.feature()).is_some_and(|active| Arc::ptr_eq(active, stack));
        if !is_active {
            trace!(stack = stack.id(), "Stack already terminated");
            return false;
        }

        stacks.active.remove(stack.feature());
        if stacks.current.as_ref() == Some(stack.feature()) {
            stacks.current = stack
                .parent()
                .filter(|parent| {
                    stacks.active.get(parent.feature()).is_some_and(|p| Arc::ptr_eq(p, parent))
                })
                .map(|parent| parent.feature().clone());
        }
        if stacks.active.is_empty() {
            sessions.remove(stack.session());
        }
        drop(sessions);

        self.history.insert(stack.id().to_owned(), Arc::clone(stack));
        debug!(
            session = stack.session(),
            feature = %stack.feature(),
            stack = stack.id(),
            entries = stack.len(),
            "Action stack terminated"
        );
        true
    }

    #[must_use]
    pub fn active(&self, session: &str, feature: &FeatureId) -> Option<Arc<ActionStack>> {
        self.sessions.lock().get(session).and_then(|stacks| stacks.active.get(feature).cloned())
    }

    /// Active stacks of `session`, oldest first.
    #[must_use]
    pub fn active_stacks(&self, session: &str) -> Vec<Arc<ActionStack>> {
        let mut stacks: Vec<_> = self
            .sessions
            .lock()
            .get(session)
            .map(|stacks| stacks.active.values().cloned().collect())
            .unwrap_or_default();
        stacks.sort_by_key(|stack| stack.started_at());
        stacks
    }

    /// The stack most recently used in `session`, if still active.
    #[must_use]
    pub fn current(&self, session: &str) -> Option<Arc<ActionStack>> {
        let sessions = self.sessions.lock();
        let stacks = sessions.get(session)?;
        stacks.current.as_ref().and_then(|feature| stacks.active.get(feature)).cloned()
    }

    /// A terminated stack, while it is still in the history.
    #[must_use]
    pub fn terminated(&self, id: &str) -> Option<Arc<ActionStack>> {
        self.history.get(id)
    }

    /// Drops every active stack and the history.
    pub fn reset(&self) {
        self.sessions.lock().clear();
        self.history.invalidate_all();
    }
}

impl Default for StackTracker {
    fn default() -> Self {
        Self::new(&StackConfig::default())
    }
}

impl fmt::Debug for StackTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StackTracker")
            .field("sessions", &self.sessions.lock().len())
            .field("history", &self.history.entry_count())
            .finish()
    }
}
