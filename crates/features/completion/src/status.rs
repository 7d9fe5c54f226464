/// Proof that a [`CompletionRequirement`](crate::CompletionRequirement) was resolved.
///
/// Only the requirement itself can produce one: synchronously from
/// [`completed_sync`](crate::CompletionRequirement::completed_sync), or as a promise from
/// [`will_complete_async`](crate::CompletionRequirement::will_complete_async). Returning it is
/// how an operation shows it honoured its completion contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[must_use = "a Status is the proof of completion and must be returned to the caller"]
pub struct Status {
    requirement: u64,
    was_async: bool,
}

impl Status {
    pub(crate) const fn new(requirement: u64, was_async: bool) -> Self {
        Self { requirement, was_async }
    }

    pub(crate) const fn requirement(self) -> u64 {
        self.requirement
    }

    /// `true` if the completion is (or will be) delivered through a deferred token.
    #[must_use]
    pub const fn was_async(self) -> bool {
        self.was_async
    }
}
