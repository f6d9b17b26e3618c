//! Single-slot suggestion lifecycle.
//!
//! ```text
//! Idle ──begin──▶ Pending ──resolve──▶ Proposed ──accept/reject──▶ Idle
//!                    │                    │
//!                    └──fail──▶ Idle      └──begin──▶ Pending
//! ```
//!
//! Several Suggest requests may be in flight at once; the slot tracks them
//! so a failure of one does not hide another that is still outstanding.

use std::collections::HashSet;

use pyrunner_types::RequestId;

/// A proposed continuation awaiting a decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suggestion {
    pub text: String,
    pub origin: RequestId,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SlotState {
    #[default]
    Idle,
    Pending,
    Proposed(Suggestion),
}

#[derive(Debug, Clone, Default)]
pub struct SuggestionSlot {
    state: SlotState,
    in_flight: HashSet<RequestId>,
}

impl SuggestionSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// A request was dispatched. Any proposed value is discarded.
    pub fn begin(&mut self, request: RequestId) {
        self.in_flight.insert(request);
        self.state = SlotState::Pending;
    }

    /// A request succeeded. Its text overwrites whatever the slot held.
    pub fn resolve(&mut self, request: RequestId, text: impl Into<String>) {
        self.in_flight.remove(&request);
        self.state = SlotState::Proposed(Suggestion {
            text: text.into(),
            origin: request,
        });
    }

    /// A request failed. A proposed value, if any, is left alone.
    pub fn fail(&mut self, request: RequestId) {
        self.finish_without_result(request);
    }

    /// A result was dropped as superseded.
    pub fn discard(&mut self, request: RequestId) {
        self.finish_without_result(request);
    }

    /// Take the proposed suggestion for appending to the document.
    ///
    /// `None` when nothing is proposed.
    pub fn accept(&mut self) -> Option<Suggestion> {
        self.take_proposed()
    }

    /// Drop the proposed suggestion. Rejecting an empty slot is a no-op.
    pub fn reject(&mut self) -> Option<Suggestion> {
        self.take_proposed()
    }

    pub fn state(&self) -> &SlotState {
        &self.state
    }

    pub fn current(&self) -> Option<&Suggestion> {
        match &self.state {
            SlotState::Proposed(s) => Some(s),
            _ => None,
        }
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    fn finish_without_result(&mut self, request: RequestId) {
        self.in_flight.remove(&request);
        if self.state == SlotState::Pending && self.in_flight.is_empty() {
            self.state = SlotState::Idle;
        }
    }

    fn take_proposed(&mut self) -> Option<Suggestion> {
        if !matches!(self.state, SlotState::Proposed(_)) {
            return None;
        }
        let next = if self.in_flight.is_empty() {
            SlotState::Idle
        } else {
            SlotState::Pending
        };
        match std::mem::replace(&mut self.state, next) {
            SlotState::Proposed(s) => Some(s),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path() {
        let mut slot = SuggestionSlot::new();
        let id = RequestId::new();
        slot.begin(id);
        assert_eq!(slot.state(), &SlotState::Pending);

        slot.resolve(id, "return 1");
        assert_eq!(slot.current().unwrap().text, "return 1");
        assert_eq!(slot.current().unwrap().origin, id);

        let accepted = slot.accept().unwrap();
        assert_eq!(accepted.text, "return 1");
        assert_eq!(slot.state(), &SlotState::Idle);
    }

    #[test]
    fn test_reject_twice_is_noop() {
        let mut slot = SuggestionSlot::new();
        let id = RequestId::new();
        slot.begin(id);
        slot.resolve(id, "x");

        assert!(slot.reject().is_some());
        assert!(slot.reject().is_none());
        assert_eq!(slot.state(), &SlotState::Idle);
    }

    #[test]
    fn test_begin_discards_proposed() {
        let mut slot = SuggestionSlot::new();
        let first = RequestId::new();
        slot.begin(first);
        slot.resolve(first, "stale");

        slot.begin(RequestId::new());
        assert_eq!(slot.state(), &SlotState::Pending);
        assert!(slot.accept().is_none());
    }

    #[test]
    fn test_failure_returns_to_idle_only_when_nothing_in_flight() {
        let mut slot = SuggestionSlot::new();
        let a = RequestId::new();
        let b = RequestId::new();
        slot.begin(a);
        slot.begin(b);

        slot.fail(a);
        assert_eq!(slot.state(), &SlotState::Pending);
        slot.fail(b);
        assert_eq!(slot.state(), &SlotState::Idle);
    }

    #[test]
    fn test_failure_leaves_proposed_untouched() {
        let mut slot = SuggestionSlot::new();
        let a = RequestId::new();
        let b = RequestId::new();
        slot.begin(a);
        slot.begin(b);
        slot.resolve(b, "from b");
        slot.fail(a);
        assert_eq!(slot.current().unwrap().text, "from b");
    }

    #[test]
    fn test_last_resolution_wins() {
        let mut slot = SuggestionSlot::new();
        let older = RequestId::new();
        let newer = RequestId::new();
        slot.begin(older);
        slot.begin(newer);

        slot.resolve(newer, "newer");
        slot.resolve(older, "older");
        assert_eq!(slot.current().unwrap().text, "older");
        assert_eq!(slot.in_flight(), 0);
    }

    #[test]
    fn test_accept_with_request_outstanding_goes_pending() {
        let mut slot = SuggestionSlot::new();
        let a = RequestId::new();
        let b = RequestId::new();
        slot.begin(a);
        slot.begin(b);
        slot.resolve(a, "a");

        assert!(slot.accept().is_some());
        assert_eq!(slot.state(), &SlotState::Pending);
    }
}
