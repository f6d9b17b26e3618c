//! Chat session state machine.
//!
//! Each turn moves `Draft → Sent → {Answered, Failed}`. The session itself
//! is append-only: messages are never reordered or removed, and a failed
//! turn keeps its user message.

use std::collections::HashMap;

use pyrunner_types::{ChatMessage, ChatRole, RequestId};

/// Where one sent turn stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnState {
    /// User message echoed, reply outstanding.
    Sent,
    Answered,
    Failed(String),
}

/// Append-only conversation plus the unsent draft.
#[derive(Debug, Clone, Default)]
pub struct ChatSession {
    messages: Vec<ChatMessage>,
    /// Unresolved and failed turns. Answered turns are found through their
    /// reply in `messages`, so the map does not grow with a healthy session.
    turns: HashMap<RequestId, TurnState>,
    draft: String,
    next_ordinal: u64,
}

impl ChatSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_draft(&mut self, text: impl Into<String>) {
        self.draft = text.into();
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    /// Take the draft for sending, leaving it empty.
    pub fn take_draft(&mut self) -> String {
        std::mem::take(&mut self.draft)
    }

    /// Echo a user utterance and mark its turn as sent.
    ///
    /// Returns the messages that preceded it, which is the history the
    /// backend sees for this turn.
    pub fn push_user(&mut self, content: impl Into<String>, request: RequestId) -> Vec<ChatMessage> {
        let prior = self.messages.clone();
        let ordinal = self.take_ordinal();
        self.messages
            .push(ChatMessage::user(content, ordinal, Some(request)));
        self.turns.insert(request, TurnState::Sent);
        prior
    }

    /// Append the reply for a sent turn. Replies land in completion order.
    ///
    /// Returns false, and appends nothing, if the turn is unknown or was
    /// already resolved.
    pub fn record_answer(&mut self, request: RequestId, content: impl Into<String>) -> bool {
        if self.turns.get(&request) != Some(&TurnState::Sent) {
            return false;
        }
        let ordinal = self.take_ordinal();
        self.messages
            .push(ChatMessage::assistant(content, ordinal, Some(request)));
        self.turns.remove(&request);
        true
    }

    /// Mark a sent turn failed. The user message stays.
    pub fn record_failure(&mut self, request: RequestId, reason: impl Into<String>) -> bool {
        if self.turns.get(&request) != Some(&TurnState::Sent) {
            return false;
        }
        self.turns.insert(request, TurnState::Failed(reason.into()));
        true
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn turn_state(&self, request: RequestId) -> Option<TurnState> {
        if let Some(state) = self.turns.get(&request) {
            return Some(state.clone());
        }
        self.messages
            .iter()
            .any(|m| m.role == ChatRole::Assistant && m.request == Some(request))
            .then_some(TurnState::Answered)
    }

    /// Number of turns still waiting on a reply.
    pub fn pending_turns(&self) -> usize {
        self.turns
            .values()
            .filter(|s| **s == TurnState::Sent)
            .count()
    }

    fn take_ordinal(&mut self) -> u64 {
        let ordinal = self.next_ordinal;
        self.next_ordinal += 1;
        ordinal
    }
}
