//! Task coordinator.
//!
//! Owns the document, the chat session, the suggestion slot and the test
//! listing. Each dispatched flow runs as its own tokio task; its result
//! comes back over an mpsc channel and is applied here, on the caller's
//! task, through `&mut self`. That keeps every write to shared state in one
//! place and needs no locks.
//!
//! ```text
//!  annotate / generate_tests / send_chat / request_suggestion
//!        │  validate, snapshot, register PendingOperation
//!        ▼
//!  tokio::spawn(invoker.invoke(request)) ──▶ Completion ──▶ mpsc
//!                                                            │
//!  next_completion / drain_ready ◀───────────────────────────┘
//!        │  remove PendingOperation, apply by kind, notify
//!        ▼
//!  Resolution
//! ```

use std::collections::HashMap;
use std::time::Instant;

use pyrunner_types::{ChatRole, Credential, FlowKind, RequestId};
use tokio::sync::mpsc;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::chat::ChatSession;
use crate::config::StalePolicy;
use crate::document::Document;
use crate::error::FlowError;
use crate::flows::{
    AnnotateInput, ChatInput, FlowContract, FlowOutput, FlowRequest, FlowResult,
    GenerateTestsInput, SuggestInput,
};
use crate::invoker::FlowInvoker;
use crate::notify::{Notification, NotificationBus};
use crate::segments::{CodeSnippet, Segment, code_snippets, parse_segments};
use crate::suggestion::{Suggestion, SuggestionSlot};

/// An operation between dispatch and result arrival.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingOperation {
    pub id: RequestId,
    pub kind: FlowKind,
    pub started_at: Instant,
    /// Document revision the request was built from.
    pub snapshot_revision: u64,
}

/// A finished invocation on its way back to the coordinator.
#[derive(Debug, Clone)]
pub struct Completion {
    pub request: RequestId,
    pub kind: FlowKind,
    pub snapshot_revision: u64,
    pub result: FlowResult,
}

/// What applying a completion did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Success, effect applied.
    Applied { request: RequestId, kind: FlowKind },
    /// Failure, reported.
    Failed {
        request: RequestId,
        kind: FlowKind,
        error: FlowError,
    },
    /// Superseded by a newer request of the same kind and dropped.
    Discarded { request: RequestId, kind: FlowKind },
    /// No pending operation had this id.
    Unknown(RequestId),
}

impl Resolution {
    pub fn request(&self) -> RequestId {
        match self {
            Resolution::Applied { request, .. }
            | Resolution::Failed { request, .. }
            | Resolution::Discarded { request, .. }
            | Resolution::Unknown(request) => *request,
        }
    }
}

fn success_message(kind: FlowKind) -> &'static str {
    match kind {
        FlowKind::Annotate => "Comments generated and added to the code.",
        FlowKind::GenerateTests => "Test cases generated successfully.",
        FlowKind::Chat => "Reply received.",
        FlowKind::Suggest => "Suggestion ready. Accept or reject it.",
    }
}

fn failure_title(kind: FlowKind, error: &FlowError) -> &'static str {
    if matches!(error, FlowError::Precondition(_)) {
        return "API Key Required";
    }
    match kind {
        FlowKind::Annotate => "Error Generating Comments",
        FlowKind::GenerateTests => "Error Generating Test Cases",
        FlowKind::Chat => "Error Sending Message",
        FlowKind::Suggest => "Error Generating Suggestion",
    }
}

/// Fans flows out to background tasks and applies their results.
pub struct Coordinator {
    invoker: FlowInvoker,
    policy: StalePolicy,
    document: Document,
    chat: ChatSession,
    suggestion: SuggestionSlot,
    test_listing: Option<String>,
    pending: HashMap<RequestId, PendingOperation>,
    latest: HashMap<FlowKind, RequestId>,
    notifications: NotificationBus,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions_rx: mpsc::UnboundedReceiver<Completion>,
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("invoker", &self.invoker)
            .field("policy", &self.policy)
            .field("revision", &self.document.revision())
            .field("pending", &self.pending.len())
            .finish_non_exhaustive()
    }
}

impl Coordinator {
    pub fn new(invoker: FlowInvoker, policy: StalePolicy) -> Self {
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        Self {
            invoker,
            policy,
            document: Document::default(),
            chat: ChatSession::new(),
            suggestion: SuggestionSlot::new(),
            test_listing: None,
            pending: HashMap::new(),
            latest: HashMap::new(),
            notifications: NotificationBus::default(),
            completions_tx,
            completions_rx,
        }
    }

    /// Start from existing document text.
    pub fn with_document(mut self, text: impl Into<String>) -> Self {
        self.document = Document::new(text);
        self
    }

    // ========================================================================
    // Document
    // ========================================================================

    pub fn document(&self) -> &Document {
        &self.document
    }

    /// User edit. Always allowed, even with flows in flight.
    pub fn edit_document(&mut self, text: impl Into<String>) {
        self.document.set_text(text);
    }

    pub fn clear_document(&mut self) {
        self.document.clear();
    }

    /// Append a code snippet from a chat reply on its own line.
    pub fn insert_snippet(&mut self, snippet: &CodeSnippet) {
        self.document.insert_snippet(&snippet.code);
        debug!(revision = self.document.revision(), "snippet inserted");
    }

    /// Text to put on the clipboard. No state changes.
    pub fn copy_snippet(snippet: &CodeSnippet) -> String {
        snippet.copy_text().to_string()
    }

    /// Code snippets of the most recent assistant reply, in order.
    pub fn latest_reply_snippets(&self) -> Vec<CodeSnippet> {
        let Some(reply) = self
            .chat
            .messages()
            .iter()
            .rev()
            .find(|m| m.role == ChatRole::Assistant)
        else {
            return Vec::new();
        };
        let segments: Vec<Segment> = parse_segments(&reply.content);
        code_snippets(&segments).into_iter().cloned().collect()
    }

    // ========================================================================
    // Dispatch
    // ========================================================================

    /// Annotate the current document. The result replaces it verbatim.
    pub fn annotate(&mut self, requirements: impl Into<String>) -> Result<RequestId, FlowError> {
        let snapshot = self.document.snapshot();
        let input = AnnotateInput::new(snapshot.text, requirements);
        self.check(&input)?;
        Ok(self.dispatch(FlowRequest::new(input, snapshot.revision)))
    }

    /// Generate a test listing for the current document.
    pub fn generate_tests(&mut self, documentation: Option<String>) -> Result<RequestId, FlowError> {
        let snapshot = self.document.snapshot();
        let input = GenerateTestsInput::new(snapshot.text, documentation);
        self.check(&input)?;
        Ok(self.dispatch(FlowRequest::new(input, snapshot.revision)))
    }

    /// Send one chat turn. The user message is echoed before dispatch.
    pub fn send_chat(
        &mut self,
        text: impl Into<String>,
        credential: Option<Credential>,
    ) -> Result<RequestId, FlowError> {
        let text = text.into();
        let snapshot = self.document.snapshot();
        let mut input = ChatInput::new(text.clone(), snapshot.text, Vec::new(), credential);
        self.check(&input)?;

        let id = RequestId::new();
        input.history = self.chat.push_user(text, id);
        Ok(self.dispatch(FlowRequest::with_id(id, input, snapshot.revision)))
    }

    pub fn set_chat_draft(&mut self, text: impl Into<String>) {
        self.chat.set_draft(text);
    }

    /// Send the draft. On rejection the draft is kept for editing.
    pub fn submit_chat_draft(
        &mut self,
        credential: Option<Credential>,
    ) -> Result<RequestId, FlowError> {
        let draft = self.chat.take_draft();
        self.send_chat(draft.clone(), credential).inspect_err(|_| {
            self.chat.set_draft(draft);
        })
    }

    /// Ask for a continuation. A proposed suggestion is discarded.
    pub fn request_suggestion(
        &mut self,
        credential: Option<Credential>,
    ) -> Result<RequestId, FlowError> {
        let snapshot = self.document.snapshot();
        let input = SuggestInput::new(snapshot.text, credential);
        self.check(&input)?;
        let request = FlowRequest::new(input, snapshot.revision);
        self.suggestion.begin(request.id());
        Ok(self.dispatch(request))
    }

    /// Append the proposed suggestion to the document.
    pub fn accept_suggestion(&mut self) -> Option<Suggestion> {
        let suggestion = self.suggestion.accept()?;
        self.document.append(&suggestion.text);
        info!(origin = %suggestion.origin.short(), "suggestion accepted");
        Some(suggestion)
    }

    /// Drop the proposed suggestion. A second reject is a no-op.
    pub fn reject_suggestion(&mut self) -> Option<Suggestion> {
        let suggestion = self.suggestion.reject()?;
        debug!(origin = %suggestion.origin.short(), "suggestion rejected");
        Some(suggestion)
    }

    /// Local validation. A rejected input is reported and never dispatched.
    fn check<C: FlowContract>(&self, input: &C) -> Result<(), FlowError> {
        input.validate().inspect_err(|error| {
            info!(kind = %C::KIND, %error, "request rejected before dispatch");
            self.notifications.publish(Notification::failure(
                C::KIND,
                None,
                failure_title(C::KIND, error),
                error.user_message(),
            ));
        })
    }

    fn dispatch(&mut self, request: FlowRequest) -> RequestId {
        let id = request.id();
        let kind = request.kind();
        let snapshot_revision = request.snapshot_revision();

        self.pending.insert(
            id,
            PendingOperation {
                id,
                kind,
                started_at: Instant::now(),
                snapshot_revision,
            },
        );
        self.latest.insert(kind, id);

        let invoker = self.invoker.clone();
        let tx = self.completions_tx.clone();
        let span = info_span!("flow", request = %id.short(), %kind);
        tokio::spawn(
            async move {
                let result = invoker.invoke(&request).await;
                let completion = Completion {
                    request: id,
                    kind,
                    snapshot_revision,
                    result,
                };
                if tx.send(completion).is_err() {
                    debug!("coordinator gone, dropping completion");
                }
            }
            .instrument(span),
        );

        info!(request = %id.short(), %kind, revision = snapshot_revision, "flow dispatched");
        id
    }

    // ========================================================================
    // Completion
    // ========================================================================

    /// Wait for the next completion and apply it.
    ///
    /// Returns `None` immediately when nothing is pending.
    pub async fn next_completion(&mut self) -> Option<Resolution> {
        if self.pending.is_empty() {
            return None;
        }
        let completion = self.completions_rx.recv().await?;
        Some(self.apply_completion(completion))
    }

    /// Apply every completion that has already arrived, without waiting.
    pub fn drain_ready(&mut self) -> Vec<Resolution> {
        let mut resolutions = Vec::new();
        while let Ok(completion) = self.completions_rx.try_recv() {
            resolutions.push(self.apply_completion(completion));
        }
        resolutions
    }

    /// Wait until every pending operation has resolved.
    pub async fn settle(&mut self) -> Vec<Resolution> {
        let mut resolutions = Vec::new();
        while let Some(resolution) = self.next_completion().await {
            resolutions.push(resolution);
        }
        resolutions
    }

    /// Apply one completion by kind. The pending entry is removed whatever
    /// the outcome.
    pub fn apply_completion(&mut self, completion: Completion) -> Resolution {
        let Completion {
            request,
            kind,
            snapshot_revision,
            result,
        } = completion;

        if self.pending.remove(&request).is_none() {
            warn!(request = %request.short(), %kind, "completion for unknown request");
            return Resolution::Unknown(request);
        }

        if self.is_superseded(kind, request) {
            debug!(request = %request.short(), %kind, "superseded result discarded");
            if kind == FlowKind::Suggest {
                self.suggestion.discard(request);
            }
            return Resolution::Discarded { request, kind };
        }

        match result {
            Ok(output) => {
                self.apply_output(request, snapshot_revision, output);
                self.notifications.publish(Notification::success(
                    kind,
                    Some(request),
                    "Success",
                    success_message(kind),
                ));
                info!(request = %request.short(), %kind, "flow applied");
                Resolution::Applied { request, kind }
            }
            Err(error) => {
                warn!(request = %request.short(), %kind, %error, "flow failed");
                self.apply_failure(request, kind, &error);
                self.notifications.publish(Notification::failure(
                    kind,
                    Some(request),
                    failure_title(kind, &error),
                    error.user_message(),
                ));
                Resolution::Failed {
                    request,
                    kind,
                    error,
                }
            }
        }
    }

    fn is_superseded(&self, kind: FlowKind, request: RequestId) -> bool {
        self.policy == StalePolicy::DiscardSuperseded
            && kind.is_slot()
            && self.latest.get(&kind) != Some(&request)
    }

    fn apply_output(&mut self, request: RequestId, snapshot_revision: u64, output: FlowOutput) {
        match output {
            FlowOutput::Annotate(out) => {
                if self.document.revision() != snapshot_revision {
                    warn!(
                        request = %request.short(),
                        dispatched_at = snapshot_revision,
                        current = self.document.revision(),
                        "document edited since dispatch, replacing with annotated text"
                    );
                }
                self.document.replace(out.annotated_code);
            }
            FlowOutput::GenerateTests(out) => {
                self.test_listing = Some(out.test_cases);
            }
            FlowOutput::Chat(out) => {
                if !self.chat.record_answer(request, out.response) {
                    warn!(request = %request.short(), "reply for a turn that is not outstanding");
                }
            }
            FlowOutput::Suggest(out) => {
                self.suggestion.resolve(request, out.suggestion);
            }
        }
    }

    fn apply_failure(&mut self, request: RequestId, kind: FlowKind, error: &FlowError) {
        match kind {
            FlowKind::Annotate | FlowKind::GenerateTests => {}
            FlowKind::Chat => {
                self.chat.record_failure(request, error.user_message());
            }
            FlowKind::Suggest => self.suggestion.fail(request),
        }
    }

    // ========================================================================
    // Inspection
    // ========================================================================

    /// Outstanding operations, oldest first.
    pub fn pending(&self) -> Vec<&PendingOperation> {
        let mut ops: Vec<_> = self.pending.values().collect();
        ops.sort_by_key(|op| (op.started_at, op.id));
        ops
    }

    pub fn is_pending(&self, request: RequestId) -> bool {
        self.pending.contains_key(&request)
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Most recently dispatched request of a kind.
    pub fn latest_request(&self, kind: FlowKind) -> Option<RequestId> {
        self.latest.get(&kind).copied()
    }

    pub fn chat(&self) -> &ChatSession {
        &self.chat
    }

    pub fn suggestion(&self) -> &SuggestionSlot {
        &self.suggestion
    }

    pub fn test_listing(&self) -> Option<&str> {
        self.test_listing.as_deref()
    }

    pub fn notifications(&self) -> &NotificationBus {
        &self.notifications
    }
}
