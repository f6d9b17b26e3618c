//! Flow contracts.
//!
//! Each flow kind is a fixed pair of input and output shapes plus a pure
//! phrasing function that turns the input into backend prompt text.
//!
//! | Kind          | Input                                      | Output field    |
//! |---------------|--------------------------------------------|-----------------|
//! | Annotate      | code, requirements                         | `annotatedCode` |
//! | GenerateTests | code, documentation?                       | `testCases`     |
//! | Chat          | prompt, code, history, credential          | `response`      |
//! | Suggest       | code, credential                           | `suggestion`    |
//!
//! Validation runs before any backend call. A reply that does not parse
//! into the output shape is rejected by [`reply::parse_reply`].

mod annotate;
mod chat;
pub mod reply;
mod suggest;
mod test_cases;

pub use annotate::{AnnotateInput, AnnotateOutput};
pub use chat::{ChatInput, ChatOutput};
pub use suggest::{SuggestInput, SuggestOutput};
pub use test_cases::{GenerateTestsInput, GenerateTestsOutput};

use pyrunner_types::{Credential, FlowKind, RequestId};
use serde::de::DeserializeOwned;

use crate::error::{FieldError, FlowError};
use crate::llm::Message;

/// The output side of a flow contract.
pub trait OutputShape: DeserializeOwned + Send + 'static {
    /// Name of the single JSON string field the backend must return.
    const FIELD: &'static str;
}

/// The input side of a flow contract.
pub trait FlowContract: Send + Sync {
    /// Which flow this input belongs to.
    const KIND: FlowKind;

    /// What a successful reply parses into.
    type Output: OutputShape;

    /// Check required fields. Runs before any backend call.
    fn validate(&self) -> Result<(), FlowError>;

    /// Prompt text for the backend. Pure function of the input.
    fn phrase(&self) -> String;

    /// System prompt: the JSON shape the reply must take.
    fn system(&self) -> String {
        output_instruction(Self::Output::FIELD)
    }

    /// Earlier conversation turns, sent ahead of the phrased prompt.
    fn history(&self) -> Vec<Message> {
        Vec::new()
    }

    /// Per-request credential, for flows that carry one.
    fn credential(&self) -> Option<&Credential> {
        None
    }
}

/// Record an error when a required text field is blank.
pub(crate) fn require(
    errors: &mut Vec<FieldError>,
    field: &'static str,
    value: &str,
    message: &str,
) {
    if value.trim().is_empty() {
        errors.push(FieldError::new(field, message));
    }
}

/// Record an error when a required credential is missing or blank.
pub(crate) fn require_credential(credential: Option<&Credential>) -> Result<(), FlowError> {
    match credential {
        Some(c) if !c.is_blank() => Ok(()),
        _ => Err(FlowError::Precondition(
            "An API key is required. Set one before sending.".into(),
        )),
    }
}

/// Trailing instruction naming the structured output field.
fn output_instruction(field: &str) -> String {
    format!(
        "Respond with only a JSON object of the form {{\"{field}\": \"...\"}} \
         where the value is a string. Do not add any other text."
    )
}

/// Kind-specific request fields.
#[derive(Debug, Clone)]
pub enum FlowPayload {
    Annotate(AnnotateInput),
    GenerateTests(GenerateTestsInput),
    Chat(ChatInput),
    Suggest(SuggestInput),
}

impl FlowPayload {
    pub fn kind(&self) -> FlowKind {
        match self {
            FlowPayload::Annotate(_) => FlowKind::Annotate,
            FlowPayload::GenerateTests(_) => FlowKind::GenerateTests,
            FlowPayload::Chat(_) => FlowKind::Chat,
            FlowPayload::Suggest(_) => FlowKind::Suggest,
        }
    }

    /// Preconditions first, then field validation.
    pub fn validate(&self) -> Result<(), FlowError> {
        match self {
            FlowPayload::Annotate(input) => input.validate(),
            FlowPayload::GenerateTests(input) => input.validate(),
            FlowPayload::Chat(input) => input.validate(),
            FlowPayload::Suggest(input) => input.validate(),
        }
    }
}

impl From<AnnotateInput> for FlowPayload {
    fn from(input: AnnotateInput) -> Self {
        FlowPayload::Annotate(input)
    }
}

impl From<GenerateTestsInput> for FlowPayload {
    fn from(input: GenerateTestsInput) -> Self {
        FlowPayload::GenerateTests(input)
    }
}

impl From<ChatInput> for FlowPayload {
    fn from(input: ChatInput) -> Self {
        FlowPayload::Chat(input)
    }
}

impl From<SuggestInput> for FlowPayload {
    fn from(input: SuggestInput) -> Self {
        FlowPayload::Suggest(input)
    }
}

/// One dispatched request. Immutable once constructed.
#[derive(Debug, Clone)]
pub struct FlowRequest {
    id: RequestId,
    payload: FlowPayload,
    snapshot_revision: u64,
}

impl FlowRequest {
    /// Build a request with a fresh correlation id.
    pub fn new(payload: impl Into<FlowPayload>, snapshot_revision: u64) -> Self {
        Self::with_id(RequestId::new(), payload, snapshot_revision)
    }

    /// Build a request under an id minted earlier, for callers that must
    /// record the id before the payload is complete.
    pub fn with_id(id: RequestId, payload: impl Into<FlowPayload>, snapshot_revision: u64) -> Self {
        Self {
            id,
            payload: payload.into(),
            snapshot_revision,
        }
    }

    pub fn id(&self) -> RequestId {
        self.id
    }

    pub fn kind(&self) -> FlowKind {
        self.payload.kind()
    }

    pub fn payload(&self) -> &FlowPayload {
        &self.payload
    }

    /// Document revision the payload was snapshotted from.
    pub fn snapshot_revision(&self) -> u64 {
        self.snapshot_revision
    }
}

/// A successful, shape-checked flow reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowOutput {
    Annotate(AnnotateOutput),
    GenerateTests(GenerateTestsOutput),
    Chat(ChatOutput),
    Suggest(SuggestOutput),
}

impl FlowOutput {
    pub fn kind(&self) -> FlowKind {
        match self {
            FlowOutput::Annotate(_) => FlowKind::Annotate,
            FlowOutput::GenerateTests(_) => FlowKind::GenerateTests,
            FlowOutput::Chat(_) => FlowKind::Chat,
            FlowOutput::Suggest(_) => FlowKind::Suggest,
        }
    }

    /// The single text value the flow produced.
    pub fn text(&self) -> &str {
        match self {
            FlowOutput::Annotate(o) => &o.annotated_code,
            FlowOutput::GenerateTests(o) => &o.test_cases,
            FlowOutput::Chat(o) => &o.response,
            FlowOutput::Suggest(o) => &o.suggestion,
        }
    }
}

/// Exactly one of these terminates every request.
pub type FlowResult = Result<FlowOutput, FlowError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_blank_is_error() {
        let mut errors = Vec::new();
        require(&mut errors, "code", "   \n", "Code cannot be empty.");
        require(&mut errors, "requirements", "docstrings", "unused");
        assert_eq!(errors, vec![FieldError::new("code", "Code cannot be empty.")]);
    }

    #[test]
    fn test_require_credential() {
        assert!(require_credential(None).is_err());
        assert!(require_credential(Some(&Credential::new(" "))).is_err());
        assert!(require_credential(Some(&Credential::new("k"))).is_ok());
    }

    #[test]
    fn test_request_ids_are_fresh() {
        let a = FlowRequest::new(SuggestInput::new("x", None), 0);
        let b = FlowRequest::new(SuggestInput::new("x", None), 0);
        assert_ne!(a.id(), b.id());
        assert_eq!(a.kind(), FlowKind::Suggest);
    }

    #[test]
    fn test_output_text() {
        let output = FlowOutput::Suggest(SuggestOutput {
            suggestion: "return 1".into(),
        });
        assert_eq!(output.kind(), FlowKind::Suggest);
        assert_eq!(output.text(), "return 1");
    }
}
