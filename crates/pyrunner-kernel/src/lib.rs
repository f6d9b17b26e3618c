//! # pyrunner-kernel
//!
//! Orchestrates generative-backend flows against one shared document.
//!
//! The coordinator is the fundamental primitive. A coordinator:
//! - Owns the document, the chat session, the suggestion slot and the
//!   latest test listing
//! - Fans each flow request out to its own task and applies results in
//!   completion order
//! - Reports every resolved request on a notification bus
//!
//! Flows never touch shared state themselves; the invoker only phrases,
//! calls and parses.

pub mod chat;
pub mod config;
pub mod coordinator;
pub mod document;
pub mod error;
pub mod flows;
pub mod invoker;
pub mod llm;
pub mod notify;
pub mod segments;
pub mod suggestion;

pub use chat::{ChatSession, TurnState};
pub use config::{ConfigError, CredentialStore, PyrunnerConfig, StalePolicy};
pub use coordinator::{Completion, Coordinator, PendingOperation, Resolution};
pub use document::{Document, Snapshot};
pub use error::{FieldError, FlowError};
pub use flows::reply::parse_reply;
pub use flows::{
    AnnotateInput, AnnotateOutput, ChatInput, ChatOutput, FlowContract, FlowOutput, FlowPayload,
    FlowRequest, FlowResult, GenerateTestsInput, GenerateTestsOutput, OutputShape, SuggestInput,
    SuggestOutput,
};
pub use invoker::{FlowInvoker, InvokerSettings};
pub use llm::{
    AnthropicProvider, CompletionRequest, CompletionResponse, Gate, LlmError, LlmProvider,
    LlmResult, Message as LlmMessage, OllamaProvider, Role as LlmRole,
    ScriptedProvider, Usage as LlmUsage,
};
pub use notify::{Level, Notification, NotificationBus, Subscription, matches_pattern};
pub use segments::{CodeSnippet, Segment, parse_segments};
pub use suggestion::{SlotState, Suggestion, SuggestionSlot};
