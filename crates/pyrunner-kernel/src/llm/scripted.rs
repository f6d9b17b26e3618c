//! Deterministic in-process provider for tests and offline demos.
//!
//! Replies are scripted against prompt substrings. Each scripted entry is
//! consumed by the first call whose prompt contains its needle; entries are
//! tried in the order they were added. A [`Gate`] holds a call open until
//! the test releases it, which is how tests force out-of-order completion.

use async_trait::async_trait;
use parking_lot::Mutex;
use pyrunner_types::Credential;
use tokio::sync::oneshot;

use super::{CompletionRequest, CompletionResponse, LlmError, LlmProvider, LlmResult, Message};

enum Action {
    Reply(String),
    Fail(LlmError),
    Gated(oneshot::Receiver<LlmResult<String>>),
}

struct Rule {
    needle: String,
    action: Action,
}

/// What the provider saw on one call.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    /// Prompt text of the request, as a single-prompt backend would see it.
    pub prompt: String,
    /// System prompt, if any.
    pub system: Option<String>,
    /// The messages as sent.
    pub messages: Vec<Message>,
    /// Credential attached to the request, if any.
    pub credential: Option<Credential>,
    /// Whether JSON output was requested.
    pub json_output: bool,
}

/// Releases a gated call.
#[derive(Debug)]
pub struct Gate {
    tx: oneshot::Sender<LlmResult<String>>,
}

impl Gate {
    /// Complete the held call with a reply.
    pub fn release(self, reply: impl Into<String>) {
        let _ = self.tx.send(Ok(reply.into()));
    }

    /// Complete the held call with an error.
    pub fn fail(self, error: LlmError) {
        let _ = self.tx.send(Err(error));
    }
}

/// Scripted provider. See the module docs.
#[derive(Default)]
pub struct ScriptedProvider {
    rules: Mutex<Vec<Rule>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl std::fmt::Debug for ScriptedProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedProvider")
            .field("pending_rules", &self.rules.lock().len())
            .field("calls", &self.calls.lock().len())
            .finish()
    }
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// A JSON object holding one string field, the shape every flow expects.
    pub fn json(field: &str, value: &str) -> String {
        serde_json::json!({ field: value }).to_string()
    }

    /// Reply with `reply` to the next prompt containing `needle`.
    pub fn on(&self, needle: impl Into<String>, reply: impl Into<String>) -> &Self {
        self.push(needle.into(), Action::Reply(reply.into()))
    }

    /// Fail the next prompt containing `needle`.
    pub fn on_error(&self, needle: impl Into<String>, error: LlmError) -> &Self {
        self.push(needle.into(), Action::Fail(error))
    }

    /// Hold the next prompt containing `needle` until the gate is released.
    pub fn gate(&self, needle: impl Into<String>) -> Gate {
        let (tx, rx) = oneshot::channel();
        self.push(needle.into(), Action::Gated(rx));
        Gate { tx }
    }

    /// Every call seen so far, in arrival order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    /// Number of calls seen so far.
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    fn push(&self, needle: String, action: Action) -> &Self {
        self.rules.lock().push(Rule { needle, action });
        self
    }

    fn take_action(&self, prompt: &str) -> Option<Action> {
        let mut rules = self.rules.lock();
        let idx = rules.iter().position(|r| prompt.contains(&r.needle))?;
        Some(rules.remove(idx).action)
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn default_model(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: CompletionRequest) -> LlmResult<CompletionResponse> {
        let prompt = request.prompt_text();
        self.calls.lock().push(RecordedCall {
            prompt: prompt.clone(),
            system: request.system.clone(),
            messages: request.messages.clone(),
            credential: request.credential.clone(),
            json_output: request.json_output,
        });

        // Lock is released before awaiting a gate.
        let action = self.take_action(&prompt);
        let content = match action {
            Some(Action::Reply(text)) => text,
            Some(Action::Fail(error)) => return Err(error),
            Some(Action::Gated(rx)) => rx
                .await
                .map_err(|_| LlmError::NetworkError("gate dropped".into()))??,
            None => {
                return Err(LlmError::Unavailable(
                    "no scripted reply for prompt".into(),
                ))
            }
        };

        Ok(CompletionResponse::text("scripted", content))
    }
}
