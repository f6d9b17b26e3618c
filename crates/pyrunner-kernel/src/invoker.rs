//! Flow invoker: validate, phrase, call the backend once, parse the reply.
//!
//! The invoker holds no mutable state. It never retries; a failed call is
//! reported and the user re-triggers it.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::FlowError;
use crate::flows::reply::parse_reply;
use crate::flows::{FlowContract, FlowOutput, FlowPayload, FlowRequest, FlowResult};
use crate::llm::{CompletionRequest, LlmError, LlmProvider, Message};

/// Per-call backend parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct InvokerSettings {
    /// Model name. Empty means the provider's default.
    pub model: String,
    pub max_tokens: u32,
    pub temperature: Option<f32>,
    /// Deadline for one backend call.
    pub timeout: Duration,
}

impl Default for InvokerSettings {
    fn default() -> Self {
        Self {
            model: String::new(),
            max_tokens: 4096,
            temperature: None,
            timeout: Duration::from_secs(60),
        }
    }
}

/// Runs flow requests against one provider.
#[derive(Clone)]
pub struct FlowInvoker {
    provider: Arc<dyn LlmProvider>,
    settings: InvokerSettings,
}

impl std::fmt::Debug for FlowInvoker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlowInvoker")
            .field("provider", &self.provider.name())
            .field("settings", &self.settings)
            .finish()
    }
}

impl FlowInvoker {
    pub fn new(provider: Arc<dyn LlmProvider>, settings: InvokerSettings) -> Self {
        Self { provider, settings }
    }

    pub fn settings(&self) -> &InvokerSettings {
        &self.settings
    }

    /// Run a dispatched request to its single terminal result.
    pub async fn invoke(&self, request: &FlowRequest) -> FlowResult {
        match request.payload() {
            FlowPayload::Annotate(input) => self.invoke_flow(input).await.map(FlowOutput::Annotate),
            FlowPayload::GenerateTests(input) => {
                self.invoke_flow(input).await.map(FlowOutput::GenerateTests)
            }
            FlowPayload::Chat(input) => self.invoke_flow(input).await.map(FlowOutput::Chat),
            FlowPayload::Suggest(input) => self.invoke_flow(input).await.map(FlowOutput::Suggest),
        }
    }

    /// Run one typed flow.
    pub async fn invoke_flow<C: FlowContract>(&self, input: &C) -> Result<C::Output, FlowError> {
        if let Err(e) = input.validate() {
            debug!(kind = %C::KIND, error = %e, "flow input rejected");
            return Err(e);
        }

        let mut messages = input.history();
        messages.push(Message::user(input.phrase()));
        let mut completion = CompletionRequest::new(self.settings.model.clone(), messages)
            .with_system(input.system())
            .with_max_tokens(self.settings.max_tokens)
            .with_json_output()
            .with_credential(input.credential().cloned());
        if let Some(temperature) = self.settings.temperature {
            completion = completion.with_temperature(temperature);
        }

        debug!(
            kind = %C::KIND,
            provider = self.provider.name(),
            "calling backend"
        );

        let response = match tokio::time::timeout(
            self.settings.timeout,
            self.provider.complete(completion),
        )
        .await
        {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                warn!(kind = %C::KIND, error = %e, "backend call failed");
                return Err(FlowError::Transport(e.to_string()));
            }
            Err(_) => {
                let e = LlmError::Timeout(self.settings.timeout.as_secs());
                warn!(kind = %C::KIND, error = %e, "backend call timed out");
                return Err(FlowError::Transport(e.to_string()));
            }
        };

        debug!(
            kind = %C::KIND,
            model = %response.model,
            tokens = response.usage.total(),
            stop_reason = ?response.stop_reason,
            "backend replied"
        );

        parse_reply::<C::Output>(&response.content).inspect_err(|e| {
            // Raw reply is discarded; only its length is kept for diagnosis.
            warn!(
                kind = %C::KIND,
                error = %e,
                reply_len = response.content.len(),
                "backend reply rejected"
            );
        })
    }
}
