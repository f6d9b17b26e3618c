//! Anthropic Messages API provider.

use async_trait::async_trait;
use pyrunner_types::Credential;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use super::{CompletionRequest, CompletionResponse, LlmError, LlmProvider, LlmResult, Usage};

/// Default model to use when none specified.
pub const DEFAULT_MODEL: &str = "claude-haiku-4-5-20251001";

/// Public API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

const API_VERSION: &str = "2023-06-01";

#[derive(Serialize)]
struct ApiMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<ApiMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Deserialize)]
struct ApiContent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize, Default)]
struct ApiUsage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

#[derive(Deserialize)]
struct ApiResponse {
    content: Vec<ApiContent>,
    model: String,
    #[serde(default)]
    stop_reason: Option<String>,
    #[serde(default)]
    usage: ApiUsage,
}

/// Anthropic Claude provider.
///
/// The key comes from the request's credential when present, otherwise from
/// the provider's fallback key (the deployment key used by flows that do
/// not carry a user credential).
pub struct AnthropicProvider {
    client: Client,
    base_url: String,
    default_model: String,
    fallback_key: Option<Credential>,
}

impl std::fmt::Debug for AnthropicProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicProvider")
            .field("base_url", &self.base_url)
            .field("default_model", &self.default_model)
            .field("fallback_key", &self.fallback_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl AnthropicProvider {
    /// Create a provider against the public endpoint with no fallback key.
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Create a provider against a custom endpoint.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            default_model: DEFAULT_MODEL.to_string(),
            fallback_key: None,
        }
    }

    /// Key used when a request carries no credential of its own.
    pub fn with_fallback_key(mut self, key: Option<Credential>) -> Self {
        self.fallback_key = key.filter(|k| !k.is_blank());
        self
    }

    /// Set the default model.
    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    fn resolve_key<'a>(&'a self, request: &'a CompletionRequest) -> LlmResult<&'a str> {
        request
            .credential
            .as_ref()
            .filter(|c| !c.is_blank())
            .or(self.fallback_key.as_ref())
            .map(|c| c.expose())
            .ok_or_else(|| LlmError::AuthError("no API key for anthropic".into()))
    }
}

impl Default for AnthropicProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }

    async fn complete(&self, request: CompletionRequest) -> LlmResult<CompletionResponse> {
        let key = self.resolve_key(&request)?;
        let model = if request.model.is_empty() {
            self.default_model.as_str()
        } else {
            request.model.as_str()
        };

        let body = ApiRequest {
            model,
            max_tokens: request.max_tokens,
            messages: request
                .messages
                .iter()
                .map(|m| ApiMessage {
                    role: m.role.as_str(),
                    content: &m.content,
                })
                .collect(),
            system: request.system.as_deref(),
            temperature: request.temperature,
        };

        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => LlmError::AuthError(text),
                StatusCode::TOO_MANY_REQUESTS => LlmError::RateLimited(text),
                StatusCode::BAD_REQUEST => LlmError::InvalidRequest(text),
                _ => LlmError::ApiError(format!("Anthropic API error {status}: {text}")),
            });
        }

        let api: ApiResponse = response.json().await?;
        let content = api
            .content
            .iter()
            .filter(|c| c.kind == "text")
            .filter_map(|c| c.text.as_deref())
            .collect::<Vec<_>>()
            .join("");

        Ok(CompletionResponse {
            content,
            model: api.model,
            stop_reason: api.stop_reason,
            usage: Usage {
                input_tokens: api.usage.input_tokens,
                output_tokens: api.usage.output_tokens,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Message;

    #[test]
    fn test_request_credential_wins_over_fallback() {
        let provider =
            AnthropicProvider::new().with_fallback_key(Some(Credential::new("deployment")));
        let request = CompletionRequest::new("m", vec![Message::user("x")])
            .with_credential(Some(Credential::new("user-key")));
        assert_eq!(provider.resolve_key(&request).unwrap(), "user-key");

        let anonymous = CompletionRequest::new("m", vec![Message::user("x")]);
        assert_eq!(provider.resolve_key(&anonymous).unwrap(), "deployment");
    }

    #[test]
    fn test_missing_key_is_auth_error() {
        let provider = AnthropicProvider::new().with_fallback_key(Some(Credential::new("  ")));
        let request = CompletionRequest::new("m", vec![Message::user("x")]);
        assert!(matches!(
            provider.resolve_key(&request),
            Err(LlmError::AuthError(_))
        ));
    }

    #[test]
    fn test_debug_redacts_key() {
        let provider = AnthropicProvider::new().with_fallback_key(Some(Credential::new("sk-abc")));
        let shown = format!("{:?}", provider);
        assert!(!shown.contains("sk-abc"));
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let provider = AnthropicProvider::with_base_url("http://localhost:8080/");
        assert_eq!(provider.base_url, "http://localhost:8080");
    }
}
