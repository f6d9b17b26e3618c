//! Local Ollama provider (`/api/generate`).

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{CompletionRequest, CompletionResponse, LlmError, LlmProvider, LlmResult, Usage};

/// Default local endpoint.
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Default model to use when none specified.
pub const DEFAULT_MODEL: &str = "llama3.1";

#[derive(Serialize)]
struct OllamaOptions {
    num_predict: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: String,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'static str>,
    options: OllamaOptions,
}

#[derive(Deserialize)]
struct OllamaResponse {
    response: String,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    done_reason: Option<String>,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
}

/// Ollama provider. Local servers take no credential; any attached to the
/// request is ignored.
#[derive(Debug, Clone)]
pub struct OllamaProvider {
    client: Client,
    base_url: String,
    default_model: String,
}

impl OllamaProvider {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            default_model: DEFAULT_MODEL.to_string(),
        }
    }

    /// Set the default model.
    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }

    async fn complete(&self, request: CompletionRequest) -> LlmResult<CompletionResponse> {
        let url = format!("{}/api/generate", self.base_url);
        let model = if request.model.is_empty() {
            self.default_model.as_str()
        } else {
            request.model.as_str()
        };

        let body = OllamaRequest {
            model,
            prompt: request.prompt_text(),
            stream: false,
            system: request.system.as_deref(),
            format: request.json_output.then_some("json"),
            options: OllamaOptions {
                num_predict: request.max_tokens,
                temperature: request.temperature,
            },
        };

        let response = self.client.post(&url).json(&body).send().await?;

        if !response.status().is_success() {
            return Err(LlmError::Unavailable(format!(
                "Ollama request failed with status: {}. Make sure Ollama is running with: ollama serve",
                response.status()
            )));
        }

        let ollama: OllamaResponse = response.json().await?;
        Ok(CompletionResponse {
            content: ollama.response,
            model: ollama.model.unwrap_or_else(|| model.to_string()),
            stop_reason: ollama.done_reason,
            usage: Usage {
                input_tokens: ollama.prompt_eval_count.unwrap_or(0),
                output_tokens: ollama.eval_count.unwrap_or(0),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Message;

    #[test]
    fn test_request_body_shape() {
        let request = CompletionRequest::new("", vec![Message::user("hi")])
            .with_json_output()
            .with_max_tokens(256);
        let body = OllamaRequest {
            model: "llama3.1",
            prompt: request.prompt_text(),
            stream: false,
            system: None,
            format: request.json_output.then_some("json"),
            options: OllamaOptions {
                num_predict: request.max_tokens,
                temperature: None,
            },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["format"], "json");
        assert_eq!(json["stream"], false);
        assert_eq!(json["options"]["num_predict"], 256);
        assert!(json.get("system").is_none());
    }

    #[test]
    fn test_default_model() {
        let provider = OllamaProvider::new("http://localhost:11434/").with_default_model("qwen2.5-coder");
        assert_eq!(provider.default_model(), "qwen2.5-coder");
        assert_eq!(provider.base_url, "http://localhost:11434");
    }
}
