//! LLM provider configuration.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use pyrunner_types::Credential;

use super::{AnthropicProvider, LlmError, LlmProvider, LlmResult, OllamaProvider};

/// Configuration for an LLM provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Provider type identifier ("anthropic" or "ollama").
    pub provider_type: String,

    /// Deployment API key, used by flows that carry no user credential.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Environment variable name for the deployment key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,

    /// Base URL override (for custom endpoints or local providers).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Default model for this provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self::new("anthropic")
    }
}

impl ProviderConfig {
    /// Create a new provider config.
    pub fn new(provider_type: impl Into<String>) -> Self {
        Self {
            provider_type: provider_type.into(),
            api_key: None,
            api_key_env: None,
            base_url: None,
            default_model: None,
        }
    }

    /// Set API key directly.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Set API key from environment variable name.
    pub fn with_api_key_env(mut self, env_var: impl Into<String>) -> Self {
        self.api_key_env = Some(env_var.into());
        self
    }

    /// Set base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set default model.
    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = Some(model.into());
        self
    }

    /// Resolve the deployment key from config or environment.
    pub fn resolve_api_key(&self) -> Option<String> {
        // Direct key takes precedence
        if let Some(key) = &self.api_key {
            return Some(key.clone());
        }

        // Try environment variable
        if let Some(env_var) = &self.api_key_env {
            return std::env::var(env_var).ok();
        }

        // Try standard env var for provider type
        let standard_env = match self.provider_type.as_str() {
            "anthropic" => "ANTHROPIC_API_KEY",
            _ => return None,
        };
        std::env::var(standard_env).ok()
    }

    /// Construct the configured provider.
    pub fn build(&self) -> LlmResult<Arc<dyn LlmProvider>> {
        match self.provider_type.as_str() {
            "anthropic" => {
                let mut provider = match &self.base_url {
                    Some(url) => AnthropicProvider::with_base_url(url.clone()),
                    None => AnthropicProvider::new(),
                }
                .with_fallback_key(self.resolve_api_key().map(Credential::new));
                if let Some(model) = &self.default_model {
                    provider = provider.with_default_model(model.clone());
                }
                Ok(Arc::new(provider))
            }
            "ollama" => {
                let url = self
                    .base_url
                    .as_deref()
                    .unwrap_or(super::ollama::DEFAULT_BASE_URL);
                let mut provider = OllamaProvider::new(url);
                if let Some(model) = &self.default_model {
                    provider = provider.with_default_model(model.clone());
                }
                Ok(Arc::new(provider))
            }
            other => Err(LlmError::Unavailable(format!(
                "unknown provider type: {other}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_config_resolve_key() {
        // SAFETY: Single-threaded test, no other code is reading this env var concurrently
        unsafe {
            std::env::set_var("PYRUNNER_TEST_API_KEY", "test-key-from-env");
        }

        let config = ProviderConfig::new("test").with_api_key_env("PYRUNNER_TEST_API_KEY");
        assert_eq!(config.resolve_api_key(), Some("test-key-from-env".into()));

        // Direct key takes precedence
        let config = config.with_api_key("direct-key");
        assert_eq!(config.resolve_api_key(), Some("direct-key".into()));

        // SAFETY: Single-threaded test cleanup
        unsafe {
            std::env::remove_var("PYRUNNER_TEST_API_KEY");
        }
    }

    #[test]
    fn test_build_known_providers() {
        let anthropic = ProviderConfig::new("anthropic")
            .with_api_key("k")
            .with_default_model("claude-sonnet-4-5")
            .build()
            .unwrap();
        assert_eq!(anthropic.name(), "anthropic");
        assert_eq!(anthropic.default_model(), "claude-sonnet-4-5");

        let ollama = ProviderConfig::new("ollama").build().unwrap();
        assert_eq!(ollama.name(), "ollama");
    }

    #[test]
    fn test_build_unknown_provider() {
        let result = ProviderConfig::new("gemini").build();
        assert!(matches!(result, Err(LlmError::Unavailable(_))));
    }
}
