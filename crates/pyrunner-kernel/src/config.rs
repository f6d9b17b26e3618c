//! Configuration and credential persistence.
//!
//! `PyrunnerConfig` lives at `$CONFIG_DIR/pyrunner/config.toml`; a missing
//! file means defaults. The user's API key is kept separately by
//! [`CredentialStore`] under the fixed name `api_key` and rehydrated at
//! startup. Nothing else is persisted.

use std::path::{Path, PathBuf};
use std::time::Duration;

use pyrunner_types::Credential;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::invoker::InvokerSettings;
use crate::llm::config::ProviderConfig;

const APP_DIR: &str = "pyrunner";
const CONFIG_FILE: &str = "config.toml";
const CREDENTIALS_FILE: &str = "credentials.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not determine config directory")]
    NoConfigDir,

    #[error("failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

impl ConfigError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        ConfigError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// What to do with a result whose request is no longer the newest of its
/// kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StalePolicy {
    /// Apply every result in completion order. The last to land wins.
    #[default]
    Apply,
    /// Drop results for Annotate, GenerateTests and Suggest whose request
    /// was superseded. Chat replies are always kept.
    DiscardSuperseded,
}

fn default_provider() -> String {
    "anthropic".into()
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PyrunnerConfig {
    /// `anthropic` or `ollama`.
    #[serde(default = "default_provider")]
    pub provider: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default)]
    pub stale_results: StalePolicy,

    /// Deployment key for flows without a user credential.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Environment variable holding the deployment key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
}

impl Default for PyrunnerConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            base_url: None,
            max_tokens: default_max_tokens(),
            temperature: None,
            request_timeout_secs: default_timeout_secs(),
            stale_results: StalePolicy::default(),
            api_key: None,
            api_key_env: None,
        }
    }
}

impl PyrunnerConfig {
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(APP_DIR).join(CONFIG_FILE))
    }

    /// Load from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path().ok_or(ConfigError::NoConfigDir)?;
        Self::load_from(&path)
    }

    /// Load from `path`. A missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::io(path, e))?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::io(parent, e))?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| ConfigError::io(path, e))
    }

    pub fn provider_config(&self) -> ProviderConfig {
        ProviderConfig {
            provider_type: self.provider.clone(),
            api_key: self.api_key.clone(),
            api_key_env: self.api_key_env.clone(),
            base_url: self.base_url.clone(),
            default_model: self.model.clone(),
        }
    }

    /// Deployment key: `api_key`, then `api_key_env`, then the provider's
    /// standard variable.
    pub fn resolve_api_key(&self) -> Option<Credential> {
        self.provider_config()
            .resolve_api_key()
            .map(Credential::new)
            .filter(|c| !c.is_blank())
    }

    pub fn invoker_settings(&self) -> InvokerSettings {
        InvokerSettings {
            model: self.model.clone().unwrap_or_default(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }
}

// ============================================================================
// Credential store
// ============================================================================

#[derive(Serialize, Deserialize, Default)]
struct CredentialFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    api_key: Option<Credential>,
}

/// Persists the user's API key between runs.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(APP_DIR).join(CREDENTIALS_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The stored key, if any. A blank stored key counts as none.
    pub fn load(&self) -> Result<Option<Credential>, ConfigError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content =
            std::fs::read_to_string(&self.path).map_err(|e| ConfigError::io(&self.path, e))?;
        let file: CredentialFile = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: self.path.clone(),
            source,
        })?;
        Ok(file.api_key.filter(|c| !c.is_blank()))
    }

    pub fn save(&self, credential: &Credential) -> Result<(), ConfigError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::io(parent, e))?;
        }
        let file = CredentialFile {
            api_key: Some(credential.clone()),
        };
        let content = toml::to_string(&file)?;
        write_private(&self.path, content.as_bytes())
            .map_err(|e| ConfigError::io(&self.path, e))?;
        tracing::debug!(path = %self.path.display(), "credential saved");
        Ok(())
    }

    /// Forget the stored key. Clearing an empty store is fine.
    pub fn clear(&self) -> Result<(), ConfigError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ConfigError::io(&self.path, e)),
        }
    }
}

/// Write a file readable only by its owner, from creation on.
fn write_private(path: &Path, content: &[u8]) -> std::io::Result<()> {
    use std::io::Write;

    let mut options = std::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
        options.mode(0o600);
        // An existing file keeps its old mode through open, so tighten it too.
        if path.exists() {
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }
    }
    let mut file = options.open(path)?;
    file.write_all(content)
}
