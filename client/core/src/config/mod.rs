//! TOML Configuration File Support
//!
//! Centralized configuration loading for the client, supporting a TOML file at
//! `~/.config/ragchat/client.toml`.
//!
//! # Configuration Priority
//!
//! Values are loaded with the following priority (highest first):
//! 1. CLI arguments (via [`ConfigOverrides`])
//! 2. Environment variables (`RAGCHAT_*`)
//! 3. TOML configuration file
//! 4. Default values
//!
//! # Example Configuration
//!
//! ```toml
//! [server]
//! base_url = "http://localhost:8000"
//! stream_path = "/api/v1/chat/stream"
//! refresh_path = "/api/v1/auth/refresh"
//! connect_timeout_ms = 10000
//!
//! [auth]
//! renewal_buffer_secs = 300
//!
//! [chat]
//! provider = "ollama"
//! model = "llama3.2:1b"
//! rag_enabled = true
//! document_ids = []
//!
//! [rag]
//! similarity_threshold = 0.3
//! max_chunks = 10
//! search_method = "hybrid"
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::request::RagSettings;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur when loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file at {path}: {source}")]
    ReadError {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse TOML config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Tracks where the effective configuration came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Value from command-line argument
    Cli,
    /// Value from environment variable
    Env,
    /// Value from TOML configuration file
    File,
    /// Default value
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI"),
            Self::Env => write!(f, "environment"),
            Self::File => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

// =============================================================================
// TOML Configuration Structures
// =============================================================================

/// `[server]` section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerToml {
    /// Base URL of the answer service
    pub base_url: Option<String>,
    /// Path of the streaming chat endpoint
    pub stream_path: Option<String>,
    /// Path of the credential renewal endpoint
    pub refresh_path: Option<String>,
    /// Connect timeout in milliseconds
    pub connect_timeout_ms: Option<u64>,
}

/// `[auth]` section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthToml {
    /// Seconds before expiry at which a credential stops being usable
    pub renewal_buffer_secs: Option<u64>,
}

/// `[chat]` section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatToml {
    /// LLM provider
    pub provider: Option<String>,
    /// Model name
    pub model: Option<String>,
    /// Whether retrieval is enabled
    pub rag_enabled: Option<bool>,
    /// Document scope
    pub document_ids: Option<Vec<String>>,
    /// Expert persona
    pub expert: Option<String>,
}

/// Top-level TOML configuration structure
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientToml {
    /// Server section
    pub server: ServerToml,
    /// Auth section
    pub auth: AuthToml,
    /// Chat section
    pub chat: ChatToml,
    /// Retrieval tuning; absent means server defaults
    pub rag: Option<RagSettings>,
}

// =============================================================================
// Effective Configuration
// =============================================================================

/// Answer service endpoints
#[derive(Clone, Debug, PartialEq)]
pub struct ServerConfig {
    /// Base URL, without trailing slash
    pub base_url: String,
    /// Streaming chat endpoint path
    pub stream_path: String,
    /// Credential renewal endpoint path
    pub refresh_path: String,
    /// Connect timeout for HTTP requests
    ///
    /// There is deliberately no read timeout: a stalled stream is ended only
    /// by cancellation or by the connection closing.
    pub connect_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            stream_path: "/api/v1/chat/stream".to_string(),
            refresh_path: "/api/v1/auth/refresh".to_string(),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl ServerConfig {
    /// Full URL of the streaming endpoint
    #[must_use]
    pub fn stream_url(&self) -> String {
        format!("{}{}", self.base_url, self.stream_path)
    }

    /// Full URL of the renewal endpoint
    #[must_use]
    pub fn refresh_url(&self) -> String {
        format!("{}{}", self.base_url, self.refresh_path)
    }

    /// Full URL of a conversation's message history
    #[must_use]
    pub fn history_url(&self, conversation_id: &str) -> String {
        format!(
            "{}/api/v1/chat/conversations/{conversation_id}/messages",
            self.base_url
        )
    }
}

/// Defaults applied to every submitted message
#[derive(Clone, Debug, PartialEq)]
pub struct ChatDefaults {
    /// LLM provider
    pub provider: String,
    /// Model name (server default when `None`)
    pub model: Option<String>,
    /// Whether retrieval is enabled
    pub rag_enabled: bool,
    /// Retrieval tuning
    pub rag_settings: Option<RagSettings>,
    /// Document scope (empty = all documents)
    pub document_ids: Vec<String>,
    /// Expert persona
    pub expert: Option<String>,
}

impl Default for ChatDefaults {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            model: None,
            rag_enabled: true,
            rag_settings: None,
            document_ids: Vec::new(),
            expert: None,
        }
    }
}

/// Fully resolved client configuration
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Endpoints
    pub server: ServerConfig,
    /// Credential renewal buffer
    pub renewal_buffer: Duration,
    /// Per-message defaults
    pub chat: ChatDefaults,
    /// Path to the config file that was loaded (if any)
    pub config_file_path: Option<PathBuf>,
    source: ConfigSource,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            renewal_buffer: Duration::from_secs(300),
            chat: ChatDefaults::default(),
            config_file_path: None,
            source: ConfigSource::Default,
        }
    }
}

impl ClientConfig {
    /// Get the primary source of this configuration
    #[must_use]
    pub fn source(&self) -> ConfigSource {
        self.source
    }

    /// Validate cross-field constraints
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] for malformed URLs or
    /// out-of-range retrieval settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.server.base_url.starts_with("http://")
            && !self.server.base_url.starts_with("https://")
        {
            return Err(ConfigError::ValidationError(format!(
                "base_url must start with http:// or https:// (got {})",
                self.server.base_url
            )));
        }
        if let Some(ref rag) = self.chat.rag_settings {
            rag.validate().map_err(ConfigError::ValidationError)?;
        }
        Ok(())
    }
}

// =============================================================================
// Configuration Loading
// =============================================================================

/// Get the default configuration file path
///
/// Returns `$XDG_CONFIG_HOME/ragchat/client.toml` or
/// `~/.config/ragchat/client.toml` if `XDG_CONFIG_HOME` is not set.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("ragchat").join("client.toml"))
}

/// Load configuration from the default path, the environment and defaults
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be parsed, or if the
/// result fails validation. A missing file is not an error.
pub fn load_config() -> Result<ClientConfig, ConfigError> {
    load_config_from_path(default_config_path())
}

/// Load configuration from a specific path
///
/// # Errors
///
/// Returns an error if the specified config file cannot be read or parsed, or
/// if the result fails validation.
pub fn load_config_from_path(path: Option<PathBuf>) -> Result<ClientConfig, ConfigError> {
    load_config_with_env(path, |key| std::env::var(key).ok())
}

/// Load configuration with an explicit environment lookup
///
/// # Errors
///
/// Same as [`load_config_from_path`].
pub fn load_config_with_env<F>(path: Option<PathBuf>, env: F) -> Result<ClientConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = ClientConfig::default();

    if let Some(ref config_path) = path {
        if config_path.exists() {
            let toml_content =
                std::fs::read_to_string(config_path).map_err(|e| ConfigError::ReadError {
                    path: config_path.clone(),
                    source: e,
                })?;

            let toml_config: ClientToml = toml::from_str(&toml_content)?;
            apply_toml_config(&mut config, toml_config);
            config.config_file_path = Some(config_path.clone());
            config.source = ConfigSource::File;

            tracing::info!(
                path = %config_path.display(),
                "Loaded configuration from file"
            );
        } else {
            tracing::debug!(
                path = %config_path.display(),
                "Config file not found, using defaults"
            );
        }
    }

    apply_env_config(&mut config, env);
    config.validate()?;

    Ok(config)
}

fn apply_toml_config(config: &mut ClientConfig, toml: ClientToml) {
    if let Some(url) = toml.server.base_url {
        config.server.base_url = url.trim_end_matches('/').to_string();
    }
    if let Some(path) = toml.server.stream_path {
        config.server.stream_path = path;
    }
    if let Some(path) = toml.server.refresh_path {
        config.server.refresh_path = path;
    }
    if let Some(ms) = toml.server.connect_timeout_ms {
        config.server.connect_timeout = Duration::from_millis(ms);
    }

    if let Some(secs) = toml.auth.renewal_buffer_secs {
        config.renewal_buffer = Duration::from_secs(secs);
    }

    if let Some(provider) = toml.chat.provider {
        config.chat.provider = provider;
    }
    if toml.chat.model.is_some() {
        config.chat.model = toml.chat.model;
    }
    if let Some(enabled) = toml.chat.rag_enabled {
        config.chat.rag_enabled = enabled;
    }
    if let Some(ids) = toml.chat.document_ids {
        config.chat.document_ids = ids;
    }
    if toml.chat.expert.is_some() {
        config.chat.expert = toml.chat.expert;
    }
    if toml.rag.is_some() {
        config.chat.rag_settings = toml.rag;
    }
}

fn apply_env_config<F>(config: &mut ClientConfig, env: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = env("RAGCHAT_BASE_URL") {
        config.server.base_url = url.trim_end_matches('/').to_string();
        config.source = ConfigSource::Env;
    }
    if let Some(provider) = env("RAGCHAT_PROVIDER") {
        config.chat.provider = provider;
        config.source = ConfigSource::Env;
    }
    if let Some(model) = env("RAGCHAT_MODEL") {
        config.chat.model = Some(model);
        config.source = ConfigSource::Env;
    }
    if let Some(enabled) = env("RAGCHAT_RAG") {
        config.chat.rag_enabled = enabled != "0" && enabled.to_lowercase() != "false";
        config.source = ConfigSource::Env;
    }
    if let Some(buffer) = env("RAGCHAT_RENEWAL_BUFFER_SECS") {
        if let Ok(secs) = buffer.parse::<u64>() {
            config.renewal_buffer = Duration::from_secs(secs);
            config.source = ConfigSource::Env;
        }
    }
}

// =============================================================================
// CLI Override Support
// =============================================================================

/// Builder for applying CLI overrides to configuration
///
/// Use this after [`load_config`] to apply command-line argument overrides.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    /// Base URL override
    pub base_url: Option<String>,
    /// Provider override
    pub provider: Option<String>,
    /// Model override
    pub model: Option<String>,
    /// Disable retrieval
    pub disable_rag: bool,
    /// Document scope override (replaces configured scope when non-empty)
    pub document_ids: Vec<String>,
}

impl ConfigOverrides {
    /// Create a new empty set of overrides
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set base URL override
    #[must_use]
    pub fn with_base_url(mut self, url: String) -> Self {
        self.base_url = Some(url);
        self
    }

    /// Set model override
    #[must_use]
    pub fn with_model(mut self, model: String) -> Self {
        self.model = Some(model);
        self
    }

    /// Set provider override
    #[must_use]
    pub fn with_provider(mut self, provider: String) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Apply overrides to a configuration
    ///
    /// # Errors
    ///
    /// Returns a validation error if the overridden configuration is invalid.
    pub fn apply(&self, config: &mut ClientConfig) -> Result<(), ConfigError> {
        if self.base_url.is_some()
            || self.provider.is_some()
            || self.model.is_some()
            || self.disable_rag
            || !self.document_ids.is_empty()
        {
            config.source = ConfigSource::Cli;
        }

        if let Some(ref url) = self.base_url {
            config.server.base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(ref provider) = self.provider {
            config.chat.provider = provider.clone();
        }
        if let Some(ref model) = self.model {
            config.chat.model = Some(model.clone());
        }
        if self.disable_rag {
            config.chat.rag_enabled = false;
        }
        if !self.document_ids.is_empty() {
            config.chat.document_ids = self.document_ids.clone();
        }

        config.validate()
    }
}
