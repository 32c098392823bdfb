//! TOML engine configuration.
//!
//! ```rust
//! use parley::config::EngineConfig;
//!
//! let config = EngineConfig::from_toml_str(
//!     r#"
//!     [chat]
//!     default_model = "llama3.2"
//!
//!     [[providers]]
//!     id = "ollama"
//!
//!     [[models]]
//!     name = "llama3.2"
//!     provider = "ollama"
//!     "#,
//! )
//! .unwrap();
//!
//! assert_eq!(config.chat.max_tool_iterations, 50);
//! assert_eq!(config.models.len(), 1);
//! ```

use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::time::Duration;

use pchat::{ChatPolicy, DEFAULT_MAX_TOOL_ITERATIONS, ModelCatalog, ModelEntry};
use pmemory::{DEFAULT_DATA_DIR, MemoryError, StoreConfig};
use pprovider::{ModelPricing, ProviderError, ProviderId, RetryPolicy};
use serde::{Deserialize, Serialize};

pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:8765";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigErrorKind {
    Io,
    Parse,
    Invalid,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    pub kind: ConfigErrorKind,
    pub message: String,
}

impl ConfigError {
    pub fn new(kind: ConfigErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::new(ConfigErrorKind::Io, message)
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::new(ConfigErrorKind::Parse, message)
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::new(ConfigErrorKind::Invalid, message)
    }
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl Error for ConfigError {}

impl From<toml::de::Error> for ConfigError {
    fn from(error: toml::de::Error) -> Self {
        Self::parse(error.to_string())
    }
}

impl From<ProviderError> for ConfigError {
    fn from(error: ProviderError) -> Self {
        Self::invalid(error.to_string())
    }
}

impl From<MemoryError> for ConfigError {
    fn from(error: MemoryError) -> Self {
        Self::io(error.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
    #[serde(default)]
    pub models: Vec<ModelConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    #[default]
    Filesystem,
    InMemory,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            data_dir: default_data_dir(),
        }
    }
}

impl StorageConfig {
    pub fn store_config(&self) -> StoreConfig {
        match self.backend {
            StorageBackend::Filesystem => StoreConfig::Filesystem {
                root: self.data_dir.clone(),
            },
            StorageBackend::InMemory => StoreConfig::InMemory,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChatConfig {
    #[serde(default = "default_max_tool_iterations")]
    pub max_tool_iterations: u32,
    #[serde(default = "default_true")]
    pub resume_after_interjection: bool,
    #[serde(default)]
    pub default_model: Option<String>,
    #[serde(default)]
    pub system_prompt: Option<String>,
    /// Model that titles new conversations; unset keeps the first user line.
    #[serde(default)]
    pub secondary_model: Option<String>,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            max_tool_iterations: DEFAULT_MAX_TOOL_ITERATIONS,
            resume_after_interjection: true,
            default_model: None,
            system_prompt: None,
            secondary_model: None,
        }
    }
}

impl ChatConfig {
    pub fn policy(&self) -> ChatPolicy {
        let mut policy = ChatPolicy::default()
            .with_max_tool_iterations(self.max_tool_iterations)
            .with_resume_after_interjection(self.resume_after_interjection);
        if let Some(model) = &self.default_model {
            policy = policy.with_default_model(model.clone());
        }
        if let Some(prompt) = &self.system_prompt {
            policy = policy.with_system_prompt(prompt.clone());
        }
        if let Some(model) = &self.secondary_model {
            policy = policy.with_secondary_model(model.clone());
        }
        policy
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts)
            .with_initial_backoff(Duration::from_millis(self.initial_backoff_ms))
            .with_max_backoff(Duration::from_millis(self.max_backoff_ms))
            .with_backoff_multiplier(self.backoff_multiplier)
    }
}

/// Which hook set observes provider, tool and loop events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookSet {
    #[default]
    Tracing,
    Metrics,
    #[serde(rename = "none")]
    Disabled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ObservabilityConfig {
    #[serde(default)]
    pub hooks: HookSet,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    pub id: ProviderId,
    /// Falls back to the provider's public endpoint.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Name of the environment variable holding the API key.
    #[serde(default)]
    pub api_key_env: Option<String>,
}

impl ProviderConfig {
    pub fn new(id: ProviderId) -> Self {
        Self {
            id,
            base_url: None,
            api_key_env: None,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_api_key_env(mut self, variable: impl Into<String>) -> Self {
        self.api_key_env = Some(variable.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelConfig {
    pub name: String,
    pub provider: ProviderId,
    #[serde(default)]
    pub pricing: Option<ModelPricing>,
}

impl EngineConfig {
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|error| {
            ConfigError::io(format!(
                "failed to read config file '{}': {error}",
                path.display()
            ))
        })?;
        let config = Self::from_toml_str(&source)?;
        tracing::info!(
            phase = "config",
            event = "loaded",
            path = %path.display(),
            providers = config.providers.len(),
            models = config.models.len()
        );
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.bind_address.trim().is_empty() {
            return Err(ConfigError::invalid("server.bind_address must not be empty"));
        }
        if self.chat.max_tool_iterations == 0 {
            return Err(ConfigError::invalid(
                "chat.max_tool_iterations must be at least 1",
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::invalid("retry.max_attempts must be at least 1"));
        }
        if self.retry.backoff_multiplier.is_nan() || self.retry.backoff_multiplier < 1.0 {
            return Err(ConfigError::invalid(
                "retry.backoff_multiplier must be at least 1.0",
            ));
        }

        let mut providers = HashSet::new();
        for provider in &self.providers {
            if !providers.insert(provider.id) {
                return Err(ConfigError::invalid(format!(
                    "provider '{}' is configured more than once",
                    provider.id
                )));
            }
            if provider.id != ProviderId::Ollama && provider.api_key_env.is_none() {
                return Err(ConfigError::invalid(format!(
                    "provider '{}' requires api_key_env",
                    provider.id
                )));
            }
        }

        let mut models = HashSet::new();
        for model in &self.models {
            if model.name.trim().is_empty() {
                return Err(ConfigError::invalid("model name must not be empty"));
            }
            if !models.insert(model.name.as_str()) {
                return Err(ConfigError::invalid(format!(
                    "model '{}' is configured more than once",
                    model.name
                )));
            }
            if !providers.contains(&model.provider) {
                return Err(ConfigError::invalid(format!(
                    "model '{}' references unconfigured provider '{}'",
                    model.name, model.provider
                )));
            }
            if let Some(pricing) = &model.pricing
                && has_negative_price(pricing)
            {
                return Err(ConfigError::invalid(format!(
                    "model '{}' has a negative price",
                    model.name
                )));
            }
        }

        if let Some(default_model) = &self.chat.default_model
            && !models.contains(default_model.as_str())
        {
            return Err(ConfigError::invalid(format!(
                "chat.default_model '{default_model}' is not a configured model"
            )));
        }
        if let Some(secondary_model) = &self.chat.secondary_model
            && !models.contains(secondary_model.as_str())
        {
            return Err(ConfigError::invalid(format!(
                "chat.secondary_model '{secondary_model}' is not a configured model"
            )));
        }

        Ok(())
    }

    pub fn catalog(&self) -> ModelCatalog {
        self.models
            .iter()
            .fold(ModelCatalog::new(), |catalog, model| {
                let entry = ModelEntry::new(model.name.clone(), model.provider);
                catalog.with_model(match &model.pricing {
                    Some(pricing) => entry.with_pricing(pricing.clone()),
                    None => entry,
                })
            })
    }
}

fn has_negative_price(pricing: &ModelPricing) -> bool {
    [
        Some(pricing.input_price_per_million),
        Some(pricing.output_price_per_million),
        pricing.input_price_above_boundary,
        pricing.output_price_above_boundary,
    ]
    .into_iter()
    .flatten()
    .any(|price| price < 0.0)
}

fn default_bind_address() -> String {
    DEFAULT_BIND_ADDRESS.to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(DEFAULT_DATA_DIR)
}

fn default_max_tool_iterations() -> u32 {
    DEFAULT_MAX_TOOL_ITERATIONS
}

fn default_true() -> bool {
    true
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    250
}

fn default_max_backoff_ms() -> u64 {
    8_000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}
