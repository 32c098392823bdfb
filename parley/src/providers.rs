//! Provider construction from configuration.

use std::sync::Arc;

use pprovider::{ModelProvider, ProviderError, ProviderId, ProviderRegistry, SecretString};

use crate::config::ProviderConfig;

pub const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai";
pub const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com/v1";

/// Public chat-completions endpoint for each provider.
pub fn default_base_url(provider_id: ProviderId) -> &'static str {
    match provider_id {
        ProviderId::OpenAi => "https://api.openai.com/v1",
        ProviderId::Anthropic => ANTHROPIC_BASE_URL,
        ProviderId::Gemini => GEMINI_BASE_URL,
        ProviderId::OpenRouter => OPENROUTER_BASE_URL,
        ProviderId::Ollama => "http://localhost:11434/v1",
    }
}

pub fn build_provider(config: &ProviderConfig) -> Result<Arc<dyn ModelProvider>, ProviderError> {
    let base_url = config
        .base_url
        .clone()
        .unwrap_or_else(|| default_base_url(config.id).to_string());

    match config.id {
        ProviderId::Ollama => build_ollama_provider(base_url),
        id => {
            let variable = config.api_key_env.as_deref().ok_or_else(|| {
                ProviderError::authentication(format!("provider '{id}' has no api_key_env"))
            })?;
            let api_key = SecretString::from_env(variable)?;
            build_openai_compatible_provider(id, api_key, base_url)
        }
    }
}

pub fn build_provider_registry(
    configs: &[ProviderConfig],
) -> Result<ProviderRegistry, ProviderError> {
    let mut registry = ProviderRegistry::new();
    for config in configs {
        let provider = build_provider(config)?;
        tracing::info!(phase = "runtime", event = "provider_registered", provider = %config.id);
        registry.register_arc(provider);
    }
    Ok(registry)
}

#[cfg(feature = "provider-openai")]
fn build_openai_compatible_provider(
    id: ProviderId,
    api_key: SecretString,
    base_url: String,
) -> Result<Arc<dyn ModelProvider>, ProviderError> {
    Ok(Arc::new(
        pprovider::adapters::openai::OpenAiCompatibleProvider::with_http(id, api_key, base_url),
    ))
}

#[cfg(not(feature = "provider-openai"))]
fn build_openai_compatible_provider(
    id: ProviderId,
    _api_key: SecretString,
    _base_url: String,
) -> Result<Arc<dyn ModelProvider>, ProviderError> {
    Err(ProviderError::invalid_request(format!(
        "provider '{id}' needs the provider-openai feature on parley"
    )))
}

#[cfg(feature = "provider-ollama")]
fn build_ollama_provider(base_url: String) -> Result<Arc<dyn ModelProvider>, ProviderError> {
    Ok(Arc::new(pprovider::adapters::ollama::OllamaProvider::with_base_url(base_url)))
}

#[cfg(not(feature = "provider-ollama"))]
fn build_ollama_provider(_base_url: String) -> Result<Arc<dyn ModelProvider>, ProviderError> {
    Err(ProviderError::invalid_request(
        "provider-ollama feature is not enabled on parley",
    ))
}
