//! Local Ollama models through Ollama's OpenAI-compatible endpoint.
//!
//! Ollama needs no credentials, so the provider never sends an
//! `Authorization` header.

use std::sync::Arc;

use reqwest::Client;

use crate::adapters::openai::{
    OpenAiAuth, OpenAiCompatibleProvider, OpenAiHttpTransport, OpenAiTransport,
};
use crate::{BoxedEventStream, ModelProvider, ModelRequest, ProviderError, ProviderFuture, ProviderId};

pub const OLLAMA_BASE_URL: &str = "http://localhost:11434/v1";

#[derive(Debug, Clone)]
pub struct OllamaProvider {
    inner: OpenAiCompatibleProvider,
}

impl OllamaProvider {
    pub fn new(transport: Arc<dyn OpenAiTransport>) -> Self {
        Self {
            inner: OpenAiCompatibleProvider::new(ProviderId::Ollama, OpenAiAuth::None, transport),
        }
    }

    /// `base_url` should include the `/v1` suffix.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let transport = OpenAiHttpTransport::new(Client::new()).with_base_url(base_url);
        Self::new(Arc::new(transport))
    }

    /// Names of the locally pulled models.
    pub async fn list_models(&self) -> Result<Vec<String>, ProviderError> {
        self.inner.list_models().await
    }
}

impl Default for OllamaProvider {
    fn default() -> Self {
        Self::with_base_url(OLLAMA_BASE_URL)
    }
}

impl ModelProvider for OllamaProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Ollama
    }

    fn stream<'a>(
        &'a self,
        request: ModelRequest,
    ) -> ProviderFuture<'a, Result<BoxedEventStream<'a>, ProviderError>> {
        self.inner.stream(request)
    }
}
