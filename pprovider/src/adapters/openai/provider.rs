use std::sync::Arc;

use reqwest::Client;

use crate::{
    BoxedEventStream, ModelProvider, ModelRequest, ProviderError, ProviderFuture, ProviderId,
    SecretString,
};

use super::transport::{OpenAiAuth, OpenAiHttpTransport, OpenAiTransport};
use super::wire::ChatCompletionRequest;

/// Any backend that speaks chat-completions SSE: OpenAI itself, OpenRouter,
/// the Anthropic and Gemini compatibility endpoints, or a local gateway.
/// The provider id it registers under is chosen by the caller.
#[derive(Clone)]
pub struct OpenAiCompatibleProvider {
    id: ProviderId,
    auth: OpenAiAuth,
    transport: Arc<dyn OpenAiTransport>,
}

impl OpenAiCompatibleProvider {
    pub fn new(id: ProviderId, auth: OpenAiAuth, transport: Arc<dyn OpenAiTransport>) -> Self {
        Self {
            id,
            auth,
            transport,
        }
    }

    pub fn with_http(id: ProviderId, api_key: SecretString, base_url: impl Into<String>) -> Self {
        let transport = OpenAiHttpTransport::new(Client::new()).with_base_url(base_url);
        Self::new(id, OpenAiAuth::ApiKey(api_key), Arc::new(transport))
    }

    pub async fn list_models(&self) -> Result<Vec<String>, ProviderError> {
        self.transport.list_models(self.auth.clone()).await
    }
}

impl std::fmt::Debug for OpenAiCompatibleProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiCompatibleProvider")
            .field("id", &self.id)
            .field("auth", &self.auth)
            .field("transport", &self.transport)
            .finish()
    }
}

impl ModelProvider for OpenAiCompatibleProvider {
    fn id(&self) -> ProviderId {
        self.id
    }

    fn stream<'a>(
        &'a self,
        request: ModelRequest,
    ) -> ProviderFuture<'a, Result<BoxedEventStream<'a>, ProviderError>> {
        Box::pin(async move {
            request.validate()?;
            let body = ChatCompletionRequest::streaming(&request)?;
            tracing::debug!(
                phase = "provider",
                event = "stream_open",
                provider = %self.id,
                model = %body.model,
                messages = body.messages.len(),
                tools = body.tools.len()
            );
            self.transport.stream(self.id, body, self.auth.clone()).await
        })
    }
}
