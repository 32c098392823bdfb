//! Where chat-completions requests go. The HTTP implementation speaks SSE
//! over reqwest; tests substitute their own.

use std::fmt::{Debug, Formatter};

use async_stream::try_stream;
use futures_util::StreamExt;
use reqwest::{Client, RequestBuilder, Response};

use crate::{BoxedEventStream, ProviderError, ProviderFuture, ProviderId, SecretString, StreamEvent};

use super::decoder::ChatCompletionDecoder;
use super::wire::{ChatCompletionRequest, error_message, model_ids};

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Clone, PartialEq, Eq)]
pub enum OpenAiAuth {
    ApiKey(SecretString),
    None,
}

impl OpenAiAuth {
    fn apply(&self, builder: RequestBuilder) -> RequestBuilder {
        match self {
            Self::ApiKey(key) => builder.bearer_auth(key.expose()),
            Self::None => builder,
        }
    }
}

impl Debug for OpenAiAuth {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ApiKey(_) => f.write_str("OpenAiAuth::ApiKey([REDACTED])"),
            Self::None => f.write_str("OpenAiAuth::None"),
        }
    }
}

pub trait OpenAiTransport: Send + Sync + Debug {
    /// Opens a streaming completion. Events must end with `ResponseComplete`
    /// stamped with `provider`.
    fn stream<'a>(
        &'a self,
        provider: ProviderId,
        request: ChatCompletionRequest,
        auth: OpenAiAuth,
    ) -> ProviderFuture<'a, Result<BoxedEventStream<'a>, ProviderError>>;

    /// Model ids the endpoint advertises.
    fn list_models<'a>(
        &'a self,
        _auth: OpenAiAuth,
    ) -> ProviderFuture<'a, Result<Vec<String>, ProviderError>> {
        Box::pin(async { Err(ProviderError::unavailable("model listing is not supported")) })
    }
}

#[derive(Debug, Clone)]
pub struct OpenAiHttpTransport {
    client: Client,
    base_url: String,
}

impl OpenAiHttpTransport {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            base_url: OPENAI_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url.trim_end_matches('/'))
    }
}

async fn rejection(response: Response) -> ProviderError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let message = error_message(&body)
        .unwrap_or_else(|| format!("chat completion request failed with status {status}"));
    ProviderError::from_status(status.as_u16(), message)
}

fn send_error(err: reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        ProviderError::timeout(err.to_string())
    } else {
        ProviderError::transport(err.to_string())
    }
}

impl OpenAiTransport for OpenAiHttpTransport {
    fn stream<'a>(
        &'a self,
        provider: ProviderId,
        request: ChatCompletionRequest,
        auth: OpenAiAuth,
    ) -> ProviderFuture<'a, Result<BoxedEventStream<'a>, ProviderError>> {
        Box::pin(async move {
            let fallback_model = request.model.clone();
            let builder = self.client.post(self.endpoint("chat/completions")).json(&request);
            let response = auth.apply(builder).send().await.map_err(send_error)?;
            if !response.status().is_success() {
                return Err(rejection(response).await);
            }

            let events = try_stream! {
                let mut body = response.bytes_stream();
                let mut decoder = ChatCompletionDecoder::new(provider, fallback_model);

                while let Some(bytes) = body.next().await {
                    let bytes = bytes.map_err(send_error)?;
                    for event in decoder.feed(&bytes)? {
                        yield event;
                    }
                    if decoder.is_done() {
                        break;
                    }
                }

                yield StreamEvent::ResponseComplete(decoder.finish());
            };

            Ok(Box::pin(events) as BoxedEventStream<'a>)
        })
    }

    fn list_models<'a>(
        &'a self,
        auth: OpenAiAuth,
    ) -> ProviderFuture<'a, Result<Vec<String>, ProviderError>> {
        Box::pin(async move {
            let builder = self.client.get(self.endpoint("models"));
            let response = auth.apply(builder).send().await.map_err(send_error)?;
            if !response.status().is_success() {
                return Err(rejection(response).await);
            }
            let body = response.text().await.map_err(send_error)?;
            model_ids(&body)
        })
    }
}
