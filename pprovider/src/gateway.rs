//! Uniform, never-failing front door to registered model providers.
//!
//! [`ModelGateway::fetch`] yields zero or more [`GatewayEvent::TextDelta`]s
//! followed by exactly one [`GatewayEvent::Complete`]. Provider errors,
//! unknown providers, invalid requests and cancellation all surface as a
//! terminal [`ModelResponse`] with `success == false`.
//!
//! ```rust
//! use std::sync::Arc;
//! use futures_util::StreamExt;
//! use pprovider::{GatewayEvent, LinearMessage, ModelGateway, ModelRequest, ProviderId, ProviderRegistry};
//!
//! # tokio_test_block_on(async {
//! let gateway = ModelGateway::new(Arc::new(ProviderRegistry::new()));
//! let request = ModelRequest::builder(ProviderId::OpenAi, "gpt-4o-mini")
//!     .message(LinearMessage::user("hi"))
//!     .build()
//!     .expect("valid request");
//!
//! let events = gateway.fetch(request).collect::<Vec<_>>().await;
//! let GatewayEvent::Complete(response) = &events[0] else { panic!("terminal event expected") };
//! assert!(!response.success);
//! # });
//! # fn tokio_test_block_on<F: std::future::Future>(future: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(future)
//! # }
//! ```

use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

use async_stream::stream;
use futures_core::Stream;
use futures_util::StreamExt;

use crate::{
    ModelProvider, ModelRequest, ModelResponse, NoopOperationHooks, ProviderError,
    ProviderOperationHooks, ProviderRegistry, RetryPolicy, StreamAccumulator, StreamEvent,
    execute_with_retry,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayEvent {
    TextDelta(String),
    Complete(ModelResponse),
}

pub type GatewayStream<'a> = Pin<Box<dyn Stream<Item = GatewayEvent> + Send + 'a>>;

#[derive(Clone)]
pub struct ModelGateway {
    providers: Arc<ProviderRegistry>,
    retry_policy: RetryPolicy,
    hooks: Arc<dyn ProviderOperationHooks>,
}

impl ModelGateway {
    pub fn new(providers: Arc<ProviderRegistry>) -> Self {
        Self {
            providers,
            retry_policy: RetryPolicy::default(),
            hooks: Arc::new(NoopOperationHooks),
        }
    }

    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn ProviderOperationHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn providers(&self) -> Arc<ProviderRegistry> {
        Arc::clone(&self.providers)
    }

    pub fn fetch<'a>(&'a self, request: ModelRequest) -> GatewayStream<'a> {
        Box::pin(stream! {
            let started = Instant::now();
            let provider_id = request.provider;
            let model = request.model.clone();
            let cancellation = request.cancellation.clone();

            let provider = match self.providers.resolve(provider_id) {
                Ok(provider) => provider,
                Err(error) => {
                    tracing::warn!(phase = "gateway", event = "unknown_provider", provider = %provider_id);
                    yield GatewayEvent::Complete(
                        ModelResponse::failure(provider_id, model, error.message)
                            .with_duration(started.elapsed()),
                    );
                    return;
                }
            };

            if let Err(error) = request.validate() {
                yield GatewayEvent::Complete(
                    failure_response(provider_id, &model, &error).with_duration(started.elapsed()),
                );
                return;
            }

            let provider_ref: &dyn ModelProvider = provider.as_ref();
            let opened = execute_with_retry(
                provider_id,
                "stream",
                &self.retry_policy,
                self.hooks.as_ref(),
                &cancellation,
                |_| provider_ref.stream(request.clone()),
                tokio::time::sleep,
            )
            .await;

            let mut events = match opened {
                Ok(events) => events,
                Err(error) if error.is_cancelled() => {
                    tracing::info!(phase = "gateway", event = "cancelled", provider = %provider_id, model = %model);
                    yield GatewayEvent::Complete(
                        ModelResponse::cancelled(provider_id, model, String::new())
                            .with_duration(started.elapsed()),
                    );
                    return;
                }
                Err(error) => {
                    tracing::error!(phase = "gateway", event = "open_failed", provider = %provider_id, error = %error);
                    yield GatewayEvent::Complete(
                        failure_response(provider_id, &model, &error).with_duration(started.elapsed()),
                    );
                    return;
                }
            };

            let mut acc = StreamAccumulator::new();
            let mut outcome = StreamOutcome::Exhausted;

            loop {
                let next = tokio::select! {
                    biased;
                    _ = cancellation.cancelled() => {
                        outcome = StreamOutcome::Cancelled;
                        None
                    }
                    item = events.next() => item,
                };

                match next {
                    None => break,
                    Some(Ok(StreamEvent::ResponseComplete(response))) => {
                        outcome = StreamOutcome::Completed(Box::new(response));
                        break;
                    }
                    Some(Ok(event)) => {
                        if let Some(delta) = acc.observe(&event) {
                            yield GatewayEvent::TextDelta(delta.to_string());
                        }
                    }
                    Some(Err(error)) => {
                        outcome = StreamOutcome::Failed(error);
                        break;
                    }
                }
            }
            drop(events);

            let response = match outcome {
                StreamOutcome::Completed(response) => acc.complete(*response),
                StreamOutcome::Exhausted => acc.into_response(provider_id, model),
                StreamOutcome::Cancelled => {
                    tracing::info!(phase = "gateway", event = "cancelled", provider = %provider_id, model = %model);
                    acc.into_partial(provider_id, model)
                }
                StreamOutcome::Failed(error) => {
                    tracing::error!(phase = "gateway", event = "stream_failed", provider = %provider_id, error = %error);
                    failure_response(provider_id, &model, &error)
                }
            };

            yield GatewayEvent::Complete(response.with_duration(started.elapsed()));
        })
    }

    /// Runs [`ModelGateway::fetch`] to completion, forwarding deltas to `on_delta`.
    pub async fn fetch_with<F>(&self, request: ModelRequest, mut on_delta: F) -> ModelResponse
    where
        F: FnMut(&str),
    {
        let provider = request.provider;
        let model = request.model.clone();
        let mut events = self.fetch(request);

        while let Some(event) = events.next().await {
            match event {
                GatewayEvent::TextDelta(delta) => on_delta(&delta),
                GatewayEvent::Complete(response) => return response,
            }
        }

        ModelResponse::failure(provider, model, "gateway stream ended without a response")
    }
}

enum StreamOutcome {
    Exhausted,
    Completed(Box<ModelResponse>),
    Cancelled,
    Failed(ProviderError),
}

fn failure_response(
    provider: crate::ProviderId,
    model: &str,
    error: &ProviderError,
) -> ModelResponse {
    if error.is_cancelled() {
        return ModelResponse::cancelled(provider, model, String::new());
    }
    ModelResponse::failure(provider, model, format!("{provider} request failed: {error}"))
}
