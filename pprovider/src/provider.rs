use std::time::Instant;

use futures_util::StreamExt;
use pcommon::BoxFuture;

use crate::{
    BoxedEventStream, ModelRequest, ModelResponse, ProviderError, ProviderId, StreamAccumulator,
    StreamEvent,
};

pub type ProviderFuture<'a, T> = BoxFuture<'a, T>;

pub trait ModelProvider: Send + Sync {
    fn id(&self) -> ProviderId;

    fn stream<'a>(
        &'a self,
        request: ModelRequest,
    ) -> ProviderFuture<'a, Result<BoxedEventStream<'a>, ProviderError>>;

    /// Drains [`ModelProvider::stream`] into a single response.
    fn complete<'a>(
        &'a self,
        request: ModelRequest,
    ) -> ProviderFuture<'a, Result<ModelResponse, ProviderError>> {
        Box::pin(async move {
            let started = Instant::now();
            let provider = self.id();
            let model = request.model.clone();
            let mut events = self.stream(request).await?;
            let mut acc = StreamAccumulator::new();

            while let Some(event) = events.next().await {
                match event? {
                    StreamEvent::ResponseComplete(response) => {
                        return Ok(acc.complete(response).with_duration(started.elapsed()));
                    }
                    event => {
                        acc.observe(&event);
                    }
                }
            }

            let response = acc.into_response(provider, model);
            Ok(response.with_duration(started.elapsed()))
        })
    }
}
