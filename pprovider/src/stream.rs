//! Provider event streams and the accumulator that folds them into a response.
//!
//! ```rust
//! use pprovider::{ProviderId, StreamAccumulator, StreamEvent};
//!
//! let mut acc = StreamAccumulator::new();
//! for event in [StreamEvent::TextDelta("hel".into()), StreamEvent::TextDelta("lo".into())] {
//!     acc.observe(&event);
//! }
//! let response = acc.into_response(ProviderId::Ollama, "llama3");
//! assert_eq!(response.text, "hello");
//! assert!(response.success);
//! ```

use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures_core::Stream;

use crate::{ModelResponse, ProviderError, ProviderId, ToolCall};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    TextDelta(String),
    /// Latest accumulated snapshot of a tool call being generated.
    ToolCallDelta(ToolCall),
    ResponseComplete(ModelResponse),
}

/// What adapters hand back from `ModelProvider::stream`.
///
/// Text deltas arrive in generation order. `ResponseComplete`, when sent, is
/// the last item; a stream may also simply end, in which case the consumer
/// builds the response from the deltas it saw.
pub trait ModelEventStream: Stream<Item = Result<StreamEvent, ProviderError>> + Send {}

impl<T> ModelEventStream for T where T: Stream<Item = Result<StreamEvent, ProviderError>> + Send {}

pub type BoxedEventStream<'a> = Pin<Box<dyn ModelEventStream + 'a>>;

/// Running text and tool-call state for one streamed response.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StreamAccumulator {
    text: String,
    tool_call: Option<ToolCall>,
}

impl StreamAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a delta. Returns the text fragment when the event carried one.
    pub fn observe<'e>(&mut self, event: &'e StreamEvent) -> Option<&'e str> {
        match event {
            StreamEvent::TextDelta(delta) => {
                self.text.push_str(delta);
                Some(delta)
            }
            StreamEvent::ToolCallDelta(call) => {
                self.tool_call = Some(call.clone());
                None
            }
            StreamEvent::ResponseComplete(_) => None,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn tool_call(&self) -> Option<&ToolCall> {
        self.tool_call.as_ref()
    }

    /// Fills whatever the provider's terminal response left empty.
    pub fn complete(self, mut response: ModelResponse) -> ModelResponse {
        if response.text.is_empty() {
            response.text = self.text;
        }
        if response.tool_call.is_none()
            && let Some(call) = self.tool_call
        {
            response = response.with_tool_call(call);
        }
        response.success = true;
        response
    }

    /// Builds the response for a stream that ended without `ResponseComplete`.
    pub fn into_response(self, provider: ProviderId, model: impl Into<String>) -> ModelResponse {
        let response = ModelResponse::completed(provider, model, self.text);
        match self.tool_call {
            Some(call) => response.with_tool_call(call),
            None => response,
        }
    }

    pub fn into_partial(self, provider: ProviderId, model: impl Into<String>) -> ModelResponse {
        ModelResponse::cancelled(provider, model, self.text)
    }
}

/// A canned stream, mostly for fakes in tests.
#[derive(Debug, Default)]
pub struct VecEventStream {
    events: VecDeque<Result<StreamEvent, ProviderError>>,
}

impl VecEventStream {
    pub fn new(events: Vec<Result<StreamEvent, ProviderError>>) -> Self {
        Self {
            events: events.into(),
        }
    }

    /// One `TextDelta` per chunk, then end of stream.
    pub fn text_chunks<I, S>(chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            events: chunks
                .into_iter()
                .map(|chunk| Ok(StreamEvent::TextDelta(chunk.into())))
                .collect(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.events.len()
    }
}

impl Stream for VecEventStream {
    type Item = Result<StreamEvent, ProviderError>;

    fn poll_next(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Poll::Ready(self.events.pop_front())
    }
}
