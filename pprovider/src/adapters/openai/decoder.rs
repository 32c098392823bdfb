//! Incremental decoder for chat-completions server-sent events.

use std::collections::BTreeMap;

use crate::{ModelResponse, ProviderError, ProviderId, StopReason, StreamEvent, TokenUsage, ToolCall};

use super::wire::{StreamPayload, stop_reason};

/// Turns raw SSE bytes into [`StreamEvent`]s and, at the end, the terminal
/// [`ModelResponse`].
///
/// Bytes may be split anywhere, even inside a UTF-8 sequence. Only complete
/// lines are decoded.
///
/// ```rust
/// use pprovider::adapters::openai::ChatCompletionDecoder;
/// use pprovider::{ProviderId, StreamEvent};
///
/// let mut decoder = ChatCompletionDecoder::new(ProviderId::OpenAi, "gpt-4o-mini");
/// let events = decoder
///     .feed(b"data: {\"choices\":[{\"delta\":{\"content\":\"hi\"}}]}\n\ndata: [DONE]\n")
///     .expect("valid payload");
///
/// assert_eq!(events, vec![StreamEvent::TextDelta("hi".to_string())]);
/// assert!(decoder.is_done());
/// assert_eq!(decoder.finish().text, "hi");
/// ```
#[derive(Debug)]
pub struct ChatCompletionDecoder {
    provider: ProviderId,
    fallback_model: String,
    pending: Vec<u8>,
    done: bool,
    model: Option<String>,
    text: String,
    tool_calls: BTreeMap<u32, ToolCall>,
    stop_reason: Option<StopReason>,
    usage: TokenUsage,
}

impl ChatCompletionDecoder {
    pub fn new(provider: ProviderId, fallback_model: impl Into<String>) -> Self {
        Self {
            provider,
            fallback_model: fallback_model.into(),
            pending: Vec::new(),
            done: false,
            model: None,
            text: String::new(),
            tool_calls: BTreeMap::new(),
            stop_reason: None,
            usage: TokenUsage::default(),
        }
    }

    /// True once `data: [DONE]` has been seen.
    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn feed(&mut self, bytes: &[u8]) -> Result<Vec<StreamEvent>, ProviderError> {
        self.pending.extend_from_slice(bytes);
        let mut events = Vec::new();

        while !self.done {
            let Some(end) = self.pending.iter().position(|byte| *byte == b'\n') else {
                break;
            };
            let line: Vec<u8> = self.pending.drain(..=end).collect();
            let line = std::str::from_utf8(&line).map_err(|err| {
                ProviderError::transport(format!("invalid UTF-8 in stream: {err}"))
            })?;
            self.decode_line(line.trim(), &mut events)?;
        }

        Ok(events)
    }

    fn decode_line(&mut self, line: &str, events: &mut Vec<StreamEvent>) -> Result<(), ProviderError> {
        // Comments, `event:` and `id:` lines carry nothing we use.
        let Some(data) = line.strip_prefix("data:").map(str::trim) else {
            return Ok(());
        };
        if data == "[DONE]" {
            self.done = true;
            return Ok(());
        }

        let payload: StreamPayload = serde_json::from_str(data)
            .map_err(|err| ProviderError::transport(format!("malformed stream payload: {err}")))?;

        if self.model.is_none() {
            self.model = payload.model.filter(|model| !model.is_empty());
        }
        if let Some(usage) = payload.usage {
            self.usage = usage.into();
        }

        for choice in payload.choices.into_iter().take(1) {
            if let Some(delta) = choice.delta.content.filter(|delta| !delta.is_empty()) {
                self.text.push_str(&delta);
                events.push(StreamEvent::TextDelta(delta));
            }

            for fragment in choice.delta.tool_calls.unwrap_or_default() {
                let index = fragment.index.unwrap_or(0);
                let call = self.tool_calls.entry(index).or_insert_with(|| ToolCall {
                    id: format!("tool_call_{index}"),
                    name: String::new(),
                    arguments: String::new(),
                });
                if let Some(id) = fragment.id {
                    call.id = id;
                }
                if let Some(function) = fragment.function {
                    if let Some(name) = function.name {
                        call.name = name;
                    }
                    if let Some(arguments) = function.arguments {
                        call.arguments.push_str(&arguments);
                    }
                }
                events.push(StreamEvent::ToolCallDelta(call.clone()));
            }

            if let Some(reason) = choice.finish_reason.as_deref() {
                self.stop_reason = Some(stop_reason(reason));
            }
        }

        Ok(())
    }

    /// Only the first tool call survives; the loop dispatches one tool per turn.
    pub fn finish(self) -> ModelResponse {
        let model = self.model.unwrap_or(self.fallback_model);
        let mut response =
            ModelResponse::completed(self.provider, model, self.text).with_usage(self.usage);
        if let Some(reason) = self.stop_reason {
            response.stop_reason = reason;
        }
        match self.tool_calls.into_values().next() {
            Some(call) => response.with_tool_call(call),
            None => response,
        }
    }
}
