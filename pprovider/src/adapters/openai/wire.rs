//! JSON bodies of the chat-completions API, in both directions.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    Attachment, LinearMessage, ModelRequest, ProviderError, Role, StopReason, TokenUsage,
    ToolDefinition,
};

/// Body of `POST {base_url}/chat/completions`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<WireTool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream_options: Option<StreamOptions>,
}

impl ChatCompletionRequest {
    /// Streaming body for `request`. The system prompt, when set, leads the
    /// message list; usage is requested on the final chunk.
    pub fn streaming(request: &ModelRequest) -> Result<Self, ProviderError> {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        if let Some(prompt) = request
            .system_prompt
            .as_deref()
            .filter(|prompt| !prompt.trim().is_empty())
        {
            messages.push(WireMessage::text(Role::System, prompt));
        }
        for message in &request.messages {
            messages.push(WireMessage::from_linear(message)?);
        }
        if messages.is_empty() {
            return Err(ProviderError::invalid_request(
                "chat completion request requires at least one message",
            ));
        }

        let tools = request
            .tools
            .iter()
            .map(WireTool::from_definition)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            model: request.model.clone(),
            messages,
            tools,
            temperature: request.options.temperature,
            top_p: request.options.top_p,
            max_tokens: request.options.max_tokens,
            stream: true,
            stream_options: Some(StreamOptions {
                include_usage: true,
            }),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StreamOptions {
    pub include_usage: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WireMessage {
    pub role: Role,
    pub content: WireContent,
}

impl WireMessage {
    pub fn text(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: WireContent::Text(content.into()),
        }
    }

    /// Images become `image_url` parts. Text attachments are inlined after
    /// the message body under their file name; other binaries are dropped.
    fn from_linear(message: &LinearMessage) -> Result<Self, ProviderError> {
        let mut text = message.content.clone();
        let mut images = Vec::new();

        for attachment in &message.attachments {
            if attachment.is_image() {
                images.push(WirePart::image(attachment));
            } else if let Some(inline) = attachment.text_content.as_deref() {
                if !text.is_empty() {
                    text.push_str("\n\n");
                }
                text.push_str(&format!("[{}]\n{inline}", attachment.name));
            }
        }

        if text.trim().is_empty() && images.is_empty() && message.role != Role::Assistant {
            return Err(ProviderError::invalid_request(
                "chat message content must not be empty",
            ));
        }

        let content = if images.is_empty() {
            WireContent::Text(text)
        } else {
            let mut parts = Vec::with_capacity(images.len() + 1);
            if !text.is_empty() {
                parts.push(WirePart::Text { text });
            }
            parts.extend(images);
            WireContent::Parts(parts)
        };

        Ok(Self {
            role: message.role,
            content,
        })
    }

    pub fn as_text(&self) -> Option<&str> {
        match &self.content {
            WireContent::Text(text) => Some(text),
            WireContent::Parts(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum WireContent {
    Text(String),
    Parts(Vec<WirePart>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WirePart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

impl WirePart {
    fn image(attachment: &Attachment) -> Self {
        Self::ImageUrl {
            image_url: ImageUrl {
                url: format!("data:{};base64,{}", attachment.mime_type, attachment.content),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageUrl {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WireTool {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub function: WireFunction,
}

impl WireTool {
    fn from_definition(definition: &ToolDefinition) -> Result<Self, ProviderError> {
        let parameters = serde_json::from_str::<Value>(&definition.input_schema).map_err(|_| {
            ProviderError::invalid_request(format!(
                "schema for tool '{}' must be valid JSON",
                definition.name
            ))
        })?;

        Ok(Self {
            kind: "function",
            function: WireFunction {
                name: definition.name.clone(),
                description: definition.description.clone(),
                parameters,
            },
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WireFunction {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// One SSE `data:` payload. The trailing usage chunk has no choices.
#[derive(Debug, Deserialize)]
pub(crate) struct StreamPayload {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub choices: Vec<StreamChoice>,
    #[serde(default)]
    pub usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StreamChoice {
    #[serde(default)]
    pub delta: StreamDelta,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct StreamDelta {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub tool_calls: Option<Vec<DeltaToolCall>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DeltaToolCall {
    #[serde(default)]
    pub index: Option<u32>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub function: Option<DeltaFunction>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DeltaFunction {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub arguments: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireUsage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
    #[serde(default)]
    pub prompt_tokens_details: Option<PromptTokensDetails>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PromptTokensDetails {
    #[serde(default)]
    pub cached_tokens: u64,
}

impl From<WireUsage> for TokenUsage {
    /// Cached prompt tokens are a subset of `prompt_tokens`.
    fn from(usage: WireUsage) -> Self {
        let cached = usage
            .prompt_tokens_details
            .map(|details| details.cached_tokens)
            .unwrap_or_default();
        TokenUsage::new(usage.prompt_tokens, usage.completion_tokens).with_cache(0, cached)
    }
}

pub(crate) fn stop_reason(finish_reason: &str) -> StopReason {
    match finish_reason {
        "stop" => StopReason::EndTurn,
        "length" => StopReason::MaxTokens,
        "tool_calls" | "function_call" => StopReason::ToolUse,
        "cancelled" => StopReason::Cancelled,
        _ => StopReason::Other,
    }
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// `error.message` from an API error body, if the body has that shape.
pub(crate) fn error_message(body: &str) -> Option<String> {
    serde_json::from_str::<ErrorEnvelope>(body)
        .ok()
        .map(|envelope| envelope.error.message)
}

#[derive(Debug, Deserialize)]
struct ModelList {
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
}

/// Model ids from a `GET /models` body, sorted and deduplicated.
pub(crate) fn model_ids(body: &str) -> Result<Vec<String>, ProviderError> {
    let list: ModelList = serde_json::from_str(body)
        .map_err(|err| ProviderError::transport(format!("malformed model list: {err}")))?;
    let mut ids: Vec<String> = list.data.into_iter().map(|entry| entry.id).collect();
    ids.sort();
    ids.dedup();
    Ok(ids)
}
