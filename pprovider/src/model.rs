//! Provider-agnostic request, response, and linear history types.
//!
//! ```rust
//! use pprovider::{LinearMessage, ModelRequest, ProviderErrorKind, ProviderId};
//!
//! let ok = ModelRequest::builder(ProviderId::OpenAi, "gpt-4o-mini")
//!     .message(LinearMessage::user("Summarize this diff"))
//!     .build();
//! assert!(ok.is_ok());
//!
//! let err = ModelRequest::builder(ProviderId::OpenAi, "")
//!     .message(LinearMessage::user("hi"))
//!     .build()
//!     .err()
//!     .expect("empty model should fail");
//! assert_eq!(err.kind, ProviderErrorKind::InvalidRequest);
//! ```

use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::time::Duration;

use pcommon::{MetadataMap, SamplingOptions};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::ProviderError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderId {
    #[serde(rename = "openai")]
    OpenAi,
    Anthropic,
    Gemini,
    #[serde(rename = "openrouter")]
    OpenRouter,
    Ollama,
}

impl ProviderId {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
            Self::Gemini => "gemini",
            Self::OpenRouter => "openrouter",
            Self::Ollama => "ollama",
        }
    }
}

impl Display for ProviderId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = ProviderError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "anthropic" | "claude" => Ok(Self::Anthropic),
            "gemini" | "google" => Ok(Self::Gemini),
            "openrouter" => Ok(Self::OpenRouter),
            "ollama" => Ok(Self::Ollama),
            other => Err(ProviderError::invalid_request(format!(
                "unknown provider id '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// File or image content carried alongside a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: String,
    pub name: String,
    pub mime_type: String,
    /// Base64-encoded payload.
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_content: Option<String>,
    #[serde(default)]
    pub size: u64,
}

impl Attachment {
    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }
}

/// One entry of a linearized conversation path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinearMessage {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
}

impl LinearMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            attachments: Vec::new(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn with_attachments(mut self, attachments: Vec<Attachment>) -> Self {
        self.attachments = attachments;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub id: String,
    pub name: String,
    pub description: String,
    /// JSON schema for the tool parameters.
    pub input_schema: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_format: Option<String>,
}

impl ToolDefinition {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: impl Into<String>,
    ) -> Self {
        let name = name.into();
        Self {
            id: name.clone(),
            name,
            description: description.into(),
            input_schema: input_schema.into(),
            category: None,
            output_format: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_output_format(mut self, output_format: impl Into<String>) -> Self {
        self.output_format = Some(output_format.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    EndTurn,
    MaxTokens,
    ToolUse,
    Cancelled,
    Error,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
    #[serde(default)]
    pub cache_creation_tokens: u64,
    #[serde(default)]
    pub cache_read_tokens: u64,
}

impl TokenUsage {
    pub fn new(input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            input_tokens,
            output_tokens,
            ..Self::default()
        }
    }

    pub fn with_cache(mut self, creation_tokens: u64, read_tokens: u64) -> Self {
        self.cache_creation_tokens = creation_tokens;
        self.cache_read_tokens = read_tokens;
        self
    }

    pub fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens + self.cache_creation_tokens + self.cache_read_tokens
    }
}

/// Terminal structured response for one provider call.
///
/// Failures are values: `success == false` with diagnostic text in `text`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelResponse {
    pub provider: ProviderId,
    pub model: String,
    pub text: String,
    pub tool_call: Option<ToolCall>,
    pub stop_reason: StopReason,
    pub usage: TokenUsage,
    pub duration: Duration,
    pub success: bool,
    pub cancelled: bool,
}

impl ModelResponse {
    pub fn completed(provider: ProviderId, model: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            text: text.into(),
            tool_call: None,
            stop_reason: StopReason::EndTurn,
            usage: TokenUsage::default(),
            duration: Duration::ZERO,
            success: true,
            cancelled: false,
        }
    }

    pub fn failure(
        provider: ProviderId,
        model: impl Into<String>,
        diagnostic: impl Into<String>,
    ) -> Self {
        Self {
            stop_reason: StopReason::Error,
            success: false,
            ..Self::completed(provider, model, diagnostic)
        }
    }

    pub fn cancelled(provider: ProviderId, model: impl Into<String>, partial: impl Into<String>) -> Self {
        Self {
            stop_reason: StopReason::Cancelled,
            success: false,
            cancelled: true,
            ..Self::completed(provider, model, partial)
        }
    }

    pub fn with_tool_call(mut self, tool_call: ToolCall) -> Self {
        self.stop_reason = StopReason::ToolUse;
        self.tool_call = Some(tool_call);
        self
    }

    pub fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.usage = usage;
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn tool_name(&self) -> Option<&str> {
        self.tool_call.as_ref().map(|call| call.name.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct ModelRequest {
    pub provider: ProviderId,
    pub model: String,
    pub system_prompt: Option<String>,
    pub messages: Vec<LinearMessage>,
    pub tools: Vec<ToolDefinition>,
    pub options: SamplingOptions,
    pub metadata: MetadataMap,
    pub cancellation: CancellationToken,
}

impl ModelRequest {
    pub fn builder(provider: ProviderId, model: impl Into<String>) -> ModelRequestBuilder {
        ModelRequestBuilder::new(provider, model)
    }

    pub fn tool_ids(&self) -> impl Iterator<Item = &str> {
        self.tools.iter().map(|tool| tool.id.as_str())
    }

    pub fn attachments(&self) -> impl Iterator<Item = &Attachment> {
        self.messages
            .iter()
            .flat_map(|message| message.attachments.iter())
    }

    pub fn validate(&self) -> Result<(), ProviderError> {
        if self.model.trim().is_empty() {
            return Err(ProviderError::invalid_request("model must not be empty"));
        }

        if self.messages.is_empty() {
            return Err(ProviderError::invalid_request(
                "at least one message is required",
            ));
        }

        if let Some(max_tokens) = self.options.max_tokens
            && max_tokens == 0
        {
            return Err(ProviderError::invalid_request(
                "max_tokens must be greater than zero",
            ));
        }

        if let Some(temperature) = self.options.temperature
            && !(0.0..=2.0).contains(&temperature)
        {
            return Err(ProviderError::invalid_request(
                "temperature must be in the inclusive range 0.0..=2.0",
            ));
        }

        if let Some(top_p) = self.options.top_p
            && !(0.0..=1.0).contains(&top_p)
        {
            return Err(ProviderError::invalid_request(
                "top_p must be in the inclusive range 0.0..=1.0",
            ));
        }

        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ModelRequestBuilder {
    request: ModelRequest,
}

impl ModelRequestBuilder {
    pub fn new(provider: ProviderId, model: impl Into<String>) -> Self {
        Self {
            request: ModelRequest {
                provider,
                model: model.into(),
                system_prompt: None,
                messages: Vec::new(),
                tools: Vec::new(),
                options: SamplingOptions::default(),
                metadata: MetadataMap::new(),
                cancellation: CancellationToken::new(),
            },
        }
    }

    pub fn system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.request.system_prompt = Some(system_prompt.into());
        self
    }

    pub fn maybe_system_prompt(mut self, system_prompt: Option<String>) -> Self {
        self.request.system_prompt = system_prompt;
        self
    }

    pub fn message(mut self, message: LinearMessage) -> Self {
        self.request.messages.push(message);
        self
    }

    pub fn messages(mut self, messages: Vec<LinearMessage>) -> Self {
        self.request.messages.extend(messages);
        self
    }

    pub fn tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.request.tools = tools;
        self
    }

    pub fn options(mut self, options: SamplingOptions) -> Self {
        self.request.options = options;
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.request.options.temperature = Some(temperature);
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.request.options.max_tokens = Some(max_tokens);
        self
    }

    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.request.metadata.insert(key.into(), value.into());
        self
    }

    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.request.cancellation = token;
        self
    }

    pub fn build(self) -> Result<ModelRequest, ProviderError> {
        self.request.validate()?;
        Ok(self.request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ProviderErrorKind;

    fn request() -> ModelRequestBuilder {
        ModelRequest::builder(ProviderId::OpenAi, "gpt").message(LinearMessage::user("hi"))
    }

    #[test]
    fn provider_id_display_and_parse_are_stable() {
        assert_eq!(ProviderId::OpenAi.to_string(), "openai");
        assert_eq!(ProviderId::OpenRouter.to_string(), "openrouter");
        assert_eq!("claude".parse::<ProviderId>(), Ok(ProviderId::Anthropic));
        assert_eq!(" Ollama ".parse::<ProviderId>(), Ok(ProviderId::Ollama));
        assert!("nope".parse::<ProviderId>().is_err());
    }

    #[test]
    fn validate_enforces_request_contract() {
        let err = ModelRequest::builder(ProviderId::OpenAi, "gpt")
            .build()
            .expect_err("empty messages must fail");
        assert_eq!(err.kind, ProviderErrorKind::InvalidRequest);

        let err = request()
            .temperature(2.5)
            .build()
            .expect_err("temperature outside range must fail");
        assert_eq!(err.kind, ProviderErrorKind::InvalidRequest);

        let err = request()
            .max_tokens(0)
            .build()
            .expect_err("max_tokens=0 must fail");
        assert_eq!(err.kind, ProviderErrorKind::InvalidRequest);

        let err = request()
            .options(SamplingOptions::default().with_top_p(1.5))
            .build()
            .expect_err("top_p outside range must fail");
        assert_eq!(err.kind, ProviderErrorKind::InvalidRequest);

        let valid = request()
            .temperature(0.4)
            .max_tokens(128)
            .metadata("trace_id", "abc")
            .build()
            .expect("valid request");
        assert_eq!(valid.metadata.get("trace_id"), Some(&"abc".to_string()));
    }

    #[test]
    fn request_exposes_tool_ids_and_attachments() {
        let attachment = Attachment {
            id: "a1".to_string(),
            name: "diagram.png".to_string(),
            mime_type: "image/png".to_string(),
            content: "aGVsbG8=".to_string(),
            text_content: None,
            size: 5,
        };
        let request = ModelRequest::builder(ProviderId::OpenAi, "gpt")
            .message(LinearMessage::user("look").with_attachments(vec![attachment.clone()]))
            .tools(vec![
                ToolDefinition::new("search", "Searches", "{}").with_id("tool-search"),
            ])
            .build()
            .expect("valid request");

        assert_eq!(request.tool_ids().collect::<Vec<_>>(), vec!["tool-search"]);
        assert_eq!(request.attachments().collect::<Vec<_>>(), vec![&attachment]);
        assert!(attachment.is_image());
    }

    #[test]
    fn failure_and_cancelled_responses_are_not_successful() {
        let failed = ModelResponse::failure(ProviderId::OpenAi, "gpt", "timed out");
        assert!(!failed.success);
        assert!(!failed.cancelled);
        assert_eq!(failed.stop_reason, StopReason::Error);

        let cancelled = ModelResponse::cancelled(ProviderId::OpenAi, "gpt", "partial");
        assert!(cancelled.cancelled);
        assert_eq!(cancelled.text, "partial");
    }

    #[test]
    fn token_usage_total_includes_cache_counts() {
        let usage = TokenUsage::new(10, 5).with_cache(3, 2);
        assert_eq!(usage.total(), 20);
    }
}
