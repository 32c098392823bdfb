//! Message nodes and their typed content blocks.

use std::time::Duration;

use chrono::{DateTime, Utc};
use pcommon::MessageId;
use pprovider::{Attachment, CostInfo, Role};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MessageRole {
    User,
    Ai,
    System,
}

impl MessageRole {
    pub fn provider_role(self) -> Role {
        match self {
            Self::User => Role::User,
            Self::Ai => Role::Assistant,
            Self::System => Role::System,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ContentBlock {
    Text {
        content: String,
    },
    /// Lifted into the system prompt during linearization.
    System {
        content: String,
    },
    /// Sent to the model but not rendered to users.
    AiHidden {
        content: String,
    },
    ToolCall {
        tool_call_id: String,
        tool_name: String,
        arguments: String,
    },
    ToolResponse {
        tool_call_id: String,
        tool_name: String,
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        output_format: Option<String>,
    },
}

impl ContentBlock {
    pub fn text(content: impl Into<String>) -> Self {
        Self::Text {
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::System {
            content: content.into(),
        }
    }

    pub fn ai_hidden(content: impl Into<String>) -> Self {
        Self::AiHidden {
            content: content.into(),
        }
    }

    /// Provider-facing rendering. `System` blocks render to nothing here.
    pub fn render(&self) -> Option<String> {
        match self {
            Self::Text { content } | Self::AiHidden { content } => Some(content.clone()),
            Self::System { .. } => None,
            Self::ToolCall {
                tool_name,
                arguments,
                ..
            } => Some(format!("Tool call {tool_name}: {arguments}")),
            Self::ToolResponse {
                tool_name, content, ..
            } => Some(format!("Tool {tool_name} result:\n{content}")),
        }
    }
}

/// One immutable node of a conversation tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: MessageId,
    #[serde(default)]
    pub parent_id: Option<MessageId>,
    pub role: MessageRole,
    pub content: Vec<ContentBlock>,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_info: Option<CostInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

impl Message {
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    pub fn cost(&self) -> f64 {
        self.cost_info
            .as_ref()
            .map(|cost| cost.total_cost)
            .unwrap_or(0.0)
    }

    /// User-visible text: the `Text` blocks joined with a blank line.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { content } => Some(content.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    pub fn rendered_content(&self) -> String {
        self.content
            .iter()
            .filter_map(ContentBlock::render)
            .filter(|content| !content.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    pub fn system_content(&self) -> impl Iterator<Item = &str> {
        self.content.iter().filter_map(|block| match block {
            ContentBlock::System { content } => Some(content.as_str()),
            _ => None,
        })
    }

    pub fn tool_call_name(&self) -> Option<&str> {
        self.content.iter().find_map(|block| match block {
            ContentBlock::ToolCall { tool_name, .. } => Some(tool_name.as_str()),
            _ => None,
        })
    }
}

/// Everything needed to create a [`Message`]; the tree assigns parent and timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct MessagePayload {
    pub id: Option<MessageId>,
    pub role: MessageRole,
    pub content: Vec<ContentBlock>,
    pub attachments: Vec<Attachment>,
    pub cost_info: Option<CostInfo>,
    pub duration: Option<Duration>,
}

impl MessagePayload {
    pub fn new(role: MessageRole, content: Vec<ContentBlock>) -> Self {
        Self {
            id: None,
            role,
            content,
            attachments: Vec::new(),
            cost_info: None,
            duration: None,
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(MessageRole::User, vec![ContentBlock::text(text)])
    }

    pub fn ai(text: impl Into<String>) -> Self {
        Self::new(MessageRole::Ai, vec![ContentBlock::text(text)])
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new(MessageRole::System, vec![ContentBlock::text(text)])
    }

    pub fn with_id(mut self, id: MessageId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_block(mut self, block: ContentBlock) -> Self {
        self.content.push(block);
        self
    }

    pub fn with_attachments(mut self, attachments: Vec<Attachment>) -> Self {
        self.attachments = attachments;
        self
    }

    pub fn with_cost_info(mut self, cost_info: CostInfo) -> Self {
        self.cost_info = Some(cost_info);
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    pub(crate) fn into_message(self, parent_id: Option<MessageId>) -> Message {
        Message {
            id: self.id.unwrap_or_else(MessageId::generate),
            parent_id,
            role: self.role,
            content: self.content,
            timestamp: Utc::now(),
            attachments: self.attachments,
            cost_info: self.cost_info,
            duration_ms: self
                .duration
                .map(|duration| u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_blocks_use_tagged_camel_case() {
        let block = ContentBlock::ToolResponse {
            tool_call_id: "call_1".to_string(),
            tool_name: "Stop".to_string(),
            content: "Stopped".to_string(),
            output_format: None,
        };

        let json = serde_json::to_value(&block).expect("block should serialize");
        assert_eq!(json["type"], "toolResponse");
        assert_eq!(json["toolCallId"], "call_1");
        assert!(json.get("outputFormat").is_none());

        let parsed: ContentBlock = serde_json::from_value(json).expect("block should parse");
        assert_eq!(parsed, block);
    }

    #[test]
    fn rendering_skips_system_blocks() {
        let message = MessagePayload::user("hello")
            .with_block(ContentBlock::system("be kind"))
            .with_block(ContentBlock::ai_hidden("context"))
            .into_message(None);

        assert_eq!(message.rendered_content(), "hello\n\ncontext");
        assert_eq!(message.text(), "hello");
        assert_eq!(message.system_content().collect::<Vec<_>>(), vec!["be kind"]);
    }

    #[test]
    fn payload_keeps_preassigned_id_and_duration() {
        let id = MessageId::new("ai-1");
        let message = MessagePayload::ai("done")
            .with_id(id.clone())
            .with_duration(Duration::from_millis(250))
            .into_message(Some(MessageId::new("root")));

        assert_eq!(message.id, id);
        assert_eq!(message.duration_ms, Some(250));
        assert!(!message.is_root());
        assert_eq!(message.cost(), 0.0);
    }
}
