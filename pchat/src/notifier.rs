//! Outbound notifications raised by the chat layer.

use chrono::{DateTime, Utc};
use pcommon::{ClientId, ConversationId, MessageId};
use serde::{Deserialize, Serialize};

use crate::Message;

/// Where a conversation update originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UpdateSource {
    User,
    Ai,
    Tool,
    System,
}

impl UpdateSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Ai => "ai",
            Self::Tool => "tool",
            Self::System => "system",
        }
    }
}

/// Receives chat events for delivery to clients. Implementations must not
/// block: the tool loop calls these inline.
pub trait ChatNotifier: Send + Sync {
    fn streaming_delta(
        &self,
        _client_id: &ClientId,
        _conversation_id: &ConversationId,
        _message_id: &MessageId,
        _delta: &str,
    ) {
    }

    fn streaming_complete(
        &self,
        _client_id: &ClientId,
        _conversation_id: &ConversationId,
        _message_id: &MessageId,
    ) {
    }

    fn conversation_updated(
        &self,
        _client_id: &ClientId,
        _conversation_id: &ConversationId,
        _message: &Message,
        _source: UpdateSource,
    ) {
    }

    fn conversation_list_changed(
        &self,
        _conversation_id: &ConversationId,
        _summary: &str,
        _last_modified: DateTime<Utc>,
    ) {
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopChatNotifier;

impl ChatNotifier for NoopChatNotifier {}
