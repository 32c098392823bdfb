//! Wire envelopes exchanged with clients.
//!
//! Every frame is a JSON object `{"messageType": ..., "content": ...}`.
//! Kinds without a body omit `content`.

use chrono::{DateTime, Utc};
use pchat::{ConversationTree, Message, SubmitRequest, UpdateSource};
use pcommon::{ClientId, ConversationId, MessageId, SamplingOptions};
use pprovider::Attachment;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "messageType",
    content = "content",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum ServerMessage {
    #[serde(rename = "clientId")]
    Assigned {
        client_id: ClientId,
    },
    StreamingDelta {
        conversation_id: ConversationId,
        message_id: MessageId,
        content: String,
    },
    StreamingComplete {
        conversation_id: ConversationId,
        message_id: MessageId,
    },
    Status {
        message: String,
    },
    ConversationUpdate {
        conversation_id: ConversationId,
        message: Message,
        source: UpdateSource,
    },
    ConversationList {
        conversation_id: ConversationId,
        summary: String,
        last_modified: DateTime<Utc>,
    },
    Conversation(ConversationTree),
    InterjectionAck,
    Pong,
    Error {
        message: String,
    },
}

impl ServerMessage {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    pub fn status(message: impl Into<String>) -> Self {
        Self::Status {
            message: message.into(),
        }
    }

    /// The `messageType` tag as it appears on the wire.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Assigned { .. } => "clientId",
            Self::StreamingDelta { .. } => "streamingDelta",
            Self::StreamingComplete { .. } => "streamingComplete",
            Self::Status { .. } => "status",
            Self::ConversationUpdate { .. } => "conversationUpdate",
            Self::ConversationList { .. } => "conversationList",
            Self::Conversation(_) => "conversation",
            Self::InterjectionAck => "interjectionAck",
            Self::Pong => "pong",
            Self::Error { .. } => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "messageType",
    content = "content",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum ClientMessage {
    Submit(SubmitPayload),
    Cancel,
    Interject { content: String },
    Ping,
    LoadConversation { conversation_id: ConversationId },
    LoadConversationList,
    DeleteConversation { conversation_id: ConversationId },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<ConversationId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_message_id: Option<MessageId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edit_of: Option<MessageId>,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_ids: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl SubmitPayload {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            conversation_id: None,
            parent_message_id: None,
            edit_of: None,
            content: content.into(),
            attachments: Vec::new(),
            model: None,
            system_prompt: None,
            tool_ids: None,
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn into_request(self, client_id: ClientId) -> SubmitRequest {
        let mut request =
            SubmitRequest::new(client_id, self.content).with_attachments(self.attachments);
        request.conversation_id = self.conversation_id;
        request.parent_message_id = self.parent_message_id;
        request.edit_of = self.edit_of;
        request.model = self.model;
        request.system_prompt = self.system_prompt;
        request.tool_ids = self.tool_ids;
        request.options = SamplingOptions {
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            ..SamplingOptions::default()
        };
        request
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn outbound_envelopes_use_message_type_and_content() {
        let delta = ServerMessage::StreamingDelta {
            conversation_id: ConversationId::new("c1"),
            message_id: MessageId::new("m1"),
            content: "Hel".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&delta).expect("serialize"),
            json!({
                "messageType": "streamingDelta",
                "content": {"conversationId": "c1", "messageId": "m1", "content": "Hel"}
            })
        );

        let assigned = ServerMessage::Assigned {
            client_id: ClientId::new("client-9"),
        };
        assert_eq!(
            serde_json::to_value(&assigned).expect("serialize"),
            json!({"messageType": "clientId", "content": {"clientId": "client-9"}})
        );
        assert_eq!(
            serde_json::to_value(ServerMessage::Pong).expect("serialize"),
            json!({"messageType": "pong"})
        );
    }

    #[test]
    fn kind_matches_the_serialized_tag() {
        let messages = vec![
            ServerMessage::status("working"),
            ServerMessage::error("nope"),
            ServerMessage::InterjectionAck,
            ServerMessage::ConversationList {
                conversation_id: ConversationId::new("c1"),
                summary: "hi".to_string(),
                last_modified: Utc::now(),
            },
        ];
        for message in messages {
            let value = serde_json::to_value(&message).expect("serialize");
            assert_eq!(value["messageType"], json!(message.kind()));
        }
    }

    #[test]
    fn inbound_submissions_accept_optional_fields() {
        let parsed: ClientMessage = serde_json::from_value(json!({
            "messageType": "submit",
            "content": {"conversationId": "c1", "content": "hi", "model": "gpt-4o"}
        }))
        .expect("parse submit");

        let ClientMessage::Submit(payload) = parsed else {
            panic!("expected submit");
        };
        let request = payload.into_request(ClientId::new("client-1"));
        assert_eq!(request.conversation_id, Some(ConversationId::new("c1")));
        assert_eq!(request.model.as_deref(), Some("gpt-4o"));
        assert!(request.edit_of.is_none());
    }

    #[test]
    fn inbound_control_messages_need_no_content() {
        let cancel: ClientMessage =
            serde_json::from_str(r#"{"messageType":"cancel"}"#).expect("parse cancel");
        assert_eq!(cancel, ClientMessage::Cancel);

        let load: ClientMessage = serde_json::from_str(
            r#"{"messageType":"loadConversation","content":{"conversationId":"c7"}}"#,
        )
        .expect("parse load");
        assert_eq!(
            load,
            ClientMessage::LoadConversation {
                conversation_id: ConversationId::new("c7")
            }
        );
    }

    #[test]
    fn unknown_kinds_are_rejected() {
        let error = serde_json::from_str::<ClientMessage>(r#"{"messageType":"explode"}"#);
        assert!(error.is_err());
    }
}
