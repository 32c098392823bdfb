use std::sync::Arc;

use pchat::ChatService;
use pcommon::ClientId;

use crate::envelope::{ClientMessage, ServerMessage};
use crate::hub::NotificationHub;

/// Routes inbound envelopes to the chat service and replies through the hub.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    chat: Arc<ChatService>,
    hub: Arc<NotificationHub>,
}

impl Dispatcher {
    pub fn new(chat: Arc<ChatService>, hub: Arc<NotificationHub>) -> Self {
        Self { chat, hub }
    }

    pub fn chat(&self) -> &Arc<ChatService> {
        &self.chat
    }

    pub fn hub(&self) -> &Arc<NotificationHub> {
        &self.hub
    }

    /// Parses one text frame. Malformed frames are answered with an error
    /// envelope and otherwise ignored.
    pub async fn handle_text(&self, client_id: &ClientId, text: &str) {
        match serde_json::from_str::<ClientMessage>(text) {
            Ok(message) => self.handle(client_id, message).await,
            Err(error) => {
                tracing::warn!(phase = "hub", event = "malformed_frame", client = %client_id, error = %error);
                self.hub.send_to_client(
                    client_id,
                    ServerMessage::error(format!("malformed message: {error}")),
                );
            }
        }
    }

    /// Submissions run on their own task so cancel and interject frames from
    /// the same client are still read while the loop is running.
    pub async fn handle(&self, client_id: &ClientId, message: ClientMessage) {
        match message {
            ClientMessage::Submit(payload) => {
                let chat = Arc::clone(&self.chat);
                let hub = Arc::clone(&self.hub);
                let request = payload.into_request(client_id.clone());
                tokio::spawn(async move {
                    let client_id = request.client_id.clone();
                    if let Err(error) = chat.submit(request).await {
                        tracing::warn!(phase = "hub", event = "submit_failed", client = %client_id, error = %error);
                        hub.send_to_client(&client_id, ServerMessage::error(error.to_string()));
                    }
                });
            }
            ClientMessage::Cancel => {
                if let Err(error) = self.chat.cancel(client_id) {
                    self.reply_error(client_id, error);
                }
            }
            ClientMessage::Interject { content } => match self.chat.interject(client_id, content) {
                Ok(()) => self
                    .hub
                    .send_to_client(client_id, ServerMessage::InterjectionAck),
                Err(error) => self.reply_error(client_id, error),
            },
            ClientMessage::Ping => self.hub.send_to_client(client_id, ServerMessage::Pong),
            ClientMessage::LoadConversation { conversation_id } => {
                match self.chat.load_conversation(&conversation_id).await {
                    Ok(tree) => self
                        .hub
                        .send_to_client(client_id, ServerMessage::Conversation(tree)),
                    Err(error) => self.reply_error(client_id, error),
                }
            }
            ClientMessage::LoadConversationList => match self.chat.conversation_list().await {
                Ok(summaries) => {
                    for summary in summaries {
                        self.hub.send_to_client(
                            client_id,
                            ServerMessage::ConversationList {
                                conversation_id: summary.conversation_id,
                                summary: summary.summary,
                                last_modified: summary.last_modified,
                            },
                        );
                    }
                }
                Err(error) => self.reply_error(client_id, error),
            },
            ClientMessage::DeleteConversation { conversation_id } => {
                if let Err(error) = self.chat.delete_conversation(&conversation_id).await {
                    self.reply_error(client_id, error);
                }
            }
        }
    }

    /// Per-connection cleanup once the socket is gone.
    pub fn disconnect(&self, client_id: &ClientId) {
        if let Err(error) = self.hub.unregister(client_id) {
            tracing::warn!(phase = "hub", event = "unregister_failed", client = %client_id, error = %error);
        }
        if let Err(error) = self.chat.disconnect(client_id) {
            tracing::warn!(phase = "hub", event = "disconnect_failed", client = %client_id, error = %error);
        }
    }

    fn reply_error(&self, client_id: &ClientId, error: pchat::ChatError) {
        tracing::debug!(phase = "hub", event = "request_failed", client = %client_id, error = %error);
        self.hub
            .send_to_client(client_id, ServerMessage::error(error.to_string()));
    }
}
