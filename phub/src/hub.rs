use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use pchat::{ChatNotifier, Message, UpdateSource};
use pcommon::{ClientId, ConversationId, MessageId};
use ptooling::StatusReporter;
use tokio::sync::mpsc;

use crate::envelope::ServerMessage;
use crate::error::HubError;

/// Outbound half of one client connection.
#[derive(Debug, Clone)]
pub struct ClientChannel {
    sender: mpsc::UnboundedSender<ServerMessage>,
}

impl ClientChannel {
    pub fn new(sender: mpsc::UnboundedSender<ServerMessage>) -> Self {
        Self { sender }
    }

    pub fn unbounded() -> (Self, mpsc::UnboundedReceiver<ServerMessage>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self::new(sender), receiver)
    }

    pub fn send(&self, message: ServerMessage) -> Result<(), HubError> {
        self.sender
            .send(message)
            .map_err(|_| HubError::channel("client channel is closed"))
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    fn same_channel(&self, other: &Self) -> bool {
        self.sender.same_channel(&other.sender)
    }
}

/// Registry of connected clients. Delivery is best-effort: a channel that
/// fails a send is dropped from the registry and the failure is logged.
#[derive(Debug, Default)]
pub struct NotificationHub {
    clients: RwLock<HashMap<ClientId, ClientChannel>>,
}

impl NotificationHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces any channel already registered under `client_id`.
    pub fn register(&self, client_id: ClientId, channel: ClientChannel) -> Result<(), HubError> {
        let replaced = self.write()?.insert(client_id.clone(), channel).is_some();
        tracing::info!(phase = "hub", event = "register", client = %client_id, replaced);
        Ok(())
    }

    pub fn unregister(&self, client_id: &ClientId) -> Result<(), HubError> {
        if self.write()?.remove(client_id).is_some() {
            tracing::info!(phase = "hub", event = "unregister", client = %client_id);
        }
        Ok(())
    }

    pub fn is_registered(&self, client_id: &ClientId) -> bool {
        self.read()
            .map(|clients| clients.contains_key(client_id))
            .unwrap_or(false)
    }

    pub fn client_count(&self) -> usize {
        self.read().map(|clients| clients.len()).unwrap_or(0)
    }

    /// Unknown clients are ignored.
    pub fn send_to_client(&self, client_id: &ClientId, message: ServerMessage) {
        let failed = {
            let clients = match self.read() {
                Ok(clients) => clients,
                Err(error) => {
                    tracing::warn!(phase = "hub", event = "send_skipped", client = %client_id, error = %error);
                    return;
                }
            };
            let Some(channel) = clients.get(client_id) else {
                tracing::debug!(phase = "hub", event = "send_unregistered", client = %client_id, kind = message.kind());
                return;
            };
            let kind = message.kind();
            match channel.send(message) {
                Ok(()) => None,
                Err(error) => {
                    tracing::warn!(phase = "hub", event = "send_failed", client = %client_id, kind, error = %error);
                    Some(channel.clone())
                }
            }
        };

        if let Some(channel) = failed {
            self.evict(client_id, &channel);
        }
    }

    pub fn broadcast(&self, message: ServerMessage) {
        let failed: Vec<(ClientId, ClientChannel)> = {
            let clients = match self.read() {
                Ok(clients) => clients,
                Err(error) => {
                    tracing::warn!(phase = "hub", event = "broadcast_skipped", error = %error);
                    return;
                }
            };
            clients
                .iter()
                .filter(|(_, channel)| channel.send(message.clone()).is_err())
                .map(|(client_id, channel)| (client_id.clone(), channel.clone()))
                .collect()
        };

        for (client_id, channel) in failed {
            tracing::warn!(phase = "hub", event = "send_failed", client = %client_id, kind = message.kind());
            self.evict(&client_id, &channel);
        }
    }

    /// Removes `client_id` only if it still maps to the failed channel.
    fn evict(&self, client_id: &ClientId, failed: &ClientChannel) {
        let Ok(mut clients) = self.write() else {
            return;
        };
        if clients
            .get(client_id)
            .is_some_and(|current| current.same_channel(failed))
        {
            clients.remove(client_id);
            tracing::info!(phase = "hub", event = "evicted", client = %client_id);
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<ClientId, ClientChannel>>, HubError> {
        self.clients
            .read()
            .map_err(|_| HubError::channel("client registry lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<ClientId, ClientChannel>>, HubError> {
        self.clients
            .write()
            .map_err(|_| HubError::channel("client registry lock poisoned"))
    }
}

impl StatusReporter for NotificationHub {
    fn report_status(&self, client_id: &ClientId, message: &str) {
        self.send_to_client(client_id, ServerMessage::status(message));
    }
}

impl ChatNotifier for NotificationHub {
    fn streaming_delta(
        &self,
        client_id: &ClientId,
        conversation_id: &ConversationId,
        message_id: &MessageId,
        delta: &str,
    ) {
        self.send_to_client(
            client_id,
            ServerMessage::StreamingDelta {
                conversation_id: conversation_id.clone(),
                message_id: message_id.clone(),
                content: delta.to_string(),
            },
        );
    }

    fn streaming_complete(
        &self,
        client_id: &ClientId,
        conversation_id: &ConversationId,
        message_id: &MessageId,
    ) {
        self.send_to_client(
            client_id,
            ServerMessage::StreamingComplete {
                conversation_id: conversation_id.clone(),
                message_id: message_id.clone(),
            },
        );
    }

    fn conversation_updated(
        &self,
        client_id: &ClientId,
        conversation_id: &ConversationId,
        message: &Message,
        source: UpdateSource,
    ) {
        self.send_to_client(
            client_id,
            ServerMessage::ConversationUpdate {
                conversation_id: conversation_id.clone(),
                message: message.clone(),
                source,
            },
        );
    }

    fn conversation_list_changed(
        &self,
        conversation_id: &ConversationId,
        summary: &str,
        last_modified: DateTime<Utc>,
    ) {
        self.broadcast(ServerMessage::ConversationList {
            conversation_id: conversation_id.clone(),
            summary: summary.to_string(),
            last_modified,
        });
    }
}
