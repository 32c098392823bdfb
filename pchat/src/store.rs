//! Conversation storage contract and an in-memory implementation.

use std::collections::HashMap;
use std::sync::Mutex;

use pcommon::{BoxFuture, ConversationId, MessageId};

use crate::{ChatError, ConversationTree};

pub type ChatFuture<'a, T> = BoxFuture<'a, T>;

/// Persistence boundary for conversation trees.
///
/// Saves are whole-tree overwrites. Loading an unknown id yields a
/// [`crate::ChatErrorKind::NotFound`] error.
pub trait ConversationStore: Send + Sync {
    fn load_conversation<'a>(
        &'a self,
        id: &'a ConversationId,
    ) -> ChatFuture<'a, Result<ConversationTree, ChatError>>;

    fn save_conversation<'a>(
        &'a self,
        tree: &'a ConversationTree,
    ) -> ChatFuture<'a, Result<(), ChatError>>;

    /// Every stored tree, most recently updated first.
    fn all_conversations<'a>(&'a self) -> ChatFuture<'a, Result<Vec<ConversationTree>, ChatError>>;

    fn find_by_message_id<'a>(
        &'a self,
        message_id: &'a MessageId,
    ) -> ChatFuture<'a, Result<ConversationTree, ChatError>>;

    /// Removing an unknown id succeeds.
    fn delete_conversation<'a>(
        &'a self,
        id: &'a ConversationId,
    ) -> ChatFuture<'a, Result<(), ChatError>>;
}

#[derive(Debug, Default)]
pub struct InMemoryConversationStore {
    conversations: Mutex<HashMap<ConversationId, ConversationTree>>,
}

impl InMemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<ConversationId, ConversationTree>>, ChatError>
    {
        self.conversations
            .lock()
            .map_err(|_| ChatError::store("conversation store lock poisoned"))
    }
}

impl ConversationStore for InMemoryConversationStore {
    fn load_conversation<'a>(
        &'a self,
        id: &'a ConversationId,
    ) -> ChatFuture<'a, Result<ConversationTree, ChatError>> {
        Box::pin(async move {
            self.lock()?
                .get(id)
                .cloned()
                .ok_or_else(|| ChatError::not_found(format!("conversation '{id}' does not exist")))
        })
    }

    fn save_conversation<'a>(
        &'a self,
        tree: &'a ConversationTree,
    ) -> ChatFuture<'a, Result<(), ChatError>> {
        Box::pin(async move {
            self.lock()?.insert(tree.id.clone(), tree.clone());
            Ok(())
        })
    }

    fn all_conversations<'a>(&'a self) -> ChatFuture<'a, Result<Vec<ConversationTree>, ChatError>> {
        Box::pin(async move {
            let mut trees = self.lock()?.values().cloned().collect::<Vec<_>>();
            trees.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
            Ok(trees)
        })
    }

    fn find_by_message_id<'a>(
        &'a self,
        message_id: &'a MessageId,
    ) -> ChatFuture<'a, Result<ConversationTree, ChatError>> {
        Box::pin(async move {
            self.lock()?
                .values()
                .find(|tree| tree.contains(message_id))
                .cloned()
                .ok_or_else(|| {
                    ChatError::not_found(format!("no conversation contains message '{message_id}'"))
                })
        })
    }

    fn delete_conversation<'a>(
        &'a self,
        id: &'a ConversationId,
    ) -> ChatFuture<'a, Result<(), ChatError>> {
        Box::pin(async move {
            self.lock()?.remove(id);
            Ok(())
        })
    }
}
