//! Branching conversation history.
//!
//! Messages are never mutated once added. Editing appends a sibling branch
//! under the edited node's parent, so every earlier branch stays reachable.
//!
//! ```rust
//! use pchat::{ConversationTree, MessagePayload};
//!
//! let mut tree = ConversationTree::new("conv-1");
//! let root = tree.add_message(None, MessagePayload::user("hi")).unwrap();
//! let reply = tree.add_message(Some(&root), MessagePayload::ai("hello")).unwrap();
//!
//! let edited = tree.edit_message(&root, MessagePayload::user("hey")).unwrap();
//! assert_eq!(tree.root_ids().len(), 2);
//! assert!(tree.contains(&reply));
//! assert_eq!(tree.active_leaf(), Some(&edited));
//! ```

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use pcommon::{ConversationId, MessageId};
use serde::{Deserialize, Serialize};

use crate::{Message, MessagePayload, MessageRole, TreeError, TreeErrorKind};

pub const DEFAULT_SUMMARY: &str = "New Conversation";
const SUMMARY_MAX_CHARS: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationTree {
    pub id: ConversationId,
    messages: BTreeMap<MessageId, Message>,
    root_ids: Vec<MessageId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    summary: Option<String>,
    #[serde(default)]
    active_leaf: Option<MessageId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ConversationTree {
    pub fn new(id: impl Into<ConversationId>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            messages: BTreeMap::new(),
            root_ids: Vec::new(),
            summary: None,
            active_leaf: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn get(&self, id: &MessageId) -> Option<&Message> {
        self.messages.get(id)
    }

    pub fn contains(&self, id: &MessageId) -> bool {
        self.messages.contains_key(id)
    }

    pub fn messages(&self) -> impl Iterator<Item = &Message> {
        self.messages.values()
    }

    pub fn root_ids(&self) -> &[MessageId] {
        &self.root_ids
    }

    /// Appends a message under `parent`. `None` is only accepted for the
    /// first message of an empty tree.
    pub fn add_message(
        &mut self,
        parent: Option<&MessageId>,
        payload: MessagePayload,
    ) -> Result<MessageId, TreeError> {
        match parent {
            Some(parent_id) if !self.messages.contains_key(parent_id) => {
                return Err(TreeError::invalid_parent(format!(
                    "parent message '{parent_id}' does not exist"
                ))
                .with_message_id(parent_id.clone()));
            }
            None if !self.messages.is_empty() => {
                return Err(TreeError::invalid_parent(
                    "a parent is required once the conversation has messages",
                ));
            }
            _ => {}
        }

        self.insert(payload.into_message(parent.cloned()))
    }

    /// Creates a sibling of `node_id` carrying `payload` and makes it the
    /// active leaf. Editing a root creates a new root.
    pub fn edit_message(
        &mut self,
        node_id: &MessageId,
        payload: MessagePayload,
    ) -> Result<MessageId, TreeError> {
        let original = self
            .messages
            .get(node_id)
            .ok_or_else(|| TreeError::not_found(node_id))?;

        if original.role != payload.role {
            return Err(TreeError::invalid_edit(format!(
                "cannot replace a {:?} message with a {:?} message",
                original.role, payload.role
            ))
            .with_message_id(node_id.clone()));
        }

        let parent_id = original.parent_id.clone();
        self.insert(payload.into_message(parent_id))
    }

    fn insert(&mut self, message: Message) -> Result<MessageId, TreeError> {
        let id = message.id.clone();
        if self.messages.contains_key(&id) {
            return Err(TreeError::invalid_edit(format!(
                "message '{id}' already exists"
            )));
        }

        if message.parent_id.is_none() {
            self.root_ids.push(id.clone());
        }
        self.messages.insert(id.clone(), message);
        self.active_leaf = Some(id.clone());
        self.touch();
        Ok(id)
    }

    /// Children of `id`, oldest first.
    pub fn children(&self, id: &MessageId) -> Vec<&Message> {
        let mut children = self
            .messages
            .values()
            .filter(|message| message.parent_id.as_ref() == Some(id))
            .collect::<Vec<_>>();
        children.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));
        children
    }

    /// Root-to-`id` path, inclusive on both ends.
    pub fn path_to(&self, id: &MessageId) -> Result<Vec<&Message>, TreeError> {
        let mut current = self
            .messages
            .get(id)
            .ok_or_else(|| TreeError::not_found(id))?;
        let mut path = vec![current];

        while let Some(parent_id) = &current.parent_id {
            if path.len() > self.messages.len() {
                return Err(TreeError::cycle(id));
            }
            current = self
                .messages
                .get(parent_id)
                .ok_or_else(|| TreeError::broken_parent_link(&current.id, parent_id))?;
            path.push(current);
        }

        path.reverse();
        Ok(path)
    }

    pub fn depth(&self, id: &MessageId) -> Result<usize, TreeError> {
        self.path_to(id).map(|path| path.len())
    }

    /// Sum of recorded costs along the root path of `id`.
    pub fn cumulative_cost(&self, id: &MessageId) -> Result<f64, TreeError> {
        Ok(self.path_to(id)?.iter().map(|message| message.cost()).sum())
    }

    pub fn leaves(&self) -> Vec<&Message> {
        let parents = self
            .messages
            .values()
            .filter_map(|message| message.parent_id.as_ref())
            .collect::<HashSet<_>>();

        let mut leaves = self
            .messages
            .values()
            .filter(|message| !parents.contains(&message.id))
            .collect::<Vec<_>>();
        leaves.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));
        leaves
    }

    /// The explicitly active leaf, else the newest message.
    pub fn active_leaf(&self) -> Option<&MessageId> {
        self.active_leaf
            .as_ref()
            .filter(|id| self.messages.contains_key(*id))
            .or_else(|| {
                self.messages
                    .values()
                    .max_by(|a, b| a.timestamp.cmp(&b.timestamp))
                    .map(|message| &message.id)
            })
    }

    pub fn set_active_leaf(&mut self, id: &MessageId) -> Result<(), TreeError> {
        if !self.messages.contains_key(id) {
            return Err(TreeError::not_found(id));
        }
        self.active_leaf = Some(id.clone());
        Ok(())
    }

    /// Checks structural invariants of a tree that came from outside, such as a store.
    pub fn validate(&self) -> Result<(), TreeError> {
        for root_id in &self.root_ids {
            match self.messages.get(root_id) {
                Some(root) if root.parent_id.is_none() => {}
                Some(_) => {
                    return Err(TreeError::invalid_parent(format!(
                        "root '{root_id}' has a parent"
                    ))
                    .with_message_id(root_id.clone()));
                }
                None => return Err(TreeError::not_found(root_id)),
            }
        }

        let roots = self.root_ids.iter().collect::<HashSet<_>>();
        for (key, message) in &self.messages {
            if key != &message.id {
                return Err(TreeError::new(
                    TreeErrorKind::BrokenParentLink,
                    format!("message stored under '{key}' has id '{}'", message.id),
                )
                .with_message_id(key.clone()));
            }
            if message.parent_id.is_none() && !roots.contains(&message.id) {
                return Err(TreeError::invalid_parent(format!(
                    "message '{}' has no parent and is not a root",
                    message.id
                ))
                .with_message_id(message.id.clone()));
            }
            self.path_to(&message.id)?;
        }

        Ok(())
    }

    /// Stored summary, else the first user message truncated, else a placeholder.
    pub fn summary(&self) -> String {
        if let Some(summary) = self.summary.as_ref().filter(|s| !s.trim().is_empty()) {
            return summary.clone();
        }

        self.messages
            .values()
            .filter(|message| message.role == MessageRole::User)
            .min_by(|a, b| a.timestamp.cmp(&b.timestamp))
            .map(|message| message.text())
            .filter(|text| !text.trim().is_empty())
            .map(|text| truncate_chars(text.trim(), SUMMARY_MAX_CHARS))
            .unwrap_or_else(|| DEFAULT_SUMMARY.to_string())
    }

    pub fn set_summary(&mut self, summary: impl Into<String>) {
        self.summary = Some(summary.into());
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Fits `text` into the summary limit, ellipsis included.
pub(crate) fn clamp_summary(text: &str) -> String {
    if text.chars().count() <= SUMMARY_MAX_CHARS {
        return text.to_string();
    }
    truncate_chars(text, SUMMARY_MAX_CHARS - 3)
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => format!("{}...", &text[..end]),
        None => text.to_string(),
    }
}
