//! Tree and chat-layer errors.

use std::error::Error;
use std::fmt::{Display, Formatter};

use pcommon::MessageId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeErrorKind {
    NotFound,
    InvalidParent,
    BrokenParentLink,
    Cycle,
    InvalidEdit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeError {
    pub kind: TreeErrorKind,
    pub message: String,
    pub message_id: Option<MessageId>,
}

impl TreeError {
    pub fn new(kind: TreeErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            message_id: None,
        }
    }

    pub fn not_found(message_id: &MessageId) -> Self {
        Self::new(
            TreeErrorKind::NotFound,
            format!("message '{message_id}' does not exist"),
        )
        .with_message_id(message_id.clone())
    }

    pub fn invalid_parent(message: impl Into<String>) -> Self {
        Self::new(TreeErrorKind::InvalidParent, message)
    }

    pub fn broken_parent_link(message_id: &MessageId, parent_id: &MessageId) -> Self {
        Self::new(
            TreeErrorKind::BrokenParentLink,
            format!("message '{message_id}' points at missing parent '{parent_id}'"),
        )
        .with_message_id(message_id.clone())
    }

    pub fn cycle(message_id: &MessageId) -> Self {
        Self::new(
            TreeErrorKind::Cycle,
            format!("parent chain of message '{message_id}' contains a cycle"),
        )
        .with_message_id(message_id.clone())
    }

    pub fn invalid_edit(message: impl Into<String>) -> Self {
        Self::new(TreeErrorKind::InvalidEdit, message)
    }

    pub fn with_message_id(mut self, message_id: MessageId) -> Self {
        self.message_id = Some(message_id);
        self
    }
}

impl Display for TreeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl Error for TreeError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatErrorKind {
    InvalidRequest,
    NotFound,
    /// Another loop already owns the conversation.
    Busy,
    Store,
    Tree,
    Tooling,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatError {
    pub kind: ChatErrorKind,
    pub message: String,
}

impl ChatError {
    pub fn new(kind: ChatErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ChatErrorKind::InvalidRequest, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ChatErrorKind::NotFound, message)
    }

    pub fn busy(message: impl Into<String>) -> Self {
        Self::new(ChatErrorKind::Busy, message)
    }

    pub fn store(message: impl Into<String>) -> Self {
        Self::new(ChatErrorKind::Store, message)
    }

    pub fn tree(message: impl Into<String>) -> Self {
        Self::new(ChatErrorKind::Tree, message)
    }

    pub fn tooling(message: impl Into<String>) -> Self {
        Self::new(ChatErrorKind::Tooling, message)
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == ChatErrorKind::NotFound
    }
}

impl Display for ChatError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl Error for ChatError {}

impl From<TreeError> for ChatError {
    fn from(value: TreeError) -> Self {
        match value.kind {
            TreeErrorKind::NotFound => ChatError::not_found(value.message),
            TreeErrorKind::InvalidParent | TreeErrorKind::InvalidEdit => {
                ChatError::invalid_request(value.message)
            }
            TreeErrorKind::BrokenParentLink | TreeErrorKind::Cycle => {
                ChatError::tree(value.to_string())
            }
        }
    }
}

impl From<pprovider::ProviderError> for ChatError {
    fn from(value: pprovider::ProviderError) -> Self {
        ChatError::invalid_request(value.to_string())
    }
}

impl From<ptooling::ToolError> for ChatError {
    fn from(value: ptooling::ToolError) -> Self {
        ChatError::tooling(value.to_string())
    }
}
