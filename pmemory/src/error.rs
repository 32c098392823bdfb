//! Storage-layer errors for conversation persistence.

use std::error::Error;
use std::fmt::{Display, Formatter};

use pchat::ChatError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryErrorKind {
    Storage,
    NotFound,
    InvalidRequest,
    Serialization,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryError {
    pub kind: MemoryErrorKind,
    pub message: String,
}

impl MemoryError {
    pub fn new(kind: MemoryErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::new(MemoryErrorKind::Storage, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(MemoryErrorKind::NotFound, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(MemoryErrorKind::InvalidRequest, message)
    }

    pub fn serialization(message: impl Into<String>) -> Self {
        Self::new(MemoryErrorKind::Serialization, message)
    }
}

impl Display for MemoryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl Error for MemoryError {}

impl From<serde_json::Error> for MemoryError {
    fn from(error: serde_json::Error) -> Self {
        Self::serialization(error.to_string())
    }
}

impl From<MemoryError> for ChatError {
    fn from(error: MemoryError) -> Self {
        match error.kind {
            MemoryErrorKind::NotFound => ChatError::not_found(error.message),
            MemoryErrorKind::InvalidRequest => ChatError::invalid_request(error.message),
            MemoryErrorKind::Storage | MemoryErrorKind::Serialization => {
                ChatError::store(error.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use pchat::ChatErrorKind;

    use super::*;

    #[test]
    fn missing_conversations_stay_not_found_at_the_chat_layer() {
        let chat: ChatError = MemoryError::not_found("conversation 'c1' does not exist").into();
        assert_eq!(chat.kind, ChatErrorKind::NotFound);
        assert!(chat.is_not_found());
    }

    #[test]
    fn storage_failures_surface_as_store_errors() {
        let chat: ChatError = MemoryError::storage("disk full").into();
        assert_eq!(chat.kind, ChatErrorKind::Store);
        assert!(chat.message.contains("disk full"));
    }
}
