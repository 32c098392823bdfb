//! Hub-layer errors for the client channel server.

use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HubErrorKind {
    Bind,
    Handshake,
    Protocol,
    Channel,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubError {
    pub kind: HubErrorKind,
    pub message: String,
}

impl HubError {
    pub fn new(kind: HubErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn bind(message: impl Into<String>) -> Self {
        Self::new(HubErrorKind::Bind, message)
    }

    pub fn handshake(message: impl Into<String>) -> Self {
        Self::new(HubErrorKind::Handshake, message)
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::new(HubErrorKind::Protocol, message)
    }

    pub fn channel(message: impl Into<String>) -> Self {
        Self::new(HubErrorKind::Channel, message)
    }
}

impl Display for HubError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl Error for HubError {}

impl From<serde_json::Error> for HubError {
    fn from(error: serde_json::Error) -> Self {
        Self::protocol(format!("malformed envelope: {error}"))
    }
}
