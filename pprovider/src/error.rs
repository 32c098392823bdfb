//! Failures raised while talking to an upstream model API.
//!
//! The gateway never lets these escape a loop: they are folded into a
//! terminal `ModelResponse` with `success == false`. `retryable` drives
//! [`crate::RetryPolicy`].
//!
//! ```rust
//! use pprovider::{ProviderError, ProviderErrorKind};
//!
//! let limited = ProviderError::from_status(429, "slow down");
//! assert_eq!(limited.kind, ProviderErrorKind::RateLimited);
//! assert_eq!(limited.status, Some(429));
//! assert!(limited.retryable);
//!
//! assert!(!ProviderError::authentication("bad key").retryable);
//! ```

use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    Authentication,
    RateLimited,
    InvalidRequest,
    Timeout,
    Transport,
    Unavailable,
    Cancelled,
    Other,
}

impl ProviderErrorKind {
    /// Whether a failure of this kind is worth another attempt.
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            Self::RateLimited | Self::Timeout | Self::Transport | Self::Unavailable
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderError {
    pub kind: ProviderErrorKind,
    pub message: String,
    pub retryable: bool,
    /// HTTP status of the upstream reply, when there was one.
    pub status: Option<u16>,
}

impl ProviderError {
    pub fn new(kind: ProviderErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            retryable: kind.is_transient(),
            status: None,
        }
    }

    /// Classifies a non-success HTTP status from an OpenAI-style endpoint.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let kind = match status {
            401 | 403 => ProviderErrorKind::Authentication,
            429 => ProviderErrorKind::RateLimited,
            408 | 504 => ProviderErrorKind::Timeout,
            400 | 422 => ProviderErrorKind::InvalidRequest,
            502 | 503 => ProviderErrorKind::Unavailable,
            _ => ProviderErrorKind::Transport,
        };
        Self::new(kind, message).with_status(status)
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Authentication, message)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::RateLimited, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::InvalidRequest, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Timeout, message)
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Transport, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Unavailable, message)
    }

    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Cancelled, message)
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Other, message)
    }

    pub fn is_cancelled(&self) -> bool {
        self.kind == ProviderErrorKind::Cancelled
    }
}

impl Display for ProviderError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl Error for ProviderError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_without_a_dedicated_kind_are_transport_failures() {
        let error = ProviderError::from_status(500, "boom");
        assert_eq!(error.kind, ProviderErrorKind::Transport);
        assert!(error.retryable);
        assert_eq!(error.to_string(), "Transport: boom");
    }

    #[test]
    fn http_statuses_map_onto_kinds() {
        let cases = [
            (401, ProviderErrorKind::Authentication, false),
            (403, ProviderErrorKind::Authentication, false),
            (408, ProviderErrorKind::Timeout, true),
            (400, ProviderErrorKind::InvalidRequest, false),
            (422, ProviderErrorKind::InvalidRequest, false),
            (502, ProviderErrorKind::Unavailable, true),
            (503, ProviderErrorKind::Unavailable, true),
            (504, ProviderErrorKind::Timeout, true),
        ];
        for (status, kind, retryable) in cases {
            let error = ProviderError::from_status(status, "x");
            assert_eq!((error.kind, error.retryable), (kind, retryable), "{status}");
        }
    }

    #[test]
    fn cancellation_is_final() {
        let error = ProviderError::cancelled("client went away");
        assert!(error.is_cancelled());
        assert!(!error.retryable);
        assert_eq!(error.status, None);
    }
}
