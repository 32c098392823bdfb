//! Per-client cancellation tokens.

use std::collections::HashMap;
use std::sync::Mutex;

use pcommon::ClientId;
use tokio_util::sync::CancellationToken;

use crate::ChatError;

/// Every loop started for a client gets a child of that client's token, so
/// one cancel stops all of the client's in-flight requests.
#[derive(Debug, Default)]
pub struct CancellationRegistry {
    tokens: Mutex<HashMap<ClientId, CancellationToken>>,
}

impl CancellationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&self, client_id: &ClientId) -> Result<CancellationToken, ChatError> {
        let mut tokens = self.lock()?;
        let parent = tokens
            .entry(client_id.clone())
            .or_insert_with(CancellationToken::new);
        if parent.is_cancelled() {
            *parent = CancellationToken::new();
        }
        Ok(parent.child_token())
    }

    /// Cancels everything in flight for `client_id`. Returns whether a token existed.
    pub fn cancel(&self, client_id: &ClientId) -> Result<bool, ChatError> {
        match self.lock()?.remove(client_id) {
            Some(token) => {
                token.cancel();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn lock(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<ClientId, CancellationToken>>, ChatError> {
        self.tokens
            .lock()
            .map_err(|_| ChatError::invalid_request("cancellation lock poisoned"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_reaches_every_token_of_the_client() {
        let registry = CancellationRegistry::new();
        let client = ClientId::new("c1");
        let first = registry.begin(&client).expect("begin");
        let second = registry.begin(&client).expect("begin");
        let other = registry.begin(&ClientId::new("c2")).expect("begin");

        assert!(registry.cancel(&client).expect("cancel"));
        assert!(first.is_cancelled());
        assert!(second.is_cancelled());
        assert!(!other.is_cancelled());
    }

    #[test]
    fn tokens_after_cancel_start_fresh() {
        let registry = CancellationRegistry::new();
        let client = ClientId::new("c1");
        registry.begin(&client).expect("begin");
        registry.cancel(&client).expect("cancel");

        assert!(!registry.begin(&client).expect("begin").is_cancelled());
        assert!(!registry.cancel(&ClientId::new("nobody")).expect("cancel"));
    }
}
