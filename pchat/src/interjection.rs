//! Per-client pending interjections.

use std::collections::HashMap;
use std::sync::Mutex;

use pcommon::ClientId;

use crate::ChatError;

/// Holds at most one pending interjection per client. A newer one replaces
/// the older.
#[derive(Debug, Default)]
pub struct InterjectionBox {
    pending: Mutex<HashMap<ClientId, String>>,
}

impl InterjectionBox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&self, client_id: &ClientId, text: impl Into<String>) -> Result<(), ChatError> {
        self.lock()?.insert(client_id.clone(), text.into());
        Ok(())
    }

    pub fn take(&self, client_id: &ClientId) -> Result<Option<String>, ChatError> {
        Ok(self.lock()?.remove(client_id))
    }

    pub fn has_pending(&self, client_id: &ClientId) -> Result<bool, ChatError> {
        Ok(self.lock()?.contains_key(client_id))
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<ClientId, String>>, ChatError> {
        self.pending
            .lock()
            .map_err(|_| ChatError::invalid_request("interjection lock poisoned"))
    }
}
