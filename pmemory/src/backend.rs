use std::path::PathBuf;
use std::sync::Arc;

use pchat::{ConversationStore, InMemoryConversationStore};
use serde::{Deserialize, Serialize};

use crate::error::MemoryError;
use crate::filesystem::FilesystemConversationStore;

pub const DEFAULT_DATA_DIR: &str = ".parley";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum StoreConfig {
    Filesystem { root: PathBuf },
    InMemory,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::Filesystem {
            root: PathBuf::from(DEFAULT_DATA_DIR),
        }
    }
}

pub fn create_conversation_store(
    config: StoreConfig,
) -> Result<Arc<dyn ConversationStore>, MemoryError> {
    match config {
        StoreConfig::Filesystem { root } => {
            tracing::info!(phase = "store", event = "open", backend = "filesystem", root = %root.display());
            Ok(Arc::new(FilesystemConversationStore::new(root)?))
        }
        StoreConfig::InMemory => {
            tracing::info!(phase = "store", event = "open", backend = "in_memory");
            Ok(Arc::new(InMemoryConversationStore::new()))
        }
    }
}
