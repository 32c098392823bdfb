//! Conversation persistence for parley.
//!
//! ```rust
//! use pmemory::prelude::*;
//!
//! let store = create_conversation_store(StoreConfig::InMemory).unwrap();
//! # let _ = store;
//! ```

mod backend;
mod error;
mod filesystem;

pub mod prelude {
    pub use crate::{
        FilesystemConversationStore, MemoryError, MemoryErrorKind, StoreConfig,
        create_conversation_store,
    };
}

pub use backend::{DEFAULT_DATA_DIR, StoreConfig, create_conversation_store};
pub use error::{MemoryError, MemoryErrorKind};
pub use filesystem::FilesystemConversationStore;

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(prefix: &str) -> std::path::PathBuf {
        let unique = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("clock should be after unix epoch")
            .as_nanos();
        std::env::temp_dir().join(format!("pmemory-{prefix}-{unique}"))
    }

    #[test]
    fn filesystem_config_creates_the_conversations_directory() {
        let root = temp_dir("config");
        let store = create_conversation_store(StoreConfig::Filesystem { root: root.clone() })
            .expect("filesystem store should open");
        assert!(root.join("conversations").is_dir());

        drop(store);
        let _ = std::fs::remove_dir_all(root);
    }

    #[test]
    fn default_config_points_at_the_data_dir() {
        assert_eq!(
            StoreConfig::default(),
            StoreConfig::Filesystem {
                root: std::path::PathBuf::from(DEFAULT_DATA_DIR)
            }
        );
    }
}
