use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use pchat::{ChatError, ChatFuture, ConversationStore, ConversationTree};
use pcommon::{ConversationId, MessageId};

use crate::error::MemoryError;

const CONVERSATIONS_DIR: &str = "conversations";

/// One pretty-printed JSON file per conversation under `<root>/conversations`.
///
/// File names are the hex-encoded conversation id, so any id is a safe file
/// name. Writes go through a temporary file and a rename.
#[derive(Debug)]
pub struct FilesystemConversationStore {
    root: PathBuf,
    lock: Mutex<()>,
}

impl FilesystemConversationStore {
    pub fn new(root: impl AsRef<Path>) -> Result<Self, MemoryError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(root.join(CONVERSATIONS_DIR)).map_err(|error| {
            MemoryError::storage(format!("failed to create conversation store root: {error}"))
        })?;
        Ok(Self {
            root,
            lock: Mutex::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn conversations_dir(&self) -> PathBuf {
        self.root.join(CONVERSATIONS_DIR)
    }

    fn conversation_path(&self, id: &ConversationId) -> PathBuf {
        self.conversations_dir()
            .join(format!("{}.json", hex_encode(id.as_str().as_bytes())))
    }

    fn guard(&self) -> Result<MutexGuard<'_, ()>, MemoryError> {
        self.lock
            .lock()
            .map_err(|_| MemoryError::storage("filesystem store lock poisoned"))
    }

    fn read_tree(&self, path: &Path) -> Result<ConversationTree, MemoryError> {
        let bytes = fs::read(path).map_err(|error| {
            MemoryError::storage(format!("failed to read conversation file: {error}"))
        })?;
        let tree = serde_json::from_slice::<ConversationTree>(&bytes)?;
        tree.validate().map_err(|error| {
            MemoryError::storage(format!(
                "conversation '{}' failed validation: {error}",
                tree.id
            ))
        })?;
        Ok(tree)
    }

    fn load(&self, id: &ConversationId) -> Result<ConversationTree, MemoryError> {
        let path = self.conversation_path(id);
        if !path.exists() {
            return Err(MemoryError::not_found(format!(
                "conversation '{id}' does not exist"
            )));
        }
        self.read_tree(&path)
    }

    fn save(&self, tree: &ConversationTree) -> Result<(), MemoryError> {
        let bytes = serde_json::to_vec_pretty(tree)?;
        write_atomic(&self.conversation_path(&tree.id), &bytes)
    }

    /// Unreadable or partially written files are skipped with a warning.
    fn load_all(&self) -> Result<Vec<ConversationTree>, MemoryError> {
        let entries = fs::read_dir(self.conversations_dir()).map_err(|error| {
            MemoryError::storage(format!("failed to list conversation files: {error}"))
        })?;

        let mut trees = Vec::new();
        for entry in entries {
            let path = match entry {
                Ok(entry) => entry.path(),
                Err(error) => {
                    tracing::warn!(phase = "store", event = "entry_skipped", error = %error);
                    continue;
                }
            };
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            match self.read_tree(&path) {
                Ok(tree) => trees.push(tree),
                Err(error) => {
                    tracing::warn!(
                        phase = "store",
                        event = "conversation_skipped",
                        path = %path.display(),
                        error = %error
                    );
                }
            }
        }

        trees.sort_by(|left, right| {
            right
                .updated_at
                .cmp(&left.updated_at)
                .then_with(|| left.id.cmp(&right.id))
        });
        Ok(trees)
    }

    fn delete(&self, id: &ConversationId) -> Result<(), MemoryError> {
        let path = self.conversation_path(id);
        if !path.exists() {
            return Ok(());
        }
        fs::remove_file(&path).map_err(|error| {
            MemoryError::storage(format!("failed to delete conversation file: {error}"))
        })
    }
}

impl ConversationStore for FilesystemConversationStore {
    fn load_conversation<'a>(
        &'a self,
        id: &'a ConversationId,
    ) -> ChatFuture<'a, Result<ConversationTree, ChatError>> {
        Box::pin(async move {
            let _guard = self.guard()?;
            Ok(self.load(id)?)
        })
    }

    fn save_conversation<'a>(
        &'a self,
        tree: &'a ConversationTree,
    ) -> ChatFuture<'a, Result<(), ChatError>> {
        Box::pin(async move {
            let _guard = self.guard()?;
            self.save(tree)?;
            tracing::debug!(phase = "store", event = "saved", conversation = %tree.id, messages = tree.len());
            Ok(())
        })
    }

    fn all_conversations<'a>(&'a self) -> ChatFuture<'a, Result<Vec<ConversationTree>, ChatError>> {
        Box::pin(async move {
            let _guard = self.guard()?;
            Ok(self.load_all()?)
        })
    }

    fn find_by_message_id<'a>(
        &'a self,
        message_id: &'a MessageId,
    ) -> ChatFuture<'a, Result<ConversationTree, ChatError>> {
        Box::pin(async move {
            let _guard = self.guard()?;
            self.load_all()?
                .into_iter()
                .find(|tree| tree.contains(message_id))
                .ok_or_else(|| {
                    ChatError::not_found(format!(
                        "no conversation contains message '{message_id}'"
                    ))
                })
        })
    }

    fn delete_conversation<'a>(
        &'a self,
        id: &'a ConversationId,
    ) -> ChatFuture<'a, Result<(), ChatError>> {
        Box::pin(async move {
            let _guard = self.guard()?;
            self.delete(id)?;
            tracing::info!(phase = "store", event = "deleted", conversation = %id);
            Ok(())
        })
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), MemoryError> {
    let Some(parent) = path.parent() else {
        return Err(MemoryError::storage(
            "conversation file missing parent directory",
        ));
    };
    fs::create_dir_all(parent).map_err(|error| {
        MemoryError::storage(format!("failed to create parent directory: {error}"))
    })?;

    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, bytes).map_err(|error| {
        MemoryError::storage(format!("failed to write temporary conversation file: {error}"))
    })?;

    if path.exists() {
        fs::remove_file(path).map_err(|error| {
            MemoryError::storage(format!("failed to replace conversation file: {error}"))
        })?;
    }
    fs::rename(&tmp, path).map_err(|error| {
        MemoryError::storage(format!("failed to finalize conversation file: {error}"))
    })
}

fn hex_encode(input: &[u8]) -> String {
    let mut output = String::with_capacity(input.len() * 2);
    for byte in input {
        output.push(nibble_to_hex(byte >> 4));
        output.push(nibble_to_hex(byte & 0x0f));
    }
    output
}

fn nibble_to_hex(nibble: u8) -> char {
    match nibble {
        0..=9 => (b'0' + nibble) as char,
        10..=15 => (b'a' + (nibble - 10)) as char,
        _ => '0',
    }
}
