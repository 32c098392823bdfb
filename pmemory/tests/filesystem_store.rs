use std::path::PathBuf;

use pchat::{ChatErrorKind, ConversationStore, ConversationTree, MessagePayload};
use pcommon::{ConversationId, MessageId};
use pmemory::FilesystemConversationStore;

struct TempRoot(PathBuf);

impl TempRoot {
    fn new(prefix: &str) -> Self {
        let unique = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("clock should be after unix epoch")
            .as_nanos();
        Self(std::env::temp_dir().join(format!("pmemory-{prefix}-{unique}")))
    }
}

impl Drop for TempRoot {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.0);
    }
}

fn conversation(id: &str, text: &str) -> (ConversationTree, MessageId) {
    let mut tree = ConversationTree::new(id);
    let root = tree
        .add_message(None, MessagePayload::user(text))
        .expect("root message");
    let reply = tree
        .add_message(Some(&root), MessagePayload::ai("reply"))
        .expect("reply message");
    (tree, reply)
}

#[tokio::test]
async fn saved_conversations_survive_a_reopen() {
    let root = TempRoot::new("reopen");
    let (tree, _) = conversation("conv/with:odd chars", "hello");

    {
        let store = FilesystemConversationStore::new(&root.0).expect("store opens");
        store.save_conversation(&tree).await.expect("save");
    }

    let reopened = FilesystemConversationStore::new(&root.0).expect("store reopens");
    let loaded = reopened
        .load_conversation(&tree.id)
        .await
        .expect("load after reopen");
    assert_eq!(loaded, tree);
    assert_eq!(loaded.summary(), "hello");
}

#[tokio::test]
async fn saving_twice_overwrites_the_whole_tree() {
    let root = TempRoot::new("overwrite");
    let store = FilesystemConversationStore::new(&root.0).expect("store opens");
    let (mut tree, reply) = conversation("conv-1", "first");
    store.save_conversation(&tree).await.expect("first save");

    tree.add_message(Some(&reply), MessagePayload::user("second"))
        .expect("follow-up");
    store.save_conversation(&tree).await.expect("second save");

    let loaded = store.load_conversation(&tree.id).await.expect("load");
    assert_eq!(loaded.len(), 3);
    let leftovers = std::fs::read_dir(root.0.join("conversations"))
        .expect("dir")
        .filter_map(Result::ok)
        .filter(|entry| entry.path().to_string_lossy().ends_with(".tmp"))
        .count();
    assert_eq!(leftovers, 0);
}

#[tokio::test]
async fn unknown_conversations_are_not_found() {
    let root = TempRoot::new("missing");
    let store = FilesystemConversationStore::new(&root.0).expect("store opens");

    let error = store
        .load_conversation(&ConversationId::new("nope"))
        .await
        .expect_err("missing conversation");
    assert_eq!(error.kind, ChatErrorKind::NotFound);

    let error = store
        .find_by_message_id(&MessageId::new("nope"))
        .await
        .expect_err("missing message");
    assert_eq!(error.kind, ChatErrorKind::NotFound);
}

#[tokio::test]
async fn listing_is_newest_first_and_skips_corrupt_files() {
    let root = TempRoot::new("listing");
    let store = FilesystemConversationStore::new(&root.0).expect("store opens");

    let (older, _) = conversation("older", "old question");
    store.save_conversation(&older).await.expect("save older");
    std::thread::sleep(std::time::Duration::from_millis(5));
    let (newer, _) = conversation("newer", "new question");
    store.save_conversation(&newer).await.expect("save newer");

    std::fs::write(root.0.join("conversations").join("broken.json"), b"{ not json")
        .expect("write corrupt file");

    let all = store.all_conversations().await.expect("list");
    let ids: Vec<&str> = all.iter().map(|tree| tree.id.as_str()).collect();
    assert_eq!(ids, vec!["newer", "older"]);
}

#[tokio::test]
async fn conversations_are_found_by_any_message_and_deleted_idempotently() {
    let root = TempRoot::new("find");
    let store = FilesystemConversationStore::new(&root.0).expect("store opens");
    let (tree, reply) = conversation("conv-find", "where");
    store.save_conversation(&tree).await.expect("save");

    let found = store.find_by_message_id(&reply).await.expect("found");
    assert_eq!(found.id, tree.id);

    store.delete_conversation(&tree.id).await.expect("delete");
    store
        .delete_conversation(&tree.id)
        .await
        .expect("second delete is a no-op");
    let error = store
        .load_conversation(&tree.id)
        .await
        .expect_err("deleted");
    assert_eq!(error.kind, ChatErrorKind::NotFound);
}
