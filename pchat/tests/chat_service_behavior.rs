mod support;

use std::sync::Arc;
use std::time::Duration;

use pchat::{
    ChatErrorKind, ChatPolicy, ChatService, ConversationStore, ConversationTree, LoopTermination,
    MessagePayload, MessageRole, SubmitRequest,
};
use pcommon::{ClientId, ConversationId};
use pprovider::{ProviderError, ToolDefinition};
use ptooling::{ToolInvocationResult, ToolRegistry};

use support::{Harness, Turn, harness};

fn service(h: &Harness) -> ChatService {
    ChatService::new(h.tool_loop.clone())
}

async fn wait_for_summary(h: &Harness, conversation_id: &ConversationId, expected: &str) -> String {
    let marker = format!("list:{conversation_id}:{expected}");
    for _ in 0..100 {
        if h.notifier.events().contains(&marker) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    h.store
        .load_conversation(conversation_id)
        .await
        .expect("persisted")
        .summary()
}

fn interjecting_search() -> ToolRegistry {
    let mut registry = ToolRegistry::with_builtins();
    registry.register_fn(
        ToolDefinition::new("search", "Searches", "{}"),
        |_params, _context| async move {
            Ok(ToolInvocationResult::continue_with("3 results")
                .with_user_interjection("only async crates"))
        },
    );
    registry
}

#[tokio::test]
async fn first_submission_creates_and_persists_a_conversation() {
    let h = harness(vec![Turn::text("hello")], ToolRegistry::new(), ChatPolicy::default());
    let chat = service(&h);

    let outcome = chat
        .submit(SubmitRequest::new("client-1", "hi"))
        .await
        .expect("submit should succeed");

    assert_eq!(outcome.termination(), Some(&LoopTermination::Completed));
    let tree = chat
        .load_conversation(&outcome.conversation_id)
        .await
        .expect("conversation loads");
    assert_eq!(tree.len(), 2);
    assert_eq!(tree.summary(), "hi");

    let stored = h
        .store
        .load_conversation(&outcome.conversation_id)
        .await
        .expect("persisted");
    assert_eq!(stored, tree);

    let list = chat.conversation_list().await.expect("list");
    assert_eq!(list.len(), 1);
    assert_eq!(list[0].summary, "hi");
    assert!(
        h.notifier
            .events()
            .contains(&format!("list:{}:hi", outcome.conversation_id))
    );
}

#[tokio::test]
async fn follow_up_attaches_to_the_active_leaf() {
    let h = harness(vec![Turn::text("answer")], ToolRegistry::new(), ChatPolicy::default());
    let chat = service(&h);

    let first = chat
        .submit(SubmitRequest::new("client-1", "question one"))
        .await
        .expect("first submit");
    let first_leaf = first.loops[0].leaf_id.clone();

    let second = chat
        .submit(
            SubmitRequest::new("client-1", "question two")
                .with_conversation_id(first.conversation_id.clone()),
        )
        .await
        .expect("second submit");

    let tree = chat
        .load_conversation(&second.conversation_id)
        .await
        .expect("load");
    let user = tree.get(&second.user_message_id).expect("user message");
    assert_eq!(user.parent_id.as_ref(), Some(&first_leaf));
    assert_eq!(tree.depth(&second.loops[0].leaf_id).expect("depth"), 4);
    assert_eq!(h.provider.requests()[1].messages.len(), 3);
}

#[tokio::test]
async fn editing_branches_instead_of_rewriting() {
    let h = harness(vec![Turn::text("hello")], ToolRegistry::new(), ChatPolicy::default());
    let chat = service(&h);

    let first = chat
        .submit(SubmitRequest::new("client-1", "hi"))
        .await
        .expect("first submit");
    let original_reply = first.loops[0].leaf_id.clone();

    let edited = chat
        .submit(
            SubmitRequest::new("client-1", "hey")
                .with_conversation_id(first.conversation_id.clone())
                .with_edit_of(first.user_message_id.clone()),
        )
        .await
        .expect("edit submit");

    let tree = chat
        .load_conversation(&first.conversation_id)
        .await
        .expect("load");
    assert_eq!(tree.root_ids().len(), 2);
    assert!(tree.contains(&original_reply));
    assert_ne!(edited.loops[0].leaf_id, original_reply);
    assert_eq!(tree.active_leaf(), Some(&edited.loops[0].leaf_id));
    tree.validate().expect("valid tree");
}

#[tokio::test]
async fn concurrent_submission_to_a_busy_conversation_is_rejected() {
    let h = harness(
        vec![Turn::Stall("thinking".to_string())],
        ToolRegistry::new(),
        ChatPolicy::default(),
    );
    let chat = Arc::new(service(&h));
    let conversation = ConversationId::new("conv-busy");
    let client = ClientId::new("client-1");

    let running = {
        let chat = Arc::clone(&chat);
        let request = SubmitRequest::new(client.clone(), "slow question")
            .with_conversation_id(conversation.clone());
        tokio::spawn(async move { chat.submit(request).await })
    };
    while h.provider.calls() == 0 {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let error = chat
        .submit(
            SubmitRequest::new("client-2", "me too").with_conversation_id(conversation.clone()),
        )
        .await
        .expect_err("second loop must not start");
    assert_eq!(error.kind, ChatErrorKind::Busy);

    let error = chat
        .delete_conversation(&conversation)
        .await
        .expect_err("cannot delete while running");
    assert_eq!(error.kind, ChatErrorKind::Busy);

    assert!(chat.cancel(&client).expect("cancel"));
    let outcome = running
        .await
        .expect("task joins")
        .expect("cancelled loop still succeeds");
    assert_eq!(outcome.termination(), Some(&LoopTermination::Cancelled));
    assert_eq!(h.provider.calls(), 1);
}

#[tokio::test]
async fn interjection_resumes_as_a_new_user_turn() {
    let h = harness(
        vec![Turn::tool("search", "{}"), Turn::text("tokio and async-std")],
        interjecting_search(),
        ChatPolicy::default(),
    );
    let chat = service(&h);

    let outcome = chat
        .submit(SubmitRequest::new("client-1", "list crates"))
        .await
        .expect("submit");

    assert_eq!(outcome.loops.len(), 2);
    assert!(matches!(
        outcome.loops[0].termination,
        LoopTermination::Interjected { .. }
    ));
    assert_eq!(outcome.termination(), Some(&LoopTermination::Completed));
    assert_eq!(h.provider.calls(), 2);

    let second_request = &h.provider.requests()[1];
    assert_eq!(
        second_request.messages.last().map(|m| m.content.as_str()),
        Some("only async crates")
    );
}

#[tokio::test]
async fn interjection_can_end_the_submission_when_resume_is_disabled() {
    let h = harness(
        vec![Turn::tool("search", "{}"), Turn::text("unused")],
        interjecting_search(),
        ChatPolicy::default().with_resume_after_interjection(false),
    );
    let chat = service(&h);

    let outcome = chat
        .submit(SubmitRequest::new("client-1", "list crates"))
        .await
        .expect("submit");

    assert_eq!(outcome.loops.len(), 1);
    assert_eq!(h.provider.calls(), 1);
}

#[tokio::test]
async fn invalid_submissions_are_rejected() {
    let h = harness(vec![Turn::text("x")], ToolRegistry::new(), ChatPolicy::default());
    let chat = service(&h);

    let empty = chat
        .submit(SubmitRequest::new("client-1", "   "))
        .await
        .expect_err("empty content");
    assert_eq!(empty.kind, ChatErrorKind::InvalidRequest);

    let unknown = chat
        .submit(SubmitRequest::new("client-1", "hi").with_model("mystery-model"))
        .await
        .expect_err("unknown model");
    assert_eq!(unknown.kind, ChatErrorKind::InvalidRequest);

    let blank = chat
        .interject(&ClientId::new("client-1"), "")
        .expect_err("empty interjection");
    assert_eq!(blank.kind, ChatErrorKind::InvalidRequest);
    assert_eq!(h.provider.calls(), 0);
}

#[tokio::test]
async fn stored_conversations_are_resumed_and_deleted() {
    let h = harness(vec![Turn::text("welcome back")], ToolRegistry::new(), ChatPolicy::default());
    let mut tree = ConversationTree::new("conv-old");
    let root = tree
        .add_message(None, MessagePayload::user("earlier"))
        .expect("root");
    tree.add_message(Some(&root), MessagePayload::ai("earlier answer"))
        .expect("reply");
    h.store.save_conversation(&tree).await.expect("seed store");
    let chat = service(&h);

    let outcome = chat
        .submit(SubmitRequest::new("client-1", "again").with_conversation_id("conv-old"))
        .await
        .expect("submit");
    let resumed = chat
        .load_conversation(&outcome.conversation_id)
        .await
        .expect("load");
    assert_eq!(resumed.len(), 4);
    assert_eq!(
        resumed.get(&outcome.loops[0].leaf_id).map(|m| m.role),
        Some(MessageRole::Ai)
    );

    chat.delete_conversation(&outcome.conversation_id)
        .await
        .expect("delete");
    let error = chat
        .load_conversation(&outcome.conversation_id)
        .await
        .expect_err("gone");
    assert_eq!(error.kind, ChatErrorKind::NotFound);
}

#[tokio::test]
async fn secondary_model_titles_a_new_conversation_in_the_background() {
    let h = harness(
        vec![
            Turn::text("hello there"),
            Turn::text("  Friendly greeting between user and assistant  "),
            Turn::text("second answer"),
        ],
        ToolRegistry::new(),
        ChatPolicy::default().with_secondary_model(support::MODEL),
    );
    let chat = service(&h);

    let outcome = chat
        .submit(SubmitRequest::new("client-1", "hi"))
        .await
        .expect("submit");
    let summary = wait_for_summary(
        &h,
        &outcome.conversation_id,
        "Friendly greeting between user and assistant",
    )
    .await;
    assert_eq!(summary, "Friendly greeting between user and assistant");

    let title_request = &h.provider.requests()[1];
    assert_eq!(title_request.model, support::MODEL);
    assert!(title_request.tools.is_empty());
    let prompt = &title_request.messages[0].content;
    assert!(prompt.contains("6 - 10 word summary"));
    assert!(prompt.contains("User: hi"));
    assert!(prompt.contains("AI: hello there"));

    chat.submit(
        SubmitRequest::new("client-1", "and again").with_conversation_id(outcome.conversation_id.clone()),
    )
    .await
    .expect("follow-up");
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(h.provider.calls(), 3);
}

#[tokio::test]
async fn failed_title_request_keeps_the_first_user_line() {
    let h = harness(
        vec![
            Turn::text("hello there"),
            Turn::Fail(ProviderError::unavailable("title model offline")),
        ],
        ToolRegistry::new(),
        ChatPolicy::default().with_secondary_model(support::MODEL),
    );
    let chat = service(&h);

    let outcome = chat
        .submit(SubmitRequest::new("client-1", "hi"))
        .await
        .expect("a failing title never fails the submission");
    for _ in 0..100 {
        if h.provider.calls() == 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(h.provider.calls(), 2);
    let stored = h
        .store
        .load_conversation(&outcome.conversation_id)
        .await
        .expect("persisted");
    assert_eq!(stored.summary(), "hi");
    let list_events = h
        .notifier
        .events()
        .into_iter()
        .filter(|event| event.starts_with("list:"))
        .count();
    assert_eq!(list_events, 2);
}

#[tokio::test]
async fn no_title_request_without_a_secondary_model() {
    let h = harness(vec![Turn::text("hello there")], ToolRegistry::new(), ChatPolicy::default());
    let chat = service(&h);

    chat.submit(SubmitRequest::new("client-1", "hi"))
        .await
        .expect("submit");
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(h.provider.calls(), 1);
}

#[tokio::test]
async fn interjection_left_over_from_an_earlier_turn_is_discarded() {
    let h = harness(vec![Turn::text("hello there")], ToolRegistry::new(), ChatPolicy::default());
    let chat = service(&h);
    chat.interject(&ClientId::new("client-1"), "stale aside")
        .expect("interject");

    let outcome = chat
        .submit(SubmitRequest::new("client-1", "hi"))
        .await
        .expect("submit");

    assert_eq!(outcome.loops.len(), 1);
    assert_eq!(outcome.termination(), Some(&LoopTermination::Completed));
    let tree = chat
        .load_conversation(&outcome.conversation_id)
        .await
        .expect("load");
    assert_eq!(tree.len(), 2);
    assert!(tree.messages().all(|message| message.text() != "stale aside"));
    assert!(
        !chat
            .tool_loop()
            .interjections()
            .has_pending(&ClientId::new("client-1"))
            .expect("check")
    );
}
