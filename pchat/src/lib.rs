//! Conversation orchestration: branching history, the bounded tool loop and
//! the chat service that ties them to a store.
//!
//! ```rust
//! use pchat::prelude::*;
//!
//! let mut tree = ConversationTree::new("conv-1");
//! let root = tree.add_message(None, MessagePayload::user("hi")).unwrap();
//! let reply = tree.add_message(Some(&root), MessagePayload::ai("hello")).unwrap();
//!
//! let history = build_linear_history(&tree, &reply, Some("Be brief.")).unwrap();
//! assert_eq!(history.len(), 2);
//! assert_eq!(history.system_prompt.as_deref(), Some("Be brief."));
//! ```

mod cancellation;
mod catalog;
mod error;
mod hooks;
mod interjection;
mod linearize;
mod message;
mod notifier;
mod service;
mod store;
mod tool_loop;
mod tree;

pub mod prelude {
    pub use crate::{
        ChatError, ChatErrorKind, ChatLoopHooks, ChatNotifier, ChatPolicy, ChatService,
        ContentBlock, ConversationStore, ConversationTree, InMemoryConversationStore,
        LoopOutcome, LoopTermination, Message, MessagePayload, MessageRole, ModelCatalog,
        ModelEntry, SubmitRequest, ToolExecutionLoop, build_linear_history,
    };
}

pub use cancellation::CancellationRegistry;
pub use catalog::{ModelCatalog, ModelEntry};
pub use error::{ChatError, ChatErrorKind, TreeError, TreeErrorKind};
pub use hooks::{ChatLoopHooks, NoopChatLoopHooks};
pub use interjection::InterjectionBox;
pub use linearize::{LinearConversation, build_linear_history};
pub use message::{ContentBlock, Message, MessagePayload, MessageRole};
pub use notifier::{ChatNotifier, NoopChatNotifier, UpdateSource};
pub use service::{ChatService, ConversationSummary, SubmitOutcome, SubmitRequest};
pub use store::{ChatFuture, ConversationStore, InMemoryConversationStore};
pub use tool_loop::{
    CANCELLED_NOTICE, ChatPolicy, DEFAULT_MAX_TOOL_ITERATIONS, LoopOutcome, LoopRequest,
    LoopTermination, ToolExecutionLoop,
};
pub use tree::{ConversationTree, DEFAULT_SUMMARY};
