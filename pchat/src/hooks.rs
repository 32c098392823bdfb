//! Lifecycle hooks for the tool execution loop.

use pcommon::{ClientId, ConversationId};

use crate::LoopTermination;

pub trait ChatLoopHooks: Send + Sync {
    fn on_loop_start(&self, _conversation_id: &ConversationId, _client_id: &ClientId) {}

    fn on_iteration_start(&self, _conversation_id: &ConversationId, _iteration: u32) {}

    fn on_tool_dispatch(&self, _conversation_id: &ConversationId, _tool_name: &str) {}

    fn on_loop_end(
        &self,
        _conversation_id: &ConversationId,
        _termination: &LoopTermination,
        _iterations: u32,
    ) {
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopChatLoopHooks;

impl ChatLoopHooks for NoopChatLoopHooks {}
