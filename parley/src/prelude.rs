//! Common imports for most parley applications.

pub use crate::{
    ChatError, ChatPolicy, ChatService, ClientId, ConfigError, ConversationId, ConversationStore,
    ConversationTree, EngineConfig, FunctionTool, LoopTermination, MessagePayload, ModelProvider,
    ProviderId, RuntimeBundle, SubmitRequest, Tool, ToolDefinition, ToolExecutionContext,
    ToolInvocationResult, ToolRegistry, build_runtime, build_runtime_with, serve, serve_until,
};
