//! Unified facade over the parley workspace crates.
//!
//! Most applications depend on this crate alone: it re-exports the chat,
//! provider, tooling, storage and hub crates and wires them together from
//! an [`EngineConfig`].
//!
//! ```rust,no_run
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = parley::EngineConfig::load("parley.toml")?;
//! let runtime = parley::build_runtime(config)?;
//! parley::serve(&runtime).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod prelude;
pub mod providers;
pub mod runtime;

pub use pchat;
pub use pcommon;
pub use phub;
pub use pmemory;
pub use pobserve;
pub use pprovider;
pub use ptooling;

pub use config::{
    ChatConfig, ConfigError, ConfigErrorKind, EngineConfig, HookSet, ModelConfig,
    ObservabilityConfig, ProviderConfig, RetryConfig, ServerConfig, StorageBackend, StorageConfig,
};
pub use pchat::{
    ChatError, ChatErrorKind, ChatPolicy, ChatService, ContentBlock, ConversationStore,
    ConversationTree, LoopTermination, Message, MessagePayload, MessageRole, SubmitOutcome,
    SubmitRequest,
};
pub use pcommon::{ClientId, ConversationId, MessageId, SamplingOptions};
pub use phub::{ClientMessage, HubError, NotificationHub, ServerMessage};
pub use pmemory::{FilesystemConversationStore, MemoryError, StoreConfig};
pub use pprovider::{
    CostEngine, CostInfo, ModelGateway, ModelPricing, ModelProvider, ProviderError, ProviderId,
    ProviderRegistry, SecretString, ToolDefinition,
};
pub use ptooling::{
    FunctionTool, Tool, ToolExecutionContext, ToolInvocationResult, ToolOutcome, ToolRegistry,
};
pub use providers::{build_provider, build_provider_registry, default_base_url};
pub use runtime::{RuntimeBundle, build_runtime, build_runtime_with, serve, serve_until};
