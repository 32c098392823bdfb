//! Provider-agnostic model gateway for the parley conversation engine.
//!
//! Backends implement [`ModelProvider`] and are registered in a
//! [`ProviderRegistry`]. [`ModelGateway`] wraps the registry with retry,
//! cancellation and failure folding so callers always receive exactly one
//! terminal [`ModelResponse`]. [`CostEngine`] prices the resulting
//! [`TokenUsage`].
//!
//! ```rust
//! use pprovider::prelude::*;
//!
//! let request = ModelRequest::builder(ProviderId::Ollama, "llama3.2")
//!     .system_prompt("You are terse.")
//!     .message(LinearMessage::user("ping"))
//!     .build()
//!     .expect("request should validate");
//!
//! assert_eq!(request.messages.len(), 1);
//! assert_eq!(request.system_prompt.as_deref(), Some("You are terse."));
//! ```

pub mod adapters;
pub mod error;
pub mod gateway;
pub mod model;
pub mod prelude;
pub mod pricing;
pub mod provider;
pub mod registry;
pub mod resilience;
pub mod secret;
pub mod stream;

pub use error::{ProviderError, ProviderErrorKind};
pub use gateway::{GatewayEvent, GatewayStream, ModelGateway};
pub use model::{
    Attachment, LinearMessage, ModelRequest, ModelRequestBuilder, ModelResponse, ProviderId, Role,
    StopReason, TokenUsage, ToolCall, ToolDefinition,
};
pub use pricing::{
    ChargingStrategy, ClaudeCachingStrategy, CostEngine, CostInfo, GeminiCachingStrategy,
    ModelPricing, NoCachingStrategy, OpenAiCachingStrategy, TokenCostStrategy,
};
pub use provider::{ModelProvider, ProviderFuture};
pub use registry::ProviderRegistry;
pub use resilience::{NoopOperationHooks, ProviderOperationHooks, RetryPolicy, execute_with_retry};
pub use secret::SecretString;
pub use stream::{
    BoxedEventStream, ModelEventStream, StreamAccumulator, StreamEvent, VecEventStream,
};
