//! Common `pprovider` imports for downstream crates.

pub use crate::{
    Attachment, BoxedEventStream, ChargingStrategy, CostEngine, CostInfo, GatewayEvent,
    LinearMessage, ModelEventStream, ModelGateway, ModelPricing, ModelProvider, ModelRequest,
    ModelRequestBuilder, ModelResponse, NoopOperationHooks, ProviderError, ProviderErrorKind,
    ProviderId, ProviderOperationHooks, ProviderRegistry, RetryPolicy, Role, StopReason,
    StreamEvent, TokenUsage, ToolCall, ToolDefinition, execute_with_retry,
};
pub use pcommon::{BoxFuture, MetadataMap, SamplingOptions};
