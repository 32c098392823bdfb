use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::Duration;

use pchat::{ChatLoopHooks, LoopTermination};
use pcommon::{ClientId, ConversationId};
use pprovider::{ProviderError, ProviderId, ProviderOperationHooks, ToolCall};
use ptooling::{ToolError, ToolExecutionContext, ToolInvocationResult, ToolRuntimeHooks};

/// Wraps any hook implementation so that a panic inside a callback is logged
/// and dropped instead of unwinding into the provider call, tool run or chat
/// loop that invoked it.
///
/// ```rust
/// use std::sync::Arc;
///
/// use pchat::ChatLoopHooks;
/// use pobserve::{PanicGuard, TracingObservabilityHooks};
/// use pprovider::ProviderOperationHooks;
///
/// let guarded = Arc::new(PanicGuard::new(TracingObservabilityHooks));
/// let _provider: Arc<dyn ProviderOperationHooks> = guarded.clone();
/// let _chat: Arc<dyn ChatLoopHooks> = guarded;
/// ```
#[derive(Debug, Clone, Default)]
pub struct PanicGuard<H> {
    inner: H,
}

impl<H> PanicGuard<H> {
    pub fn new(inner: H) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &H {
        &self.inner
    }

    fn shield(&self, callback: &'static str, call: impl FnOnce(&H)) {
        if catch_unwind(AssertUnwindSafe(|| call(&self.inner))).is_err() {
            tracing::warn!(
                phase = "observe",
                event = "hook_panicked",
                hooks = std::any::type_name::<H>(),
                callback
            );
        }
    }
}

impl<H: ProviderOperationHooks> ProviderOperationHooks for PanicGuard<H> {
    fn on_attempt_start(&self, provider: ProviderId, operation: &str, attempt: u32) {
        self.shield("on_attempt_start", |hooks| {
            hooks.on_attempt_start(provider, operation, attempt)
        });
    }

    fn on_retry_scheduled(
        &self,
        provider: ProviderId,
        operation: &str,
        attempt: u32,
        delay: Duration,
        error: &ProviderError,
    ) {
        self.shield("on_retry_scheduled", |hooks| {
            hooks.on_retry_scheduled(provider, operation, attempt, delay, error)
        });
    }

    fn on_success(&self, provider: ProviderId, operation: &str, attempts: u32) {
        self.shield("on_success", |hooks| {
            hooks.on_success(provider, operation, attempts)
        });
    }

    fn on_failure(
        &self,
        provider: ProviderId,
        operation: &str,
        attempts: u32,
        error: &ProviderError,
    ) {
        self.shield("on_failure", |hooks| {
            hooks.on_failure(provider, operation, attempts, error)
        });
    }
}

impl<H: ToolRuntimeHooks> ToolRuntimeHooks for PanicGuard<H> {
    fn on_execution_start(&self, tool_call: &ToolCall, context: &ToolExecutionContext) {
        self.shield("on_execution_start", |hooks| {
            hooks.on_execution_start(tool_call, context)
        });
    }

    fn on_execution_success(
        &self,
        tool_call: &ToolCall,
        context: &ToolExecutionContext,
        result: &ToolInvocationResult,
        elapsed: Duration,
    ) {
        self.shield("on_execution_success", |hooks| {
            hooks.on_execution_success(tool_call, context, result, elapsed)
        });
    }

    fn on_execution_failure(
        &self,
        tool_call: &ToolCall,
        context: &ToolExecutionContext,
        error: &ToolError,
        elapsed: Duration,
    ) {
        self.shield("on_execution_failure", |hooks| {
            hooks.on_execution_failure(tool_call, context, error, elapsed)
        });
    }
}

impl<H: ChatLoopHooks> ChatLoopHooks for PanicGuard<H> {
    fn on_loop_start(&self, conversation_id: &ConversationId, client_id: &ClientId) {
        self.shield("on_loop_start", |hooks| {
            hooks.on_loop_start(conversation_id, client_id)
        });
    }

    fn on_iteration_start(&self, conversation_id: &ConversationId, iteration: u32) {
        self.shield("on_iteration_start", |hooks| {
            hooks.on_iteration_start(conversation_id, iteration)
        });
    }

    fn on_tool_dispatch(&self, conversation_id: &ConversationId, tool_name: &str) {
        self.shield("on_tool_dispatch", |hooks| {
            hooks.on_tool_dispatch(conversation_id, tool_name)
        });
    }

    fn on_loop_end(
        &self,
        conversation_id: &ConversationId,
        termination: &LoopTermination,
        iterations: u32,
    ) {
        self.shield("on_loop_end", |hooks| {
            hooks.on_loop_end(conversation_id, termination, iterations)
        });
    }
}
