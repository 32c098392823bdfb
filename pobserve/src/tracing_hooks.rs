//! Tracing-based hooks for provider attempts, tool runs and chat loop phases.
//!
//! Every event carries `phase` and `event` fields so that log pipelines can
//! filter one stage of a turn without parsing messages.
//!
//! ```rust
//! use pobserve::TracingObservabilityHooks;
//! use pchat::ChatLoopHooks;
//!
//! fn accepts_loop_hooks(_hooks: &dyn ChatLoopHooks) {}
//!
//! let hooks = TracingObservabilityHooks;
//! accepts_loop_hooks(&hooks);
//! ```

use std::time::Duration;

use pchat::{ChatLoopHooks, LoopTermination};
use pcommon::{ClientId, ConversationId};
use pprovider::{ProviderError, ProviderId, ProviderOperationHooks, ToolCall};
use ptooling::{ToolError, ToolExecutionContext, ToolInvocationResult, ToolRuntimeHooks};

use crate::outcome_label;

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObservabilityHooks;

impl ProviderOperationHooks for TracingObservabilityHooks {
    fn on_attempt_start(&self, provider: ProviderId, operation: &str, attempt: u32) {
        tracing::debug!(phase = "provider", event = "attempt", %provider, operation, attempt);
    }

    fn on_retry_scheduled(
        &self,
        provider: ProviderId,
        operation: &str,
        attempt: u32,
        delay: Duration,
        error: &ProviderError,
    ) {
        tracing::warn!(
            phase = "provider",
            event = "backoff",
            %provider,
            operation,
            attempt,
            backoff_ms = millis(delay),
            status = error.status,
            reason = %error
        );
    }

    fn on_success(&self, provider: ProviderId, operation: &str, attempts: u32) {
        tracing::info!(phase = "provider", event = "streamed", %provider, operation, attempts);
    }

    fn on_failure(
        &self,
        provider: ProviderId,
        operation: &str,
        attempts: u32,
        error: &ProviderError,
    ) {
        if error.is_cancelled() {
            tracing::info!(phase = "provider", event = "cancelled", %provider, operation, attempts);
            return;
        }
        tracing::error!(
            phase = "provider",
            event = "gave_up",
            %provider,
            operation,
            attempts,
            retryable = error.retryable,
            status = error.status,
            reason = %error
        );
    }
}

impl ToolRuntimeHooks for TracingObservabilityHooks {
    fn on_execution_start(&self, tool_call: &ToolCall, context: &ToolExecutionContext) {
        tracing::info!(
            phase = "tool",
            event = "invoke",
            tool = %tool_call.name,
            call_id = %tool_call.id,
            client = ?context.client_id,
            conversation = ?context.conversation_id,
            arguments_len = tool_call.arguments.len()
        );
    }

    fn on_execution_success(
        &self,
        tool_call: &ToolCall,
        context: &ToolExecutionContext,
        result: &ToolInvocationResult,
        elapsed: Duration,
    ) {
        tracing::info!(
            phase = "tool",
            event = "returned",
            tool = %tool_call.name,
            call_id = %tool_call.id,
            conversation = ?context.conversation_id,
            outcome = outcome_label(result),
            elapsed_ms = millis(elapsed)
        );
    }

    fn on_execution_failure(
        &self,
        tool_call: &ToolCall,
        context: &ToolExecutionContext,
        error: &ToolError,
        elapsed: Duration,
    ) {
        tracing::warn!(
            phase = "tool",
            event = "errored",
            tool = %tool_call.name,
            call_id = %tool_call.id,
            conversation = ?context.conversation_id,
            kind = ?error.kind,
            reason = %error,
            elapsed_ms = millis(elapsed)
        );
    }
}

impl ChatLoopHooks for TracingObservabilityHooks {
    fn on_loop_start(&self, conversation_id: &ConversationId, client_id: &ClientId) {
        tracing::info!(
            phase = "chat_loop",
            event = "turn_started",
            conversation = %conversation_id,
            client = %client_id
        );
    }

    fn on_iteration_start(&self, conversation_id: &ConversationId, iteration: u32) {
        tracing::trace!(
            phase = "chat_loop",
            event = "iteration",
            conversation = %conversation_id,
            iteration
        );
    }

    fn on_tool_dispatch(&self, conversation_id: &ConversationId, tool_name: &str) {
        tracing::debug!(
            phase = "chat_loop",
            event = "dispatch",
            conversation = %conversation_id,
            tool = tool_name
        );
    }

    fn on_loop_end(
        &self,
        conversation_id: &ConversationId,
        termination: &LoopTermination,
        iterations: u32,
    ) {
        let failed = termination.is_failure();
        let termination = termination.as_str();
        if failed {
            tracing::warn!(
                phase = "chat_loop",
                event = "turn_finished",
                conversation = %conversation_id,
                termination,
                iterations
            );
        } else {
            tracing::info!(
                phase = "chat_loop",
                event = "turn_finished",
                conversation = %conversation_id,
                termination,
                iterations
            );
        }
    }
}
