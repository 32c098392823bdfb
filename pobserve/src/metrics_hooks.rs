//! Metrics-based hooks for provider attempts, tool runs and chat loop phases.
//!
//! Emission goes through the `metrics` facade, so nothing is recorded until
//! the host installs a recorder.
//!
//! ```rust
//! use pobserve::MetricsObservabilityHooks;
//! use pprovider::ProviderOperationHooks;
//!
//! fn accepts_provider_hooks(_hooks: &dyn ProviderOperationHooks) {}
//!
//! let hooks = MetricsObservabilityHooks;
//! accepts_provider_hooks(&hooks);
//! ```

use std::time::Duration;

use pchat::{ChatLoopHooks, LoopTermination};
use pcommon::{ClientId, ConversationId};
use pprovider::{ProviderError, ProviderId, ProviderOperationHooks, ToolCall};
use ptooling::{ToolError, ToolExecutionContext, ToolInvocationResult, ToolRuntimeHooks};

use crate::outcome_label;

pub(crate) const PROVIDER_ATTEMPTS: &str = "parley_provider_attempts_total";
pub(crate) const PROVIDER_RETRIES: &str = "parley_provider_retries_total";
pub(crate) const PROVIDER_RETRY_DELAY: &str = "parley_provider_retry_delay_seconds";
pub(crate) const PROVIDER_OUTCOMES: &str = "parley_provider_outcomes_total";
pub(crate) const PROVIDER_ATTEMPTS_USED: &str = "parley_provider_attempts_used";
pub(crate) const TOOL_RUNS: &str = "parley_tool_runs_total";
pub(crate) const TOOL_DURATION: &str = "parley_tool_duration_seconds";
pub(crate) const LOOPS_ACTIVE: &str = "parley_chat_loops_active";
pub(crate) const LOOP_TOOL_DISPATCHES: &str = "parley_chat_tool_dispatches_total";
pub(crate) const LOOP_ENDS: &str = "parley_chat_loop_ends_total";
pub(crate) const LOOP_ITERATIONS: &str = "parley_chat_loop_iterations";

type Labels = Vec<(&'static str, String)>;

fn provider_labels(provider: ProviderId, operation: &str) -> Labels {
    vec![
        ("provider", provider.to_string()),
        ("operation", operation.to_string()),
    ]
}

fn with_label(mut labels: Labels, key: &'static str, value: impl Into<String>) -> Labels {
    labels.push((key, value.into()));
    labels
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsObservabilityHooks;

impl MetricsObservabilityHooks {
    fn tool_finished(&self, tool_call: &ToolCall, status: &'static str, elapsed: Duration) {
        let tool = vec![("tool_name", tool_call.name.clone())];
        metrics::histogram!(TOOL_DURATION, &with_label(tool, "status", status))
            .record(elapsed.as_secs_f64());
    }
}

impl ProviderOperationHooks for MetricsObservabilityHooks {
    fn on_attempt_start(&self, provider: ProviderId, operation: &str, _attempt: u32) {
        metrics::counter!(PROVIDER_ATTEMPTS, &provider_labels(provider, operation)).increment(1);
    }

    fn on_retry_scheduled(
        &self,
        provider: ProviderId,
        operation: &str,
        _attempt: u32,
        delay: Duration,
        error: &ProviderError,
    ) {
        let labels = provider_labels(provider, operation);
        metrics::histogram!(PROVIDER_RETRY_DELAY, &labels).record(delay.as_secs_f64());
        let labels = with_label(labels, "error_kind", format!("{:?}", error.kind));
        metrics::counter!(PROVIDER_RETRIES, &labels).increment(1);
    }

    fn on_success(&self, provider: ProviderId, operation: &str, attempts: u32) {
        let labels = provider_labels(provider, operation);
        metrics::histogram!(PROVIDER_ATTEMPTS_USED, &labels).record(f64::from(attempts));
        metrics::counter!(PROVIDER_OUTCOMES, &with_label(labels, "outcome", "success"))
            .increment(1);
    }

    fn on_failure(
        &self,
        provider: ProviderId,
        operation: &str,
        attempts: u32,
        error: &ProviderError,
    ) {
        let labels = provider_labels(provider, operation);
        metrics::histogram!(PROVIDER_ATTEMPTS_USED, &labels).record(f64::from(attempts));
        let outcome = if error.is_cancelled() { "cancelled" } else { "failure" };
        metrics::counter!(PROVIDER_OUTCOMES, &with_label(labels, "outcome", outcome))
            .increment(1);
    }
}

impl ToolRuntimeHooks for MetricsObservabilityHooks {
    fn on_execution_success(
        &self,
        tool_call: &ToolCall,
        _context: &ToolExecutionContext,
        result: &ToolInvocationResult,
        elapsed: Duration,
    ) {
        let labels = vec![
            ("tool_name", tool_call.name.clone()),
            ("outcome", outcome_label(result).to_string()),
        ];
        metrics::counter!(TOOL_RUNS, &labels).increment(1);
        self.tool_finished(tool_call, "success", elapsed);
    }

    fn on_execution_failure(
        &self,
        tool_call: &ToolCall,
        _context: &ToolExecutionContext,
        error: &ToolError,
        elapsed: Duration,
    ) {
        let labels = vec![
            ("tool_name", tool_call.name.clone()),
            ("outcome", format!("{:?}", error.kind).to_lowercase()),
        ];
        metrics::counter!(TOOL_RUNS, &labels).increment(1);
        self.tool_finished(tool_call, "failure", elapsed);
    }
}

impl ChatLoopHooks for MetricsObservabilityHooks {
    fn on_loop_start(&self, _conversation_id: &ConversationId, _client_id: &ClientId) {
        metrics::gauge!(LOOPS_ACTIVE).increment(1.0);
    }

    fn on_tool_dispatch(&self, _conversation_id: &ConversationId, tool_name: &str) {
        metrics::counter!(LOOP_TOOL_DISPATCHES, "tool_name" => tool_name.to_string()).increment(1);
    }

    fn on_loop_end(
        &self,
        _conversation_id: &ConversationId,
        termination: &LoopTermination,
        iterations: u32,
    ) {
        metrics::gauge!(LOOPS_ACTIVE).decrement(1.0);
        let labels = vec![("termination", termination.as_str().to_string())];
        metrics::counter!(LOOP_ENDS, &labels).increment(1);
        metrics::histogram!(LOOP_ITERATIONS, &labels).record(f64::from(iterations));
    }
}
