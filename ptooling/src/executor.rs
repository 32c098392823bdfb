//! Registry-backed tool executor that never lets a tool fault escape.
//!
//! Every outcome (unknown tool, `Err(ToolError)`, panic, timeout) becomes a
//! [`ToolInvocationResult`], so the caller's loop only ever inspects values.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::FutureExt;
use pprovider::ToolCall;

use crate::args::take_task_description;
use crate::{ToolError, ToolExecutionContext, ToolInvocationResult, ToolRegistry};

/// Timing and outcome callbacks around each invocation; all default to no-ops.
///
/// Failures include unknown tools (reported with a zero duration), tool
/// errors, timeouts and panics.
pub trait ToolRuntimeHooks: Send + Sync {
    fn on_execution_start(&self, _tool_call: &ToolCall, _context: &ToolExecutionContext) {}

    fn on_execution_success(
        &self,
        _tool_call: &ToolCall,
        _context: &ToolExecutionContext,
        _result: &ToolInvocationResult,
        _elapsed: Duration,
    ) {
    }

    fn on_execution_failure(
        &self,
        _tool_call: &ToolCall,
        _context: &ToolExecutionContext,
        _error: &ToolError,
        _elapsed: Duration,
    ) {
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopToolRuntimeHooks;

impl ToolRuntimeHooks for NoopToolRuntimeHooks {}

#[derive(Clone)]
pub struct ToolExecutor {
    registry: Arc<ToolRegistry>,
    hooks: Arc<dyn ToolRuntimeHooks>,
    timeout: Option<Duration>,
}

impl ToolExecutor {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self {
            registry,
            hooks: Arc::new(NoopToolRuntimeHooks),
            timeout: None,
        }
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn ToolRuntimeHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn registry(&self) -> Arc<ToolRegistry> {
        Arc::clone(&self.registry)
    }

    pub async fn execute(
        &self,
        tool_call: &ToolCall,
        context: &ToolExecutionContext,
    ) -> ToolInvocationResult {
        let (params_json, task_description) = take_task_description(&tool_call.arguments);
        if let Some(description) = &task_description {
            context.report_status(description);
        }

        let Some(tool) = self.registry.resolve(&tool_call.name) else {
            tracing::warn!(
                phase = "tool",
                event = "unknown_tool",
                tool = %tool_call.name,
                call_id = %tool_call.id
            );
            let error = ToolError::not_found(format!("Unknown tool: {}", tool_call.name))
                .with_tool_name(&tool_call.name)
                .with_tool_call_id(&tool_call.id);
            self.hooks
                .on_execution_failure(tool_call, context, &error, Duration::ZERO);
            return with_description(error.into_result(), task_description);
        };

        let definition = tool.definition();
        context.report_status(&format!("Executing tool: {}", definition.name));
        self.hooks.on_execution_start(tool_call, context);
        let started = Instant::now();

        // `process` itself may panic before handing back its future.
        let invocation =
            AssertUnwindSafe(async { tool.process(&params_json, context).await }).catch_unwind();
        let outcome = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, invocation).await {
                Ok(outcome) => outcome,
                Err(_) => Ok(Err(ToolError::timeout(format!(
                    "tool '{}' timed out after {}ms",
                    definition.name,
                    limit.as_millis()
                )))),
            },
            None => invocation.await,
        };
        let elapsed = started.elapsed();

        let result = match outcome {
            Ok(Ok(mut result)) => {
                if result.output_format.is_none() {
                    result.output_format = definition.output_format.clone();
                }
                self.hooks
                    .on_execution_success(tool_call, context, &result, elapsed);
                result
            }
            Ok(Err(error)) => {
                let error = error
                    .with_tool_name(&definition.name)
                    .with_tool_call_id(&tool_call.id);
                tracing::error!(phase = "tool", event = "failed", tool = %definition.name, error = %error);
                self.hooks
                    .on_execution_failure(tool_call, context, &error, elapsed);
                error.into_result()
            }
            Err(payload) => {
                let error = ToolError::panicked(payload.as_ref())
                    .with_tool_name(&definition.name)
                    .with_tool_call_id(&tool_call.id);
                tracing::error!(phase = "tool", event = "panicked", tool = %definition.name, error = %error);
                self.hooks
                    .on_execution_failure(tool_call, context, &error, elapsed);
                error.into_result()
            }
        };

        context.report_status(&format!("Tool {} completed", definition.name));
        with_description(result, task_description)
    }
}

fn with_description(
    mut result: ToolInvocationResult,
    task_description: Option<String>,
) -> ToolInvocationResult {
    if result.task_description.is_none() {
        result.task_description = task_description;
    }
    result
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use pcommon::ClientId;
    use pprovider::ToolDefinition;

    use super::*;
    use crate::{StatusReporter, Tool, ToolFuture, ToolOutcome};

    #[derive(Default)]
    struct StatusLog {
        lines: Mutex<Vec<String>>,
    }

    impl StatusReporter for StatusLog {
        fn report_status(&self, _client_id: &ClientId, message: &str) {
            self.lines
                .lock()
                .expect("lines lock")
                .push(message.to_string());
        }
    }

    struct EchoTool;

    impl Tool for EchoTool {
        fn definition(&self) -> ToolDefinition {
            ToolDefinition::new("echo", "Echoes arguments", "{}")
                .with_id("tool-echo")
                .with_output_format("json")
        }

        fn process<'a>(
            &'a self,
            params_json: &'a str,
            _context: &'a ToolExecutionContext,
        ) -> ToolFuture<'a, Result<ToolInvocationResult, ToolError>> {
            Box::pin(async move { Ok(ToolInvocationResult::continue_with(params_json)) })
        }
    }

    struct PanickingTool;

    impl Tool for PanickingTool {
        fn definition(&self) -> ToolDefinition {
            ToolDefinition::new("explode", "Panics", "{}")
        }

        fn process<'a>(
            &'a self,
            _params_json: &'a str,
            _context: &'a ToolExecutionContext,
        ) -> ToolFuture<'a, Result<ToolInvocationResult, ToolError>> {
            Box::pin(async move { panic!("kaboom") })
        }
    }

    struct StrictArgsTool;

    impl Tool for StrictArgsTool {
        fn definition(&self) -> ToolDefinition {
            ToolDefinition::new("strict", "Parses arguments up front", "{}")
        }

        fn process<'a>(
            &'a self,
            params_json: &'a str,
            _context: &'a ToolExecutionContext,
        ) -> ToolFuture<'a, Result<ToolInvocationResult, ToolError>> {
            let parsed: serde_json::Value =
                serde_json::from_str(params_json).expect("arguments are valid JSON");
            Box::pin(async move { Ok(ToolInvocationResult::complete(parsed.to_string())) })
        }
    }

    struct SlowTool;

    impl Tool for SlowTool {
        fn definition(&self) -> ToolDefinition {
            ToolDefinition::new("slow", "Sleeps", "{}")
        }

        fn process<'a>(
            &'a self,
            _params_json: &'a str,
            _context: &'a ToolExecutionContext,
        ) -> ToolFuture<'a, Result<ToolInvocationResult, ToolError>> {
            Box::pin(async move {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(ToolInvocationResult::continue_with("late"))
            })
        }
    }

    fn executor() -> ToolExecutor {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool);
        registry.register(PanickingTool);
        registry.register(SlowTool);
        registry.register(StrictArgsTool);
        ToolExecutor::new(Arc::new(registry))
    }

    fn call(name: &str, arguments: &str) -> ToolCall {
        ToolCall {
            id: "call_1".to_string(),
            name: name.to_string(),
            arguments: arguments.to_string(),
        }
    }

    #[tokio::test]
    async fn executes_tool_and_reports_status_lines() {
        let log = Arc::new(StatusLog::default());
        let context = ToolExecutionContext::new()
            .with_client_id("client-1")
            .with_status_reporter(log.clone());

        let result = executor()
            .execute(
                &call("echo", r#"{"task_description":"Echoing","x":1}"#),
                &context,
            )
            .await;

        assert!(result.continue_processing());
        assert_eq!(result.result_message, r#"{"x":1}"#);
        assert_eq!(result.task_description.as_deref(), Some("Echoing"));
        assert_eq!(result.output_format.as_deref(), Some("json"));
        assert_eq!(
            *log.lines.lock().expect("lines lock"),
            vec![
                "Echoing".to_string(),
                "Executing tool: echo".to_string(),
                "Tool echo completed".to_string()
            ]
        );
    }

    #[tokio::test]
    async fn resolves_tools_by_id() {
        let result = executor()
            .execute(&call("tool-echo", "{}"), &ToolExecutionContext::new())
            .await;
        assert!(result.continue_processing());
    }

    #[tokio::test]
    async fn unknown_tool_fails_closed() {
        let result = executor()
            .execute(&call("missing", "{}"), &ToolExecutionContext::new())
            .await;

        assert!(!result.continue_processing());
        assert_eq!(
            result.outcome,
            ToolOutcome::Failed {
                error: "Unknown tool: missing".to_string()
            }
        );
    }

    #[tokio::test]
    async fn panicking_tool_becomes_failed_result() {
        let result = executor()
            .execute(&call("explode", "{}"), &ToolExecutionContext::new())
            .await;

        assert!(result.is_failure());
        assert!(result.result_message.contains("kaboom"));
    }

    #[tokio::test]
    async fn panic_before_the_future_is_built_becomes_failed_result() {
        let handle = tokio::spawn(async {
            executor()
                .execute(&call("strict", "{not json"), &ToolExecutionContext::new())
                .await
        });
        let result = handle.await.expect("executor task must not panic");

        assert!(result.is_failure());
        assert!(!result.continue_processing());
        assert!(result.result_message.contains("arguments are valid JSON"));
    }

    #[tokio::test]
    async fn slow_tool_times_out() {
        let result = executor()
            .with_timeout(Duration::from_millis(10))
            .execute(&call("slow", "{}"), &ToolExecutionContext::new())
            .await;

        assert!(result.is_failure());
        assert!(result.result_message.contains("timed out"));
    }
}
