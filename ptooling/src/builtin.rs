//! Built-in loop control tools.
//!
//! Both end the current tool loop: `Stop` when the model has nothing more to
//! do, `PresentResultsAndAwaitUserInput` when it wants the user to respond.

use pprovider::ToolDefinition;

use crate::args::{optional_string, parse_json_object};
use crate::{Tool, ToolError, ToolExecutionContext, ToolFuture, ToolInvocationResult, ToolRegistry};

pub const STOP_TOOL_NAME: &str = "Stop";
pub const PRESENT_RESULTS_TOOL_NAME: &str = "PresentResultsAndAwaitUserInput";

const CONTROL_CATEGORY: &str = "MaxCompletion";

pub fn register_builtins(registry: &mut ToolRegistry) {
    registry.register(StopTool);
    registry.register(PresentResultsTool);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct StopTool;

impl Tool for StopTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            STOP_TOOL_NAME,
            "Ends the current task once no further tool calls are needed.",
            r#"{"type":"object","properties":{"reason":{"type":"string","description":"Why the task is finished"}}}"#,
        )
        .with_category(CONTROL_CATEGORY)
    }

    fn process<'a>(
        &'a self,
        params_json: &'a str,
        _context: &'a ToolExecutionContext,
    ) -> ToolFuture<'a, Result<ToolInvocationResult, ToolError>> {
        Box::pin(async move {
            let reason = parse_json_object(params_json)
                .ok()
                .and_then(|args| optional_string(&args, "reason"))
                .filter(|reason| !reason.trim().is_empty());

            let message = match reason {
                Some(reason) => format!("Stopped: {reason}"),
                None => "Stopped".to_string(),
            };
            Ok(ToolInvocationResult::complete(message))
        })
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PresentResultsTool;

impl Tool for PresentResultsTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            PRESENT_RESULTS_TOOL_NAME,
            "Presents the results so far to the user and waits for their reply.",
            r#"{"type":"object","properties":{"results":{"type":"string","description":"Summary to show the user"}},"required":["results"]}"#,
        )
        .with_category(CONTROL_CATEGORY)
        .with_output_format("md")
    }

    fn process<'a>(
        &'a self,
        params_json: &'a str,
        _context: &'a ToolExecutionContext,
    ) -> ToolFuture<'a, Result<ToolInvocationResult, ToolError>> {
        Box::pin(async move {
            let args = parse_json_object(params_json)?;
            let results = optional_string(&args, "results").unwrap_or_default();
            Ok(ToolInvocationResult::complete(results).with_output_format("md"))
        })
    }
}
