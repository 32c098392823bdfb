//! Tool trait contract for registry-managed capabilities.
//!
//! ```rust
//! use pprovider::ToolDefinition;
//! use ptooling::{FunctionTool, Tool, ToolInvocationResult};
//!
//! let tool = FunctionTool::new(
//!     ToolDefinition::new("echo", "Echoes input", r#"{"type":"object"}"#),
//!     |params, _ctx| async move { Ok(ToolInvocationResult::continue_with(params)) },
//! );
//!
//! assert_eq!(tool.definition().name, "echo");
//! ```

use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use pcommon::BoxFuture;
use pprovider::ToolDefinition;

use crate::{ToolError, ToolExecutionContext, ToolInvocationResult};

pub type ToolFuture<'a, T> = BoxFuture<'a, T>;

pub trait Tool: Send + Sync {
    fn definition(&self) -> ToolDefinition;

    fn process<'a>(
        &'a self,
        params_json: &'a str,
        context: &'a ToolExecutionContext,
    ) -> ToolFuture<'a, Result<ToolInvocationResult, ToolError>>;

    /// Called when the working directory the tool operates on changes.
    fn update_project_root(&self, _project_root: &Path) {}
}

type ToolHandler = dyn Fn(String, ToolExecutionContext) -> ToolFuture<'static, Result<ToolInvocationResult, ToolError>>
    + Send
    + Sync;

pub struct FunctionTool {
    definition: ToolDefinition,
    handler: Arc<ToolHandler>,
}

impl FunctionTool {
    pub fn new<F, Fut>(definition: ToolDefinition, handler: F) -> Self
    where
        F: Fn(String, ToolExecutionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ToolInvocationResult, ToolError>> + Send + 'static,
    {
        let handler: Arc<ToolHandler> =
            Arc::new(move |params_json, context| Box::pin(handler(params_json, context)));

        Self {
            definition,
            handler,
        }
    }
}

impl Tool for FunctionTool {
    fn definition(&self) -> ToolDefinition {
        self.definition.clone()
    }

    fn process<'a>(
        &'a self,
        params_json: &'a str,
        context: &'a ToolExecutionContext,
    ) -> ToolFuture<'a, Result<ToolInvocationResult, ToolError>> {
        (self.handler)(params_json.to_string(), context.clone())
    }
}
