//! Capability layer for registering and executing tools.
//!
//! ```rust
//! use std::sync::Arc;
//! use pprovider::ToolCall;
//! use ptooling::prelude::*;
//!
//! # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
//! let executor = ToolExecutor::new(Arc::new(ToolRegistry::with_builtins()));
//! let call = ToolCall {
//!     id: "call_1".to_string(),
//!     name: "Stop".to_string(),
//!     arguments: "{}".to_string(),
//! };
//!
//! let result = executor.execute(&call, &ToolExecutionContext::new()).await;
//! assert!(!result.continue_processing());
//! # });
//! ```

pub mod args;
pub mod builtin;
mod error;
mod executor;
mod registry;
mod status;
mod tool;
mod types;

pub mod prelude {
    pub use crate::{
        FunctionTool, StatusReporter, Tool, ToolError, ToolErrorKind, ToolExecutionContext,
        ToolExecutor, ToolFuture, ToolInvocationResult, ToolOutcome, ToolRegistry,
        ToolRuntimeHooks,
    };
}

pub use args::{
    optional_string, parse_json_object, parse_json_value, required_string, take_task_description,
};
pub use builtin::{PRESENT_RESULTS_TOOL_NAME, PresentResultsTool, STOP_TOOL_NAME, StopTool};
pub use error::{ToolError, ToolErrorKind};
pub use executor::{NoopToolRuntimeHooks, ToolExecutor, ToolRuntimeHooks};
pub use registry::ToolRegistry;
pub use status::{NoopStatusReporter, StatusReporter};
pub use tool::{FunctionTool, Tool, ToolFuture};
pub use types::{ToolExecutionContext, ToolInvocationResult, ToolOutcome};
