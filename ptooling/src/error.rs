//! Faults raised by a single tool invocation.
//!
//! A `ToolError` never crosses the executor boundary: [`ToolError::into_result`]
//! turns it into a terminal [`ToolInvocationResult`] that the loop records.
//!
//! ```rust
//! use ptooling::{ToolError, ToolOutcome};
//!
//! let result = ToolError::execution("disk full").with_tool_name("write_file").into_result();
//! assert_eq!(
//!     result.outcome,
//!     ToolOutcome::Failed { error: "Tool write_file failed: disk full".to_string() }
//! );
//! ```

use std::any::Any;
use std::error::Error;
use std::fmt::{Display, Formatter};

use crate::ToolInvocationResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolErrorKind {
    NotFound,
    InvalidArguments,
    Execution,
    Timeout,
    Unauthorized,
    Panicked,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolError {
    pub kind: ToolErrorKind,
    pub message: String,
    pub tool_name: Option<String>,
    pub tool_call_id: Option<String>,
}

impl ToolError {
    pub fn new(kind: ToolErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            tool_name: None,
            tool_call_id: None,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::NotFound, message)
    }

    pub fn invalid_arguments(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::InvalidArguments, message)
    }

    pub fn execution(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::Execution, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::Timeout, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::Unauthorized, message)
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::Other, message)
    }

    /// Builds an error from a `catch_unwind` payload.
    pub fn panicked(payload: &(dyn Any + Send)) -> Self {
        let detail = if let Some(message) = payload.downcast_ref::<&str>() {
            (*message).to_string()
        } else if let Some(message) = payload.downcast_ref::<String>() {
            message.clone()
        } else {
            "unknown panic".to_string()
        };
        Self::new(ToolErrorKind::Panicked, format!("tool panicked: {detail}"))
    }

    pub fn with_tool_name(mut self, tool_name: impl Into<String>) -> Self {
        self.tool_name = Some(tool_name.into());
        self
    }

    pub fn with_tool_call_id(mut self, tool_call_id: impl Into<String>) -> Self {
        self.tool_call_id = Some(tool_call_id.into());
        self
    }

    /// Text recorded in the conversation when this error ends a loop.
    pub fn result_text(&self) -> String {
        match (&self.tool_name, self.kind) {
            (_, ToolErrorKind::NotFound) | (None, _) => self.message.clone(),
            (Some(tool_name), _) => format!("Tool {tool_name} failed: {}", self.message),
        }
    }

    pub fn into_result(self) -> ToolInvocationResult {
        ToolInvocationResult::failed(self.result_text())
    }
}

impl Display for ToolError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.kind)?;
        if let Some(tool_name) = &self.tool_name {
            write!(f, " [tool={tool_name}")?;
            if let Some(call_id) = &self.tool_call_id {
                write!(f, ", call_id={call_id}")?;
            }
            f.write_str("]")?;
        }
        write!(f, ": {}", self.message)
    }
}

impl Error for ToolError {}

impl From<ToolError> for ToolInvocationResult {
    fn from(error: ToolError) -> Self {
        error.into_result()
    }
}
