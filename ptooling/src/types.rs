//! Tool runtime context and invocation result types.

use std::fmt::Formatter;
use std::sync::Arc;

use pcommon::{ClientId, ConversationId, MetadataMap};
use pprovider::Attachment;
use serde::{Deserialize, Serialize};

use crate::{NoopStatusReporter, StatusReporter};

/// Extra properties handed to [`crate::Tool::process`].
#[derive(Clone)]
pub struct ToolExecutionContext {
    pub client_id: Option<ClientId>,
    pub conversation_id: Option<ConversationId>,
    pub metadata: MetadataMap,
    status: Arc<dyn StatusReporter>,
}

impl ToolExecutionContext {
    pub fn new() -> Self {
        Self {
            client_id: None,
            conversation_id: None,
            metadata: MetadataMap::new(),
            status: Arc::new(NoopStatusReporter),
        }
    }

    pub fn with_client_id(mut self, client_id: impl Into<ClientId>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    pub fn with_conversation_id(mut self, conversation_id: impl Into<ConversationId>) -> Self {
        self.conversation_id = Some(conversation_id.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn with_status_reporter(mut self, status: Arc<dyn StatusReporter>) -> Self {
        self.status = status;
        self
    }

    /// Sends a status line to the originating client, if there is one.
    pub fn report_status(&self, message: &str) {
        match &self.client_id {
            Some(client_id) => self.status.report_status(client_id, message),
            None => tracing::debug!(phase = "tool", event = "status", message),
        }
    }
}

impl Default for ToolExecutionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ToolExecutionContext {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolExecutionContext")
            .field("client_id", &self.client_id)
            .field("conversation_id", &self.conversation_id)
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}

/// How the loop proceeds after a tool invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum ToolOutcome {
    /// Feed the result back to the model for another turn.
    Continue,
    /// The tool ended the loop on purpose.
    Complete,
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocationResult {
    pub was_processed: bool,
    pub outcome: ToolOutcome,
    pub result_message: String,
    pub status_message: Option<String>,
    pub attachments: Vec<Attachment>,
    pub user_interjection: Option<String>,
    pub task_description: Option<String>,
    pub output_format: Option<String>,
}

impl ToolInvocationResult {
    fn with_outcome(outcome: ToolOutcome, result_message: impl Into<String>) -> Self {
        Self {
            was_processed: true,
            outcome,
            result_message: result_message.into(),
            status_message: None,
            attachments: Vec::new(),
            user_interjection: None,
            task_description: None,
            output_format: None,
        }
    }

    pub fn continue_with(result_message: impl Into<String>) -> Self {
        Self::with_outcome(ToolOutcome::Continue, result_message)
    }

    pub fn complete(result_message: impl Into<String>) -> Self {
        Self::with_outcome(ToolOutcome::Complete, result_message)
    }

    pub fn failed(error: impl Into<String>) -> Self {
        let error = error.into();
        Self {
            was_processed: false,
            ..Self::with_outcome(
                ToolOutcome::Failed {
                    error: error.clone(),
                },
                error,
            )
        }
    }

    pub fn continue_processing(&self) -> bool {
        matches!(self.outcome, ToolOutcome::Continue)
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.outcome, ToolOutcome::Failed { .. })
    }

    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            ToolOutcome::Failed { error } => Some(error),
            _ => None,
        }
    }

    pub fn with_status_message(mut self, status_message: impl Into<String>) -> Self {
        self.status_message = Some(status_message.into());
        self
    }

    pub fn with_attachments(mut self, attachments: Vec<Attachment>) -> Self {
        self.attachments = attachments;
        self
    }

    pub fn with_user_interjection(mut self, interjection: impl Into<String>) -> Self {
        self.user_interjection = Some(interjection.into());
        self
    }

    pub fn with_task_description(mut self, task_description: impl Into<String>) -> Self {
        self.task_description = Some(task_description.into());
        self
    }

    pub fn with_output_format(mut self, output_format: impl Into<String>) -> Self {
        self.output_format = Some(output_format.into());
        self
    }
}
