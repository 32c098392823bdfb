//! Bounded model/tool turn loop over one conversation.
//!
//! Each iteration linearizes the active path, calls the gateway, appends the
//! AI turn, and dispatches at most one tool. The loop ends when the model
//! answers without a tool, a tool stops continuation, a failure or cancel is
//! observed, an interjection arrives, or the iteration ceiling is reached.
//! Every terminal failure leaves a system message in the tree.

use std::sync::Arc;

use pcommon::{ClientId, MessageId, SamplingOptions};
use pprovider::{CostEngine, ModelGateway, ModelRequest, ModelResponse, ProviderId};
use ptooling::{
    NoopStatusReporter, StatusReporter, ToolExecutionContext, ToolExecutor, ToolOutcome,
};
use tokio_util::sync::CancellationToken;

use crate::{
    ChatError, ChatLoopHooks, ChatNotifier, ContentBlock, ConversationStore, ConversationTree,
    InterjectionBox, MessagePayload, MessageRole, ModelCatalog, NoopChatLoopHooks,
    NoopChatNotifier, UpdateSource, build_linear_history,
};

pub const DEFAULT_MAX_TOOL_ITERATIONS: u32 = 50;
pub const CANCELLED_NOTICE: &str = "Request cancelled";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatPolicy {
    pub max_tool_iterations: u32,
    /// Start a fresh loop from an interjection instead of stopping.
    pub resume_after_interjection: bool,
    pub default_model: Option<String>,
    pub system_prompt: Option<String>,
    /// Writes a short summary for each new conversation in the background.
    pub secondary_model: Option<String>,
}

impl Default for ChatPolicy {
    fn default() -> Self {
        Self {
            max_tool_iterations: DEFAULT_MAX_TOOL_ITERATIONS,
            resume_after_interjection: true,
            default_model: None,
            system_prompt: None,
            secondary_model: None,
        }
    }
}

impl ChatPolicy {
    pub fn with_max_tool_iterations(mut self, max_tool_iterations: u32) -> Self {
        self.max_tool_iterations = max_tool_iterations;
        self
    }

    pub fn with_resume_after_interjection(mut self, resume: bool) -> Self {
        self.resume_after_interjection = resume;
        self
    }

    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = Some(model.into());
        self
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }

    pub fn with_secondary_model(mut self, model: impl Into<String>) -> Self {
        self.secondary_model = Some(model.into());
        self
    }
}

/// Why a loop run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopTermination {
    /// The model answered without naming a tool.
    Completed,
    ToolCompleted {
        tool_name: String,
    },
    ToolFailed {
        tool_name: String,
        error: String,
    },
    ProviderFailed {
        error: String,
    },
    Cancelled,
    IterationLimit {
        limit: u32,
    },
    Interjected {
        message_id: MessageId,
    },
}

impl LoopTermination {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::ToolCompleted { .. } => "tool_completed",
            Self::ToolFailed { .. } => "tool_failed",
            Self::ProviderFailed { .. } => "provider_failed",
            Self::Cancelled => "cancelled",
            Self::IterationLimit { .. } => "iteration_limit",
            Self::Interjected { .. } => "interjected",
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Self::ToolFailed { .. } | Self::ProviderFailed { .. } | Self::IterationLimit { .. }
        )
    }
}

#[derive(Debug, Clone)]
pub struct LoopRequest {
    pub client_id: ClientId,
    pub provider: ProviderId,
    pub model: String,
    pub system_prompt: Option<String>,
    /// Tools offered to the model; `None` offers every registered tool.
    pub tool_ids: Option<Vec<String>>,
    pub options: SamplingOptions,
    pub cancellation: CancellationToken,
}

impl LoopRequest {
    pub fn new(client_id: impl Into<ClientId>, provider: ProviderId, model: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            provider,
            model: model.into(),
            system_prompt: None,
            tool_ids: None,
            options: SamplingOptions::default(),
            cancellation: CancellationToken::new(),
        }
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }

    pub fn with_tool_ids(mut self, tool_ids: Vec<String>) -> Self {
        self.tool_ids = Some(tool_ids);
        self
    }

    pub fn with_options(mut self, options: SamplingOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = cancellation;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopOutcome {
    pub termination: LoopTermination,
    /// Provider calls made.
    pub iterations: u32,
    pub tool_invocations: u32,
    /// Last message appended by the run, or the start message if none was.
    pub leaf_id: MessageId,
}

#[derive(Clone)]
pub struct ToolExecutionLoop {
    gateway: ModelGateway,
    executor: ToolExecutor,
    store: Arc<dyn ConversationStore>,
    notifier: Arc<dyn ChatNotifier>,
    status: Arc<dyn StatusReporter>,
    interjections: Arc<InterjectionBox>,
    hooks: Arc<dyn ChatLoopHooks>,
    catalog: Arc<ModelCatalog>,
    cost_engine: CostEngine,
    policy: ChatPolicy,
}

impl ToolExecutionLoop {
    pub fn new(
        gateway: ModelGateway,
        executor: ToolExecutor,
        store: Arc<dyn ConversationStore>,
    ) -> Self {
        Self {
            gateway,
            executor,
            store,
            notifier: Arc::new(NoopChatNotifier),
            status: Arc::new(NoopStatusReporter),
            interjections: Arc::new(InterjectionBox::new()),
            hooks: Arc::new(NoopChatLoopHooks),
            catalog: Arc::new(ModelCatalog::new()),
            cost_engine: CostEngine::new(),
            policy: ChatPolicy::default(),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn ChatNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_status_reporter(mut self, status: Arc<dyn StatusReporter>) -> Self {
        self.status = status;
        self
    }

    pub fn with_interjections(mut self, interjections: Arc<InterjectionBox>) -> Self {
        self.interjections = interjections;
        self
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn ChatLoopHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_catalog(mut self, catalog: Arc<ModelCatalog>) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn with_policy(mut self, policy: ChatPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> &ChatPolicy {
        &self.policy
    }

    pub fn gateway(&self) -> &ModelGateway {
        &self.gateway
    }

    pub fn catalog(&self) -> Arc<ModelCatalog> {
        Arc::clone(&self.catalog)
    }

    pub fn notifier(&self) -> Arc<dyn ChatNotifier> {
        Arc::clone(&self.notifier)
    }

    pub fn interjections(&self) -> Arc<InterjectionBox> {
        Arc::clone(&self.interjections)
    }

    pub fn store(&self) -> Arc<dyn ConversationStore> {
        Arc::clone(&self.store)
    }

    pub fn executor(&self) -> &ToolExecutor {
        &self.executor
    }

    /// Drives the loop from `start`, which is normally the user message that
    /// opened the turn. The tree is saved after every append.
    pub async fn run(
        &self,
        tree: &mut ConversationTree,
        start: MessageId,
        request: &LoopRequest,
    ) -> Result<LoopOutcome, ChatError> {
        let conversation_id = tree.id.clone();
        let client_id = &request.client_id;
        let limit = self.policy.max_tool_iterations;

        self.hooks.on_loop_start(&conversation_id, client_id);
        tracing::info!(
            phase = "loop",
            event = "start",
            conversation = %conversation_id,
            client = %client_id,
            provider = %request.provider,
            model = %request.model
        );

        let mut leaf = start;
        let mut iterations = 0_u32;
        let mut tool_invocations = 0_u32;

        let termination = loop {
            if iterations >= limit {
                tracing::warn!(phase = "loop", event = "iteration_limit", conversation = %conversation_id, limit);
                leaf = self
                    .append(
                        tree,
                        &leaf,
                        MessagePayload::system(format!(
                            "Stopped after reaching the limit of {limit} tool iterations"
                        )),
                        client_id,
                        UpdateSource::System,
                    )
                    .await?;
                break LoopTermination::IterationLimit { limit };
            }

            if iterations > 0
                && let Some(text) = self.interjections.take(client_id)?
            {
                leaf = self
                    .append(tree, &leaf, MessagePayload::user(text), client_id, UpdateSource::User)
                    .await?;
                break LoopTermination::Interjected {
                    message_id: leaf.clone(),
                };
            }

            iterations += 1;
            self.hooks.on_iteration_start(&conversation_id, iterations);
            tracing::debug!(phase = "loop", event = "iteration_start", conversation = %conversation_id, iteration = iterations);

            let ai_id = MessageId::generate();
            let (response, streamed) = self.call_model(tree, &leaf, request, &ai_id).await?;

            if response.cancelled {
                tracing::info!(phase = "loop", event = "cancelled", conversation = %conversation_id);
                if !streamed.is_empty() {
                    leaf = self
                        .append(
                            tree,
                            &leaf,
                            MessagePayload::ai(streamed).with_id(ai_id),
                            client_id,
                            UpdateSource::Ai,
                        )
                        .await?;
                }
                leaf = self
                    .append(
                        tree,
                        &leaf,
                        MessagePayload::system(CANCELLED_NOTICE),
                        client_id,
                        UpdateSource::System,
                    )
                    .await?;
                break LoopTermination::Cancelled;
            }

            if !response.success {
                tracing::error!(phase = "loop", event = "provider_failed", conversation = %conversation_id, error = %response.text);
                leaf = self
                    .append(
                        tree,
                        &leaf,
                        MessagePayload::system(response.text.clone()),
                        client_id,
                        UpdateSource::System,
                    )
                    .await?;
                break LoopTermination::ProviderFailed {
                    error: response.text,
                };
            }

            leaf = self
                .append(
                    tree,
                    &leaf,
                    self.ai_payload(&response, &request.model, ai_id),
                    client_id,
                    UpdateSource::Ai,
                )
                .await?;

            let Some(tool_call) = response.tool_call else {
                break LoopTermination::Completed;
            };

            tool_invocations += 1;
            self.hooks.on_tool_dispatch(&conversation_id, &tool_call.name);
            let context = ToolExecutionContext::new()
                .with_client_id(client_id.clone())
                .with_conversation_id(conversation_id.clone())
                .with_status_reporter(Arc::clone(&self.status));
            let result = self.executor.execute(&tool_call, &context).await;
            if let Some(status) = &result.status_message {
                context.report_status(status);
            }

            let tool_response = MessagePayload::new(
                MessageRole::User,
                vec![ContentBlock::ToolResponse {
                    tool_call_id: tool_call.id.clone(),
                    tool_name: tool_call.name.clone(),
                    content: result.result_message.clone(),
                    output_format: result.output_format.clone(),
                }],
            )
            .with_attachments(result.attachments.clone());
            leaf = self
                .append(tree, &leaf, tool_response, client_id, UpdateSource::Tool)
                .await?;

            let interjection = match result.user_interjection.clone() {
                Some(text) => Some(text),
                None => self.interjections.take(client_id)?,
            };
            if let Some(text) = interjection {
                leaf = self
                    .append(tree, &leaf, MessagePayload::user(text), client_id, UpdateSource::User)
                    .await?;
                break LoopTermination::Interjected {
                    message_id: leaf.clone(),
                };
            }

            match result.outcome {
                ToolOutcome::Continue => continue,
                ToolOutcome::Complete => {
                    break LoopTermination::ToolCompleted {
                        tool_name: tool_call.name,
                    };
                }
                ToolOutcome::Failed { error } => {
                    leaf = self
                        .append(
                            tree,
                            &leaf,
                            MessagePayload::system(error.clone()),
                            client_id,
                            UpdateSource::System,
                        )
                        .await?;
                    break LoopTermination::ToolFailed {
                        tool_name: tool_call.name,
                        error,
                    };
                }
            }
        };

        self.hooks
            .on_loop_end(&conversation_id, &termination, iterations);
        tracing::info!(
            phase = "loop",
            event = "end",
            conversation = %conversation_id,
            termination = termination.as_str(),
            iterations,
            tool_invocations
        );

        Ok(LoopOutcome {
            termination,
            iterations,
            tool_invocations,
            leaf_id: leaf,
        })
    }

    async fn call_model(
        &self,
        tree: &ConversationTree,
        leaf: &MessageId,
        request: &LoopRequest,
        ai_id: &MessageId,
    ) -> Result<(ModelResponse, String), ChatError> {
        let history = build_linear_history(tree, leaf, request.system_prompt.as_deref())?;
        let registry = self.executor.registry();
        let tools = match &request.tool_ids {
            Some(tool_ids) => registry.definitions_for(tool_ids),
            None => registry.definitions(),
        };

        let model_request = ModelRequest::builder(request.provider, request.model.clone())
            .maybe_system_prompt(history.system_prompt.clone())
            .messages(history.provider_messages())
            .tools(tools)
            .options(request.options)
            .cancellation(request.cancellation.clone())
            .build();
        let model_request = match model_request {
            Ok(model_request) => model_request,
            Err(error) => {
                let response = ModelResponse::failure(
                    request.provider,
                    request.model.clone(),
                    format!("{} request failed: {error}", request.provider),
                );
                return Ok((response, String::new()));
            }
        };

        let mut streamed = String::new();
        let response = self
            .gateway
            .fetch_with(model_request, |delta| {
                streamed.push_str(delta);
                self.notifier
                    .streaming_delta(&request.client_id, &tree.id, ai_id, delta);
            })
            .await;
        self.notifier
            .streaming_complete(&request.client_id, &tree.id, ai_id);

        Ok((response, streamed))
    }

    fn ai_payload(&self, response: &ModelResponse, model: &str, ai_id: MessageId) -> MessagePayload {
        let cost_info = self
            .cost_engine
            .cost_info(Some(&response.usage), self.catalog.pricing(model));

        let mut payload = MessagePayload::new(MessageRole::Ai, Vec::new())
            .with_id(ai_id)
            .with_cost_info(cost_info)
            .with_duration(response.duration);
        if !response.text.is_empty() {
            payload = payload.with_block(ContentBlock::text(response.text.clone()));
        }
        if let Some(tool_call) = &response.tool_call {
            payload = payload.with_block(ContentBlock::ToolCall {
                tool_call_id: tool_call.id.clone(),
                tool_name: tool_call.name.clone(),
                arguments: tool_call.arguments.clone(),
            });
        }
        payload
    }

    async fn append(
        &self,
        tree: &mut ConversationTree,
        parent: &MessageId,
        payload: MessagePayload,
        client_id: &ClientId,
        source: UpdateSource,
    ) -> Result<MessageId, ChatError> {
        let id = tree.add_message(Some(parent), payload)?;
        self.store.save_conversation(tree).await?;
        if let Some(message) = tree.get(&id) {
            self.notifier
                .conversation_updated(client_id, &tree.id, message, source);
        }
        Ok(id)
    }
}

impl std::fmt::Debug for ToolExecutionLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolExecutionLoop")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
