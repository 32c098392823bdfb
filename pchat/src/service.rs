//! Conversation-level entry point used by the hub.
//!
//! One tree per conversation is cached behind a `tokio::sync::Mutex`. A
//! submission holds that mutex for its whole loop, and a second submission
//! to the same conversation fails fast with [`ChatErrorKind::Busy`].
//!
//! When the policy names a secondary model, the first answer in a new
//! conversation also spawns a background request for a short title.
//!
//! [`ChatErrorKind::Busy`]: crate::ChatErrorKind::Busy

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use pcommon::{ClientId, ConversationId, MessageId, SamplingOptions};
use pprovider::{Attachment, LinearMessage, ModelRequest};

use crate::{
    CancellationRegistry, ChatError, ChatNotifier, ConversationStore, ConversationTree,
    InterjectionBox, LoopOutcome, LoopRequest, LoopTermination, MessagePayload, ToolExecutionLoop,
    UpdateSource, tree::clamp_summary,
};

const SUMMARY_EXCERPT_CHARS: usize = 250;

type Session = Arc<tokio::sync::Mutex<ConversationTree>>;

#[derive(Debug, Clone, PartialEq)]
pub struct SubmitRequest {
    pub client_id: ClientId,
    /// `None` starts a new conversation.
    pub conversation_id: Option<ConversationId>,
    /// Defaults to the conversation's active leaf.
    pub parent_message_id: Option<MessageId>,
    /// Branch from this message instead of appending.
    pub edit_of: Option<MessageId>,
    pub content: String,
    pub attachments: Vec<Attachment>,
    pub model: Option<String>,
    pub system_prompt: Option<String>,
    pub tool_ids: Option<Vec<String>>,
    pub options: SamplingOptions,
}

impl SubmitRequest {
    pub fn new(client_id: impl Into<ClientId>, content: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            conversation_id: None,
            parent_message_id: None,
            edit_of: None,
            content: content.into(),
            attachments: Vec::new(),
            model: None,
            system_prompt: None,
            tool_ids: None,
            options: SamplingOptions::default(),
        }
    }

    pub fn with_conversation_id(mut self, conversation_id: impl Into<ConversationId>) -> Self {
        self.conversation_id = Some(conversation_id.into());
        self
    }

    pub fn with_parent(mut self, parent_message_id: MessageId) -> Self {
        self.parent_message_id = Some(parent_message_id);
        self
    }

    pub fn with_edit_of(mut self, edit_of: MessageId) -> Self {
        self.edit_of = Some(edit_of);
        self
    }

    pub fn with_attachments(mut self, attachments: Vec<Attachment>) -> Self {
        self.attachments = attachments;
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
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
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitOutcome {
    pub conversation_id: ConversationId,
    pub user_message_id: MessageId,
    /// One entry per loop run; more than one when interjections resumed the loop.
    pub loops: Vec<LoopOutcome>,
}

impl SubmitOutcome {
    pub fn termination(&self) -> Option<&LoopTermination> {
        self.loops.last().map(|outcome| &outcome.termination)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationSummary {
    pub conversation_id: ConversationId,
    pub summary: String,
    pub last_modified: DateTime<Utc>,
}

impl From<&ConversationTree> for ConversationSummary {
    fn from(tree: &ConversationTree) -> Self {
        Self {
            conversation_id: tree.id.clone(),
            summary: tree.summary(),
            last_modified: tree.updated_at,
        }
    }
}

pub struct ChatService {
    tool_loop: ToolExecutionLoop,
    store: Arc<dyn ConversationStore>,
    notifier: Arc<dyn ChatNotifier>,
    interjections: Arc<InterjectionBox>,
    cancellations: CancellationRegistry,
    sessions: Mutex<HashMap<ConversationId, Session>>,
}

impl ChatService {
    pub fn new(tool_loop: ToolExecutionLoop) -> Self {
        Self {
            store: tool_loop.store(),
            notifier: tool_loop.notifier(),
            interjections: tool_loop.interjections(),
            tool_loop,
            cancellations: CancellationRegistry::new(),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn tool_loop(&self) -> &ToolExecutionLoop {
        &self.tool_loop
    }

    /// Appends (or branches) a user message and runs the tool loop to completion.
    pub async fn submit(&self, request: SubmitRequest) -> Result<SubmitOutcome, ChatError> {
        if request.content.trim().is_empty() && request.attachments.is_empty() {
            return Err(ChatError::invalid_request("message content must not be empty"));
        }

        let policy = self.tool_loop.policy();
        let model = request
            .model
            .clone()
            .or_else(|| policy.default_model.clone())
            .ok_or_else(|| {
                ChatError::invalid_request("no model selected and no default model configured")
            })?;
        let provider = self
            .tool_loop
            .catalog()
            .get(&model)
            .map(|entry| entry.provider)
            .ok_or_else(|| ChatError::invalid_request(format!("unknown model '{model}'")))?;

        let conversation_id = request
            .conversation_id
            .clone()
            .unwrap_or_else(ConversationId::generate);
        let session = self.session(&conversation_id).await?;
        let mut tree = Arc::clone(&session).try_lock_owned().map_err(|_| {
            ChatError::busy(format!(
                "conversation '{conversation_id}' already has an active request"
            ))
        })?;

        let client_id = request.client_id.clone();
        if self.interjections.take(&client_id)?.is_some() {
            tracing::debug!(phase = "chat", event = "stale_interjection_dropped", client = %client_id, conversation = %conversation_id);
        }
        let is_new = tree.is_empty();

        let payload = MessagePayload::user(request.content).with_attachments(request.attachments);
        let user_message_id = match &request.edit_of {
            Some(original) => tree.edit_message(original, payload)?,
            None => {
                let parent = request
                    .parent_message_id
                    .clone()
                    .or_else(|| tree.active_leaf().cloned());
                tree.add_message(parent.as_ref(), payload)?
            }
        };
        self.store.save_conversation(&tree).await?;
        if let Some(message) = tree.get(&user_message_id) {
            self.notifier
                .conversation_updated(&client_id, &conversation_id, message, UpdateSource::User);
        }
        self.announce(&tree);

        let loop_request = LoopRequest {
            client_id: client_id.clone(),
            provider,
            model,
            system_prompt: request.system_prompt.or_else(|| policy.system_prompt.clone()),
            tool_ids: request.tool_ids,
            options: request.options,
            cancellation: self.cancellations.begin(&client_id)?,
        };

        let mut loops = Vec::new();
        let mut start = user_message_id.clone();
        loop {
            let outcome = self.tool_loop.run(&mut tree, start, &loop_request).await?;
            let resume_from = match &outcome.termination {
                LoopTermination::Interjected { message_id } if policy.resume_after_interjection => {
                    Some(message_id.clone())
                }
                _ => None,
            };
            loops.push(outcome);

            match resume_from {
                Some(message_id) => {
                    tracing::info!(phase = "chat", event = "resume_after_interjection", conversation = %conversation_id);
                    start = message_id;
                }
                None => break,
            }
        }
        self.announce(&tree);
        if is_new && let Some(first) = loops.first() {
            self.spawn_summary(session, &tree, &user_message_id, &first.leaf_id);
        }

        Ok(SubmitOutcome {
            conversation_id,
            user_message_id,
            loops,
        })
    }

    /// Trips the cancellation token of every in-flight request from `client_id`.
    pub fn cancel(&self, client_id: &ClientId) -> Result<bool, ChatError> {
        let cancelled = self.cancellations.cancel(client_id)?;
        tracing::info!(phase = "chat", event = "cancel", client = %client_id, cancelled);
        Ok(cancelled)
    }

    pub fn interject(&self, client_id: &ClientId, text: impl Into<String>) -> Result<(), ChatError> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(ChatError::invalid_request("interjection must not be empty"));
        }
        self.interjections.store(client_id, text)
    }

    /// Drops per-client state once its channel is gone.
    pub fn disconnect(&self, client_id: &ClientId) -> Result<(), ChatError> {
        self.cancellations.cancel(client_id)?;
        self.interjections.take(client_id)?;
        Ok(())
    }

    /// Cached tree when idle, else the last saved copy.
    pub async fn load_conversation(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<ConversationTree, ChatError> {
        let cached = self.sessions()?.get(conversation_id).cloned();
        if let Some(session) = cached
            && let Ok(tree) = session.try_lock()
        {
            return Ok(tree.clone());
        }
        self.store.load_conversation(conversation_id).await
    }

    pub async fn conversation_list(&self) -> Result<Vec<ConversationSummary>, ChatError> {
        Ok(self
            .store
            .all_conversations()
            .await?
            .iter()
            .map(ConversationSummary::from)
            .collect())
    }

    pub async fn delete_conversation(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<(), ChatError> {
        {
            let mut sessions = self.sessions()?;
            if let Some(session) = sessions.get(conversation_id)
                && session.try_lock().is_err()
            {
                return Err(ChatError::busy(format!(
                    "conversation '{conversation_id}' has an active request"
                )));
            }
            sessions.remove(conversation_id);
        }
        self.store.delete_conversation(conversation_id).await
    }

    async fn session(&self, conversation_id: &ConversationId) -> Result<Session, ChatError> {
        let cached = self.sessions()?.get(conversation_id).cloned();
        if let Some(session) = cached {
            return Ok(session);
        }

        let tree = match self.store.load_conversation(conversation_id).await {
            Ok(tree) => {
                tree.validate()?;
                tree
            }
            Err(error) if error.is_not_found() => ConversationTree::new(conversation_id.clone()),
            Err(error) => return Err(error),
        };

        let mut sessions = self.sessions()?;
        let session = sessions
            .entry(conversation_id.clone())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(tree)));
        Ok(Arc::clone(session))
    }

    fn sessions(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<ConversationId, Session>>, ChatError> {
        self.sessions
            .lock()
            .map_err(|_| ChatError::store("session cache lock poisoned"))
    }

    /// Asks the secondary model for a 6-10 word title of the opening
    /// exchange. Failures are logged and leave the fallback summary in place.
    fn spawn_summary(
        &self,
        session: Session,
        tree: &ConversationTree,
        user_message_id: &MessageId,
        answer_id: &MessageId,
    ) {
        let Some(model) = self.tool_loop.policy().secondary_model.clone() else {
            return;
        };
        let conversation_id = tree.id.clone();
        let Some(provider) = self.tool_loop.catalog().get(&model).map(|entry| entry.provider)
        else {
            tracing::warn!(phase = "chat", event = "summary_skipped", conversation = %conversation_id, %model, reason = "unknown secondary model");
            return;
        };

        let excerpt = |id: &MessageId| {
            tree.get(id)
                .map(|message| message.text().chars().take(SUMMARY_EXCERPT_CHARS).collect::<String>())
                .unwrap_or_default()
        };
        let prompt = format!(
            "Generate a concise 6 - 10 word summary of the following content. Produce NO OTHER OUTPUT WHATSOEVER.\n\n```txt\nUser: {}\nAI: {}\n```\n",
            excerpt(user_message_id),
            excerpt(answer_id),
        );
        let request = match ModelRequest::builder(provider, model)
            .message(LinearMessage::user(prompt))
            .build()
        {
            Ok(request) => request,
            Err(error) => {
                tracing::warn!(phase = "chat", event = "summary_failed", conversation = %conversation_id, reason = %error);
                return;
            }
        };

        let gateway = self.tool_loop.gateway().clone();
        let store = Arc::clone(&self.store);
        let notifier = Arc::clone(&self.notifier);
        tokio::spawn(async move {
            let response = gateway.fetch_with(request, |_| {}).await;
            let text = response.text.trim();
            if !response.success || text.is_empty() {
                tracing::warn!(phase = "chat", event = "summary_failed", conversation = %conversation_id, reason = %response.text);
                return;
            }
            let summary = clamp_summary(text);

            let mut tree = session.lock().await;
            match store.load_conversation(&conversation_id).await {
                Ok(_) => {}
                Err(error) if error.is_not_found() => {
                    tracing::debug!(phase = "chat", event = "summary_discarded", conversation = %conversation_id);
                    return;
                }
                Err(error) => {
                    tracing::warn!(phase = "chat", event = "summary_failed", conversation = %conversation_id, reason = %error);
                    return;
                }
            }
            tree.set_summary(summary.clone());
            if let Err(error) = store.save_conversation(&tree).await {
                tracing::warn!(phase = "chat", event = "summary_failed", conversation = %conversation_id, reason = %error);
                return;
            }
            notifier.conversation_list_changed(&tree.id, &summary, tree.updated_at);
            tracing::debug!(phase = "chat", event = "summary_saved", conversation = %conversation_id);
        });
    }

    fn announce(&self, tree: &ConversationTree) {
        self.notifier
            .conversation_list_changed(&tree.id, &tree.summary(), tree.updated_at);
    }
}

impl std::fmt::Debug for ChatService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatService")
            .field("tool_loop", &self.tool_loop)
            .finish_non_exhaustive()
    }
}
