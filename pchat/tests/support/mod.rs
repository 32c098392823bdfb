#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use pchat::{
    ChatLoopHooks, ChatNotifier, ChatPolicy, ConversationStore, InMemoryConversationStore,
    LoopTermination, Message, ModelCatalog, ModelEntry, ToolExecutionLoop, UpdateSource,
};
use pcommon::{ClientId, ConversationId, MessageId};
use pprovider::{
    BoxedEventStream, ModelGateway, ModelPricing, ModelProvider, ModelRequest, ModelResponse,
    ProviderError, ProviderFuture, ProviderId, ProviderRegistry, RetryPolicy, StreamEvent,
    TokenUsage, ToolCall, VecEventStream,
};
use ptooling::{StatusReporter, ToolExecutor, ToolRegistry};
use tokio_util::sync::CancellationToken;

pub const MODEL: &str = "gpt-test";

#[derive(Debug, Clone)]
pub enum Turn {
    Text(String),
    Tool { name: String, arguments: String },
    Fail(ProviderError),
    /// Streams one delta and then never finishes.
    Stall(String),
}

impl Turn {
    pub fn text(text: &str) -> Self {
        Self::Text(text.to_string())
    }

    pub fn tool(name: &str, arguments: &str) -> Self {
        Self::Tool {
            name: name.to_string(),
            arguments: arguments.to_string(),
        }
    }
}

/// Plays back scripted turns; the last turn repeats once the script runs out.
pub struct ScriptedProvider {
    turns: Mutex<VecDeque<Turn>>,
    fallback: Turn,
    requests: Mutex<Vec<ModelRequest>>,
}

impl ScriptedProvider {
    pub fn new(turns: Vec<Turn>) -> Self {
        let fallback = turns.last().cloned().unwrap_or_else(|| Turn::text("done"));
        Self {
            turns: Mutex::new(turns.into()),
            fallback,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests.lock().expect("requests lock").clone()
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().expect("requests lock").len()
    }
}

impl ModelProvider for ScriptedProvider {
    fn id(&self) -> ProviderId {
        ProviderId::OpenAi
    }

    fn stream<'a>(
        &'a self,
        request: ModelRequest,
    ) -> ProviderFuture<'a, Result<BoxedEventStream<'a>, ProviderError>> {
        Box::pin(async move {
            let turn = {
                let mut turns = self.turns.lock().expect("turns lock");
                turns.pop_front().unwrap_or_else(|| self.fallback.clone())
            };
            let model = request.model.clone();
            self.requests
                .lock()
                .expect("requests lock")
                .push(request);

            let usage = TokenUsage::new(1_000_000, 1_000_000);
            match turn {
                Turn::Text(text) => Ok(Box::pin(VecEventStream::new(vec![
                    Ok(StreamEvent::TextDelta(text.clone())),
                    Ok(StreamEvent::ResponseComplete(
                        ModelResponse::completed(ProviderId::OpenAi, model, text).with_usage(usage),
                    )),
                ])) as BoxedEventStream<'a>),
                Turn::Tool { name, arguments } => {
                    let call = ToolCall {
                        id: format!("call_{name}"),
                        name,
                        arguments,
                    };
                    Ok(Box::pin(VecEventStream::new(vec![
                        Ok(StreamEvent::ToolCallDelta(call.clone())),
                        Ok(StreamEvent::ResponseComplete(
                            ModelResponse::completed(ProviderId::OpenAi, model, "")
                                .with_tool_call(call)
                                .with_usage(usage),
                        )),
                    ])) as BoxedEventStream<'a>)
                }
                Turn::Fail(error) => Err(error),
                Turn::Stall(text) => {
                    let stream = async_stream::stream! {
                        yield Ok::<_, ProviderError>(StreamEvent::TextDelta(text));
                        std::future::pending::<()>().await;
                    };
                    Ok(Box::pin(stream) as BoxedEventStream<'a>)
                }
            }
        })
    }
}

/// Records notifications; optionally cancels a token on the first delta.
#[derive(Default)]
pub struct RecordingNotifier {
    pub events: Mutex<Vec<String>>,
    pub updates: Mutex<Vec<(UpdateSource, Message)>>,
    cancel_on_delta: Mutex<Option<CancellationToken>>,
}

impl RecordingNotifier {
    pub fn cancel_on_first_delta(&self, token: CancellationToken) {
        *self.cancel_on_delta.lock().expect("cancel lock") = Some(token);
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().expect("events lock").clone()
    }

    pub fn sources(&self) -> Vec<UpdateSource> {
        self.updates
            .lock()
            .expect("updates lock")
            .iter()
            .map(|(source, _)| *source)
            .collect()
    }
}

impl ChatNotifier for RecordingNotifier {
    fn streaming_delta(
        &self,
        _client_id: &ClientId,
        _conversation_id: &ConversationId,
        _message_id: &MessageId,
        delta: &str,
    ) {
        self.events
            .lock()
            .expect("events lock")
            .push(format!("delta:{delta}"));
        if let Some(token) = self.cancel_on_delta.lock().expect("cancel lock").take() {
            token.cancel();
        }
    }

    fn streaming_complete(
        &self,
        _client_id: &ClientId,
        _conversation_id: &ConversationId,
        _message_id: &MessageId,
    ) {
        self.events
            .lock()
            .expect("events lock")
            .push("complete".to_string());
    }

    fn conversation_updated(
        &self,
        _client_id: &ClientId,
        _conversation_id: &ConversationId,
        message: &Message,
        source: UpdateSource,
    ) {
        self.updates
            .lock()
            .expect("updates lock")
            .push((source, message.clone()));
    }

    fn conversation_list_changed(
        &self,
        conversation_id: &ConversationId,
        summary: &str,
        _last_modified: DateTime<Utc>,
    ) {
        self.events
            .lock()
            .expect("events lock")
            .push(format!("list:{conversation_id}:{summary}"));
    }
}

#[derive(Default)]
pub struct RecordingHooks {
    pub events: Mutex<Vec<String>>,
}

impl ChatLoopHooks for RecordingHooks {
    fn on_loop_start(&self, _conversation_id: &ConversationId, client_id: &ClientId) {
        self.push(format!("start:{client_id}"));
    }

    fn on_iteration_start(&self, _conversation_id: &ConversationId, iteration: u32) {
        self.push(format!("iteration:{iteration}"));
    }

    fn on_tool_dispatch(&self, _conversation_id: &ConversationId, tool_name: &str) {
        self.push(format!("tool:{tool_name}"));
    }

    fn on_loop_end(
        &self,
        _conversation_id: &ConversationId,
        termination: &LoopTermination,
        iterations: u32,
    ) {
        self.push(format!("end:{}:{iterations}", termination.as_str()));
    }
}

impl RecordingHooks {
    fn push(&self, event: String) {
        self.events.lock().expect("events lock").push(event);
    }
}

#[derive(Default)]
pub struct StatusLog {
    pub lines: Mutex<Vec<String>>,
}

impl StatusReporter for StatusLog {
    fn report_status(&self, _client_id: &ClientId, message: &str) {
        self.lines
            .lock()
            .expect("lines lock")
            .push(message.to_string());
    }
}

pub struct Harness {
    pub provider: Arc<ScriptedProvider>,
    pub store: Arc<InMemoryConversationStore>,
    pub notifier: Arc<RecordingNotifier>,
    pub hooks: Arc<RecordingHooks>,
    pub status: Arc<StatusLog>,
    pub tool_loop: ToolExecutionLoop,
}

pub fn harness(turns: Vec<Turn>, tools: ToolRegistry, policy: ChatPolicy) -> Harness {
    let provider = Arc::new(ScriptedProvider::new(turns));
    let mut providers = ProviderRegistry::new();
    providers.register_arc(provider.clone());
    let gateway =
        ModelGateway::new(Arc::new(providers)).with_retry_policy(RetryPolicy::no_retry());

    let store = Arc::new(InMemoryConversationStore::new());
    let notifier = Arc::new(RecordingNotifier::default());
    let hooks = Arc::new(RecordingHooks::default());
    let status = Arc::new(StatusLog::default());
    let catalog = ModelCatalog::new().with_model(
        ModelEntry::new(MODEL, ProviderId::OpenAi).with_pricing(ModelPricing::new(1.0, 2.0)),
    );

    let tool_loop = ToolExecutionLoop::new(
        gateway,
        ToolExecutor::new(Arc::new(tools)),
        store.clone() as Arc<dyn ConversationStore>,
    )
    .with_notifier(notifier.clone())
    .with_hooks(hooks.clone())
    .with_status_reporter(status.clone())
    .with_catalog(Arc::new(catalog))
    .with_policy(policy.with_default_model(MODEL));

    Harness {
        provider,
        store,
        notifier,
        hooks,
        status,
        tool_loop,
    }
}
