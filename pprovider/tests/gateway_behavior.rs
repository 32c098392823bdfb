use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::StreamExt;
use pprovider::{
    BoxedEventStream, GatewayEvent, LinearMessage, ModelGateway, ModelProvider, ModelRequest,
    ModelResponse, ProviderError, ProviderFuture, ProviderId, ProviderOperationHooks,
    ProviderRegistry, RetryPolicy, StreamEvent, VecEventStream,
};

#[derive(Debug, Default)]
struct FlakyProvider {
    attempts: Mutex<u32>,
    failures_before_success: u32,
}

impl ModelProvider for FlakyProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Anthropic
    }

    fn stream<'a>(
        &'a self,
        request: ModelRequest,
    ) -> ProviderFuture<'a, Result<BoxedEventStream<'a>, ProviderError>> {
        Box::pin(async move {
            let attempt = {
                let mut attempts = self.attempts.lock().expect("attempts lock");
                *attempts += 1;
                *attempts
            };
            if attempt <= self.failures_before_success {
                return Err(ProviderError::unavailable("overloaded"));
            }

            let reply = format!("echo: {}", request.messages[0].content);
            Ok(Box::pin(VecEventStream::new(vec![
                Ok(StreamEvent::TextDelta(reply.clone())),
                Ok(StreamEvent::ResponseComplete(ModelResponse::completed(
                    ProviderId::Anthropic,
                    request.model,
                    reply,
                ))),
            ])) as BoxedEventStream<'a>)
        })
    }
}

#[derive(Default)]
struct RecordingHooks {
    events: Mutex<Vec<String>>,
}

impl ProviderOperationHooks for RecordingHooks {
    fn on_attempt_start(&self, provider: ProviderId, operation: &str, attempt: u32) {
        self.events
            .lock()
            .expect("events lock")
            .push(format!("start:{provider}:{operation}:{attempt}"));
    }

    fn on_failure(&self, provider: ProviderId, operation: &str, attempts: u32, _: &ProviderError) {
        self.events
            .lock()
            .expect("events lock")
            .push(format!("failure:{provider}:{operation}:{attempts}"));
    }
}

fn gateway(provider: FlakyProvider, hooks: Arc<RecordingHooks>) -> ModelGateway {
    let mut registry = ProviderRegistry::new();
    registry.register(provider);
    ModelGateway::new(Arc::new(registry))
        .with_retry_policy(RetryPolicy::new(2).with_initial_backoff(Duration::from_millis(1)))
        .with_hooks(hooks)
}

fn request() -> ModelRequest {
    ModelRequest::builder(ProviderId::Anthropic, "claude-sonnet")
        .message(LinearMessage::user("ping"))
        .build()
        .expect("valid request")
}

#[tokio::test]
async fn gateway_recovers_from_one_transient_failure() {
    let hooks = Arc::new(RecordingHooks::default());
    let gateway = gateway(
        FlakyProvider {
            failures_before_success: 1,
            ..FlakyProvider::default()
        },
        hooks.clone(),
    );

    let events = gateway.fetch(request()).collect::<Vec<_>>().await;
    assert_eq!(events.len(), 2);
    let GatewayEvent::Complete(response) = &events[1] else {
        panic!("terminal event expected");
    };
    assert!(response.success);
    assert_eq!(response.text, "echo: ping");

    let recorded = hooks.events.lock().expect("events lock").clone();
    assert_eq!(
        recorded,
        vec![
            "start:anthropic:stream:1".to_string(),
            "start:anthropic:stream:2".to_string()
        ]
    );
}

#[tokio::test]
async fn gateway_folds_exhausted_retries_into_failure_response() {
    let hooks = Arc::new(RecordingHooks::default());
    let gateway = gateway(
        FlakyProvider {
            failures_before_success: 5,
            ..FlakyProvider::default()
        },
        hooks.clone(),
    );

    let events = gateway.fetch(request()).collect::<Vec<_>>().await;
    assert_eq!(events.len(), 1);
    let GatewayEvent::Complete(response) = &events[0] else {
        panic!("terminal event expected");
    };
    assert!(!response.success);
    assert!(response.text.contains("overloaded"));
    assert!(
        hooks
            .events
            .lock()
            .expect("events lock")
            .contains(&"failure:anthropic:stream:2".to_string())
    );
}

#[tokio::test]
async fn gateway_rejects_invalid_request_without_calling_provider() {
    let hooks = Arc::new(RecordingHooks::default());
    let gateway = gateway(FlakyProvider::default(), hooks.clone());
    let mut invalid = request();
    invalid.messages.clear();

    let response = gateway.fetch_with(invalid, |_| {}).await;
    assert!(!response.success);
    assert!(hooks.events.lock().expect("events lock").is_empty());
}
