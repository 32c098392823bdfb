use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use pchat::{
    ChatPolicy, ChatService, ConversationStore, InMemoryConversationStore, ModelCatalog,
    ModelEntry, ToolExecutionLoop, UpdateSource,
};
use pcommon::ClientId;
use pprovider::{
    BoxedEventStream, ModelGateway, ModelProvider, ModelRequest, ModelResponse, ProviderError,
    ProviderFuture, ProviderId, ProviderRegistry, RetryPolicy, StreamEvent, VecEventStream,
};
use phub::{ClientChannel, ClientMessage, Dispatcher, HubServer, NotificationHub, ServerMessage};
use ptooling::{ToolExecutor, ToolRegistry};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_tungstenite::tungstenite::Message as Frame;
use tokio_util::sync::CancellationToken;

const MODEL: &str = "echo-model";

/// Streams the last user message back in two deltas.
struct EchoProvider;

impl ModelProvider for EchoProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Ollama
    }

    fn stream<'a>(
        &'a self,
        request: ModelRequest,
    ) -> ProviderFuture<'a, Result<BoxedEventStream<'a>, ProviderError>> {
        Box::pin(async move {
            let last = request
                .messages
                .last()
                .map(|message| message.content.clone())
                .unwrap_or_default();
            let reply = format!("echo: {last}");
            Ok(Box::pin(VecEventStream::new(vec![
                Ok(StreamEvent::TextDelta("echo: ".to_string())),
                Ok(StreamEvent::TextDelta(last)),
                Ok(StreamEvent::ResponseComplete(ModelResponse::completed(
                    ProviderId::Ollama,
                    request.model.clone(),
                    reply,
                ))),
            ])) as BoxedEventStream<'a>)
        })
    }
}

fn dispatcher() -> Dispatcher {
    let mut providers = ProviderRegistry::new();
    providers.register(EchoProvider);
    let gateway =
        ModelGateway::new(Arc::new(providers)).with_retry_policy(RetryPolicy::no_retry());
    let hub = Arc::new(NotificationHub::new());
    let store: Arc<dyn ConversationStore> = Arc::new(InMemoryConversationStore::new());
    let tool_loop = ToolExecutionLoop::new(
        gateway,
        ToolExecutor::new(Arc::new(ToolRegistry::with_builtins())),
        store,
    )
    .with_notifier(hub.clone())
    .with_status_reporter(hub.clone())
    .with_catalog(Arc::new(
        ModelCatalog::new().with_model(ModelEntry::new(MODEL, ProviderId::Ollama)),
    ))
    .with_policy(ChatPolicy::default().with_default_model(MODEL));

    Dispatcher::new(Arc::new(ChatService::new(tool_loop)), hub)
}

fn connect(dispatcher: &Dispatcher, id: &str) -> mpsc::UnboundedReceiver<ServerMessage> {
    let (channel, receiver) = ClientChannel::unbounded();
    dispatcher
        .hub()
        .register(ClientId::new(id), channel)
        .expect("register should succeed");
    receiver
}

async fn next(receiver: &mut mpsc::UnboundedReceiver<ServerMessage>) -> ServerMessage {
    timeout(Duration::from_secs(2), receiver.recv())
        .await
        .expect("message should arrive in time")
        .expect("channel should stay open")
}

#[tokio::test]
async fn ping_and_interjection_are_acknowledged() {
    let dispatcher = dispatcher();
    let client = ClientId::new("client-1");
    let mut outbound = connect(&dispatcher, "client-1");

    dispatcher.handle_text(&client, r#"{"messageType":"ping"}"#).await;
    assert_eq!(next(&mut outbound).await, ServerMessage::Pong);

    dispatcher
        .handle(
            &client,
            ClientMessage::Interject {
                content: "also check docs".to_string(),
            },
        )
        .await;
    assert_eq!(next(&mut outbound).await, ServerMessage::InterjectionAck);
}

#[tokio::test]
async fn malformed_frames_and_missing_conversations_get_error_envelopes() {
    let dispatcher = dispatcher();
    let client = ClientId::new("client-1");
    let mut outbound = connect(&dispatcher, "client-1");

    dispatcher.handle_text(&client, "not json").await;
    assert!(matches!(next(&mut outbound).await, ServerMessage::Error { .. }));

    dispatcher
        .handle_text(
            &client,
            r#"{"messageType":"loadConversation","content":{"conversationId":"missing"}}"#,
        )
        .await;
    let ServerMessage::Error { message } = next(&mut outbound).await else {
        panic!("expected error envelope");
    };
    assert!(message.contains("NotFound"));
}

#[tokio::test]
async fn submission_streams_deltas_in_order_then_completes() {
    let dispatcher = dispatcher();
    let client = ClientId::new("client-1");
    let mut outbound = connect(&dispatcher, "client-1");

    dispatcher
        .handle_text(
            &client,
            r#"{"messageType":"submit","content":{"content":"hi"}}"#,
        )
        .await;

    let mut kinds = Vec::new();
    let mut deltas = String::new();
    let mut ai_text = None;
    while ai_text.is_none() {
        let message = next(&mut outbound).await;
        kinds.push(message.kind());
        match message {
            ServerMessage::StreamingDelta { content, .. } => deltas.push_str(&content),
            ServerMessage::ConversationUpdate {
                message, source, ..
            } if source == UpdateSource::Ai => ai_text = Some(message.text()),
            _ => {}
        }
    }

    assert_eq!(deltas, "echo: hi");
    assert_eq!(ai_text.as_deref(), Some("echo: hi"));
    let first_delta = kinds.iter().position(|kind| *kind == "streamingDelta");
    let complete = kinds.iter().position(|kind| *kind == "streamingComplete");
    assert!(first_delta < complete);
    assert_eq!(kinds.first(), Some(&"conversationUpdate"));
}

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn read_envelope(socket: &mut Socket) -> ServerMessage {
    loop {
        let frame = timeout(Duration::from_secs(2), socket.next())
            .await
            .expect("frame should arrive in time")
            .expect("socket should stay open")
            .expect("frame should be valid");
        if let Frame::Text(text) = frame {
            return serde_json::from_str(text.as_str()).expect("valid envelope");
        }
    }
}

#[tokio::test]
async fn websocket_clients_get_an_id_and_a_streamed_reply() {
    let dispatcher = dispatcher();
    let hub = Arc::clone(dispatcher.hub());
    let server = HubServer::bind("127.0.0.1:0", dispatcher)
        .await
        .expect("server should bind");
    let address = server.local_addr().expect("local addr");
    let shutdown = CancellationToken::new();
    let serving = tokio::spawn(server.serve_until(shutdown.clone()));

    let (mut socket, _) = connect_async(format!("ws://{address}"))
        .await
        .expect("client should connect");

    let ServerMessage::Assigned { client_id } = read_envelope(&mut socket).await else {
        panic!("first frame should assign a client id");
    };
    assert!(hub.is_registered(&client_id));

    socket
        .send(Frame::Text(
            r#"{"messageType":"submit","content":{"content":"over the wire"}}"#.into(),
        ))
        .await
        .expect("send submit");

    let mut streamed = String::new();
    loop {
        match read_envelope(&mut socket).await {
            ServerMessage::StreamingDelta { content, .. } => streamed.push_str(&content),
            ServerMessage::StreamingComplete { .. } => break,
            _ => {}
        }
    }
    assert_eq!(streamed, "echo: over the wire");

    socket.close(None).await.expect("close");
    for _ in 0..100 {
        if !hub.is_registered(&client_id) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(!hub.is_registered(&client_id));

    shutdown.cancel();
    serving
        .await
        .expect("server task joins")
        .expect("server stops cleanly");
}
