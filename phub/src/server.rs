use std::net::SocketAddr;

use futures_util::{SinkExt, StreamExt};
use pcommon::ClientId;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message as Frame;
use tokio_util::sync::CancellationToken;

use crate::dispatch::Dispatcher;
use crate::envelope::ServerMessage;
use crate::error::HubError;
use crate::hub::ClientChannel;

/// Accepts WebSocket clients and wires each one to the hub.
#[derive(Debug)]
pub struct HubServer {
    listener: TcpListener,
    dispatcher: Dispatcher,
}

impl HubServer {
    pub async fn bind(address: &str, dispatcher: Dispatcher) -> Result<Self, HubError> {
        let listener = TcpListener::bind(address)
            .await
            .map_err(|error| HubError::bind(format!("failed to bind '{address}': {error}")))?;
        Ok(Self {
            listener,
            dispatcher,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, HubError> {
        self.listener
            .local_addr()
            .map_err(|error| HubError::bind(format!("listener has no local address: {error}")))
    }

    pub async fn serve(self) -> Result<(), HubError> {
        self.serve_until(CancellationToken::new()).await
    }

    /// Runs the accept loop until `shutdown` is cancelled.
    pub async fn serve_until(self, shutdown: CancellationToken) -> Result<(), HubError> {
        let address = self.local_addr()?;
        tracing::info!(phase = "hub", event = "listening", address = %address);

        loop {
            let accepted = tokio::select! {
                _ = shutdown.cancelled() => break,
                accepted = self.listener.accept() => accepted,
            };
            match accepted {
                Ok((stream, peer)) => {
                    let dispatcher = self.dispatcher.clone();
                    tokio::spawn(async move {
                        if let Err(error) = serve_connection(stream, peer, dispatcher).await {
                            tracing::warn!(phase = "hub", event = "connection_failed", peer = %peer, error = %error);
                        }
                    });
                }
                Err(error) => {
                    tracing::warn!(phase = "hub", event = "accept_failed", error = %error);
                }
            }
        }

        tracing::info!(phase = "hub", event = "stopped", address = %address);
        Ok(())
    }
}

async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    dispatcher: Dispatcher,
) -> Result<(), HubError> {
    let socket = accept_async(stream)
        .await
        .map_err(|error| HubError::handshake(format!("websocket handshake failed: {error}")))?;
    let (mut sink, mut source) = socket.split();

    let client_id = ClientId::generate();
    let (channel, mut outbound) = ClientChannel::unbounded();
    dispatcher.hub().register(client_id.clone(), channel)?;
    tracing::info!(phase = "hub", event = "connected", client = %client_id, peer = %peer);
    dispatcher.hub().send_to_client(
        &client_id,
        ServerMessage::Assigned {
            client_id: client_id.clone(),
        },
    );

    let writer_client = client_id.clone();
    let writer = tokio::spawn(async move {
        while let Some(message) = outbound.recv().await {
            let text = match serde_json::to_string(&message) {
                Ok(text) => text,
                Err(error) => {
                    tracing::warn!(phase = "hub", event = "encode_failed", client = %writer_client, error = %error);
                    continue;
                }
            };
            if let Err(error) = sink.send(Frame::Text(text.into())).await {
                tracing::warn!(phase = "hub", event = "write_failed", client = %writer_client, error = %error);
                break;
            }
        }
        let _ = sink.close().await;
    });

    while let Some(frame) = source.next().await {
        match frame {
            Ok(Frame::Text(text)) => dispatcher.handle_text(&client_id, text.as_str()).await,
            Ok(Frame::Binary(_)) => dispatcher.hub().send_to_client(
                &client_id,
                ServerMessage::error("binary frames are not supported"),
            ),
            Ok(Frame::Close(_)) => break,
            Ok(_) => {}
            Err(error) => {
                tracing::warn!(phase = "hub", event = "read_failed", client = %client_id, error = %error);
                break;
            }
        }
    }

    dispatcher.disconnect(&client_id);
    let _ = writer.await;
    tracing::info!(phase = "hub", event = "disconnected", client = %client_id);
    Ok(())
}
