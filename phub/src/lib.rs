//! Client-facing notification hub: wire envelopes, the client registry and
//! the WebSocket server that feeds the chat service.
//!
//! ```rust
//! use phub::prelude::*;
//! use pcommon::ClientId;
//!
//! let hub = NotificationHub::new();
//! let (channel, mut outbound) = ClientChannel::unbounded();
//! hub.register(ClientId::new("client-1"), channel).unwrap();
//!
//! hub.send_to_client(&ClientId::new("client-1"), ServerMessage::Pong);
//! assert_eq!(outbound.try_recv().unwrap(), ServerMessage::Pong);
//! ```

mod dispatch;
mod envelope;
mod error;
mod hub;
mod server;

pub mod prelude {
    pub use crate::{
        ClientChannel, ClientMessage, Dispatcher, HubError, HubErrorKind, HubServer,
        NotificationHub, ServerMessage, SubmitPayload,
    };
}

pub use dispatch::Dispatcher;
pub use envelope::{ClientMessage, ServerMessage, SubmitPayload};
pub use error::{HubError, HubErrorKind};
pub use hub::{ClientChannel, NotificationHub};
pub use server::HubServer;
