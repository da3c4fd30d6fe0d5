//! Websocket workers.

use async_trait::async_trait;
use tonic::Status;
use tonic::transport::Channel;

use super::StreamWorker;
use super::stream::{BoxEventStream, Transport, open_bidi};
use crate::context::{WebsocketContext, WebsocketEventType};
use crate::middleware::Middleware;
use crate::proto::websockets::{
    self as wire, ClientMessage, RegistrationRequest, ServerMessage, client_message,
    websocket_handler_client::WebsocketHandlerClient,
};

/// One event type on a websocket.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WebsocketRegistration {
    /// Name of the socket
    pub socket_name: String,
    /// Event type handled by the worker
    pub event_type: WebsocketEventType,
}

impl WebsocketRegistration {
    /// Handle `event_type` on the named socket.
    pub fn new(socket_name: impl Into<String>, event_type: WebsocketEventType) -> Self {
        Self {
            socket_name: socket_name.into(),
            event_type,
        }
    }
}

impl From<WebsocketRegistration> for ClientMessage {
    fn from(registration: WebsocketRegistration) -> Self {
        ClientMessage {
            id: String::new(),
            content: Some(client_message::Content::RegistrationRequest(
                RegistrationRequest {
                    socket_name: registration.socket_name,
                    event_type: wire::WebsocketEventType::from(registration.event_type) as i32,
                },
            )),
        }
    }
}

#[async_trait]
impl Transport<ClientMessage, ServerMessage> for WebsocketHandlerClient<Channel> {
    async fn open(
        &mut self,
        registration: ClientMessage,
    ) -> Result<BoxEventStream<ClientMessage, ServerMessage>, Status> {
        open_bidi(registration, |outbound| self.handle_events(outbound)).await
    }
}

impl StreamWorker<WebsocketContext> {
    /// A worker handling one event type on a websocket.
    pub fn websocket(
        channel: Channel,
        registration: WebsocketRegistration,
        middleware: Middleware<WebsocketContext>,
    ) -> Self {
        Self::new(
            format!(
                "websocket {} {:?}",
                registration.socket_name, registration.event_type
            ),
            WebsocketHandlerClient::new(channel),
            registration.into(),
            middleware,
        )
    }
}
