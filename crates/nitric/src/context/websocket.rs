//! Websocket context.

use std::collections::HashMap;

use super::http::unwrap_values;
use super::{Extras, Frame, WorkerContext};
use crate::proto::websockets::{
    self as wire, ClientMessage, ServerMessage, client_message, server_message,
    websocket_event_request, websocket_event_response,
};

/// Kind of websocket event a worker registers for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WebsocketEventType {
    /// A client is connecting
    Connect,
    /// A client disconnected
    Disconnect,
    /// A client sent a message
    Message,
}

impl From<WebsocketEventType> for wire::WebsocketEventType {
    fn from(value: WebsocketEventType) -> Self {
        match value {
            WebsocketEventType::Connect => wire::WebsocketEventType::Connect,
            WebsocketEventType::Disconnect => wire::WebsocketEventType::Disconnect,
            WebsocketEventType::Message => wire::WebsocketEventType::Message,
        }
    }
}

/// Payload of a websocket event.
#[derive(Clone, Debug, PartialEq)]
pub enum WebsocketEvent {
    /// Connection request, with the query parameters of the upgrade request
    Connect {
        /// Query parameters
        query: HashMap<String, Vec<String>>,
    },
    /// The connection closed
    Disconnect,
    /// A message arrived
    Message {
        /// Message body
        body: Vec<u8>,
    },
}

impl WebsocketEvent {
    /// The kind of this event.
    pub fn event_type(&self) -> WebsocketEventType {
        match self {
            WebsocketEvent::Connect { .. } => WebsocketEventType::Connect,
            WebsocketEvent::Disconnect => WebsocketEventType::Disconnect,
            WebsocketEvent::Message { .. } => WebsocketEventType::Message,
        }
    }
}

/// A websocket event.
#[derive(Clone, Debug, PartialEq)]
pub struct WebsocketRequest {
    socket_name: String,
    connection_id: String,
    event: WebsocketEvent,
}

impl WebsocketRequest {
    /// Create a request for an event on a connection.
    pub fn new(
        socket_name: impl Into<String>,
        connection_id: impl Into<String>,
        event: WebsocketEvent,
    ) -> Self {
        Self {
            socket_name: socket_name.into(),
            connection_id: connection_id.into(),
            event,
        }
    }

    /// Name of the socket.
    pub fn socket_name(&self) -> &str {
        &self.socket_name
    }

    /// Id of the client connection.
    pub fn connection_id(&self) -> &str {
        &self.connection_id
    }

    /// The event payload.
    pub fn event(&self) -> &WebsocketEvent {
        &self.event
    }

    /// The kind of event.
    pub fn event_type(&self) -> WebsocketEventType {
        self.event.event_type()
    }

    /// Message body, for message events.
    pub fn message(&self) -> Option<&[u8]> {
        match &self.event {
            WebsocketEvent::Message { body } => Some(body),
            _ => None,
        }
    }
}

/// The response to a websocket event.
///
/// Only connection events carry a response the server acts on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WebsocketResponse {
    /// Refuse the connection
    pub reject: bool,
}

/// Context for a websocket event handler.
#[derive(Clone, Debug)]
pub struct WebsocketContext {
    id: String,
    /// The event
    pub request: WebsocketRequest,
    /// The response
    pub response: WebsocketResponse,
    /// Values shared between middleware
    pub extras: Extras,
}

impl WebsocketContext {
    /// Create a context with the default (accepting) response.
    pub fn new(id: impl Into<String>, request: WebsocketRequest) -> Self {
        Self {
            id: id.into(),
            request,
            response: WebsocketResponse::default(),
            extras: Extras::new(),
        }
    }
}

fn websocket_request(req: wire::WebsocketEventRequest) -> Option<WebsocketRequest> {
    use websocket_event_request::WebsocketEvent as Wire;

    let event = match req.websocket_event? {
        Wire::Connection(conn) => WebsocketEvent::Connect {
            query: unwrap_values(conn.query_params, |v| v.value),
        },
        Wire::Disconnection(_) => WebsocketEvent::Disconnect,
        Wire::Message(msg) => WebsocketEvent::Message { body: msg.body },
    };
    Some(WebsocketRequest::new(req.socket_name, req.connection_id, event))
}

impl WorkerContext for WebsocketContext {
    type ClientMessage = ClientMessage;
    type ServerMessage = ServerMessage;

    fn decode(message: ServerMessage) -> Frame<Self> {
        match message.content {
            Some(server_message::Content::RegistrationResponse(_)) => Frame::Registered,
            Some(server_message::Content::WebsocketEventRequest(req)) => {
                match websocket_request(req) {
                    Some(request) => Frame::Event(Self::new(message.id, request)),
                    None => Frame::Unrecognized,
                }
            }
            None => Frame::Unrecognized,
        }
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn fallback(&self) -> Self {
        let event = match &self.request.event {
            WebsocketEvent::Connect { .. } => WebsocketEvent::Connect {
                query: Default::default(),
            },
            WebsocketEvent::Disconnect => WebsocketEvent::Disconnect,
            WebsocketEvent::Message { .. } => WebsocketEvent::Message { body: Vec::new() },
        };
        let request = WebsocketRequest::new(
            self.request.socket_name(),
            self.request.connection_id(),
            event,
        );
        Self::new(self.id.clone(), request)
    }

    fn with_error(mut self, _error: &anyhow::Error) -> Self {
        self.response = WebsocketResponse { reject: true };
        self
    }

    fn into_client_message(self) -> ClientMessage {
        let websocket_response = match self.request.event {
            WebsocketEvent::Connect { .. } => Some(
                websocket_event_response::WebsocketResponse::ConnectionResponse(
                    wire::WebsocketConnectionResponse {
                        reject: self.response.reject,
                    },
                ),
            ),
            _ => None,
        };
        ClientMessage {
            id: self.id,
            content: Some(client_message::Content::WebsocketEventResponse(
                wire::WebsocketEventResponse { websocket_response },
            )),
        }
    }
}
