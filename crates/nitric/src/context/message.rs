//! Topic subscription context.

use serde::de::DeserializeOwned;

use super::value::struct_to_json;
use super::{EventResponse, Extras, Frame, WorkerContext};
use crate::proto::topics::{
    self as wire, ClientMessage, ServerMessage, client_message, message, server_message,
};

/// A message delivered to a subscription.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MessageRequest {
    topic_name: String,
    message: serde_json::Value,
}

impl MessageRequest {
    /// Create a request for the given topic and payload.
    pub fn new(topic_name: impl Into<String>, message: serde_json::Value) -> Self {
        Self {
            topic_name: topic_name.into(),
            message,
        }
    }

    /// Name of the topic the message was published to.
    pub fn topic_name(&self) -> &str {
        &self.topic_name
    }

    /// Message payload.
    pub fn message(&self) -> &serde_json::Value {
        &self.message
    }

    /// Deserialize the payload into a typed value.
    pub fn decode<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        T::deserialize(&self.message)
    }
}

impl From<wire::MessageRequest> for MessageRequest {
    fn from(req: wire::MessageRequest) -> Self {
        let message = match req.message.and_then(|m| m.content) {
            Some(message::Content::StructPayload(payload)) => struct_to_json(payload),
            None => serde_json::Value::Null,
        };
        Self {
            topic_name: req.topic_name,
            message,
        }
    }
}

/// Context for a topic subscriber.
#[derive(Clone, Debug)]
pub struct MessageContext {
    id: String,
    /// The delivered message
    pub request: MessageRequest,
    /// Whether the message was handled
    pub response: EventResponse,
    /// Values shared between middleware
    pub extras: Extras,
}

impl MessageContext {
    /// Create a context with the default (successful) response.
    pub fn new(id: impl Into<String>, request: MessageRequest) -> Self {
        Self {
            id: id.into(),
            request,
            response: EventResponse::default(),
            extras: Extras::new(),
        }
    }
}

impl WorkerContext for MessageContext {
    type ClientMessage = ClientMessage;
    type ServerMessage = ServerMessage;

    fn decode(message: ServerMessage) -> Frame<Self> {
        match message.content {
            Some(server_message::Content::RegistrationResponse(_)) => Frame::Registered,
            Some(server_message::Content::MessageRequest(req)) => {
                Frame::Event(Self::new(message.id, req.into()))
            }
            None => Frame::Unrecognized,
        }
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn fallback(&self) -> Self {
        Self::new(
            self.id.clone(),
            MessageRequest::new(self.request.topic_name(), serde_json::Value::Null),
        )
    }

    fn with_error(mut self, _error: &anyhow::Error) -> Self {
        self.response = EventResponse { success: false };
        self
    }

    fn into_client_message(self) -> ClientMessage {
        ClientMessage {
            id: self.id,
            content: Some(client_message::Content::MessageResponse(
                wire::MessageResponse {
                    success: self.response.success,
                },
            )),
        }
    }
}
