//! Generic trigger context.
//!
//! A trigger stream delivers both HTTP requests and topic messages to one
//! worker. The worker routes each trigger to the handler for its kind, see
//! [`TriggerHandlers`](crate::worker::TriggerHandlers).

use super::http::{unwrap_values, wrap_values};
use super::{
    EventResponse, Extras, Frame, HttpContext, HttpRequest, HttpResponse, MessageContext,
    MessageRequest, WorkerContext,
};
use crate::proto::faas::{
    self as wire, ClientMessage, HeaderValue, ServerMessage, client_message, server_message,
    trigger_request, trigger_response,
};

/// A topic delivery.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TopicTrigger {
    /// Topic the message was published to
    pub topic: String,
}

/// What caused the trigger.
#[derive(Clone, Debug, PartialEq)]
pub enum TriggerKind {
    /// An HTTP request; the body is the trigger data
    Http(HttpRequest),
    /// A topic message; the payload is the trigger data
    Topic(TopicTrigger),
}

/// An inbound trigger.
#[derive(Clone, Debug, PartialEq)]
pub struct TriggerRequest {
    data: Vec<u8>,
    mime_type: String,
    kind: TriggerKind,
}

impl TriggerRequest {
    /// Create a trigger request.
    pub fn new(data: impl Into<Vec<u8>>, mime_type: impl Into<String>, kind: TriggerKind) -> Self {
        Self {
            data: data.into(),
            mime_type: mime_type.into(),
            kind,
        }
    }

    /// Raw trigger payload.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Mime type of the payload.
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// What caused the trigger.
    pub fn kind(&self) -> &TriggerKind {
        &self.kind
    }

    /// Returns true for HTTP triggers.
    pub fn is_http(&self) -> bool {
        matches!(self.kind, TriggerKind::Http(_))
    }

    /// Returns true for topic triggers.
    pub fn is_topic(&self) -> bool {
        matches!(self.kind, TriggerKind::Topic(_))
    }
}

/// Response to a trigger, shaped after its kind.
#[derive(Clone, Debug, PartialEq)]
pub enum TriggerResponse {
    /// Response to an HTTP trigger
    Http(HttpResponse),
    /// Response to a topic trigger
    Topic(EventResponse),
}

/// Context for a trigger handler.
#[derive(Clone, Debug)]
pub struct TriggerContext {
    id: String,
    /// The trigger
    pub request: TriggerRequest,
    /// The response, matching the trigger kind
    pub response: TriggerResponse,
    /// Values shared between middleware
    pub extras: Extras,
}

impl TriggerContext {
    /// Create a context with the default response for the trigger kind.
    pub fn new(id: impl Into<String>, request: TriggerRequest) -> Self {
        let response = match request.kind {
            TriggerKind::Http(_) => TriggerResponse::Http(HttpResponse::default()),
            TriggerKind::Topic(_) => TriggerResponse::Topic(EventResponse::default()),
        };
        Self {
            id: id.into(),
            request,
            response,
            extras: Extras::new(),
        }
    }

    /// View an HTTP trigger as an [`HttpContext`].
    ///
    /// Returns `None` for topic triggers.
    pub fn to_http(&self) -> Option<HttpContext> {
        let TriggerKind::Http(req) = &self.request.kind else {
            return None;
        };
        let request = req.clone().with_body(self.request.data.clone());
        let mut ctx = HttpContext::new(self.id.clone(), request);
        if let TriggerResponse::Http(resp) = &self.response {
            ctx.response = resp.clone();
        }
        ctx.extras = self.extras.clone();
        Some(ctx)
    }

    /// View a topic trigger as a [`MessageContext`].
    ///
    /// The payload is decoded as JSON; anything else is passed on as a string.
    /// Returns `None` for HTTP triggers.
    pub fn to_message(&self) -> Option<MessageContext> {
        let TriggerKind::Topic(topic) = &self.request.kind else {
            return None;
        };
        let payload = serde_json::from_slice(&self.request.data).unwrap_or_else(|_| {
            serde_json::Value::String(String::from_utf8_lossy(&self.request.data).into_owned())
        });
        let request = MessageRequest::new(topic.topic.clone(), payload);
        let mut ctx = MessageContext::new(self.id.clone(), request);
        if let TriggerResponse::Topic(resp) = &self.response {
            ctx.response = *resp;
        }
        ctx.extras = self.extras.clone();
        Some(ctx)
    }

    /// Take the response and extras of a finished HTTP handler.
    pub fn with_http(mut self, ctx: HttpContext) -> Self {
        self.response = TriggerResponse::Http(ctx.response);
        self.extras = ctx.extras;
        self
    }

    /// Take the response and extras of a finished topic handler.
    pub fn with_message(mut self, ctx: MessageContext) -> Self {
        self.response = TriggerResponse::Topic(ctx.response);
        self.extras = ctx.extras;
        self
    }
}

fn trigger_kind(context: trigger_request::Context) -> TriggerKind {
    match context {
        trigger_request::Context::Http(http) => {
            let mut req = HttpRequest::new(http.method, http.path);
            for (name, values) in unwrap_values(http.headers, |v| v.value) {
                for value in values {
                    req = req.with_header(name.clone(), value);
                }
            }
            for (name, values) in unwrap_values(http.query_params, |v| v.value) {
                for value in values {
                    req = req.with_query(name.clone(), value);
                }
            }
            for (name, value) in http.path_params {
                req = req.with_path_param(name, value);
            }
            TriggerKind::Http(req)
        }
        trigger_request::Context::Topic(topic) => {
            TriggerKind::Topic(TopicTrigger { topic: topic.topic })
        }
    }
}

impl WorkerContext for TriggerContext {
    type ClientMessage = ClientMessage;
    type ServerMessage = ServerMessage;

    fn decode(message: ServerMessage) -> Frame<Self> {
        match message.content {
            Some(server_message::Content::InitResponse(_)) => Frame::Registered,
            Some(server_message::Content::TriggerRequest(req)) => match req.context {
                Some(context) => Frame::Event(Self::new(
                    message.id,
                    TriggerRequest::new(req.data, req.mime_type, trigger_kind(context)),
                )),
                None => Frame::Unrecognized,
            },
            None => Frame::Unrecognized,
        }
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn fallback(&self) -> Self {
        let kind = match &self.request.kind {
            TriggerKind::Http(req) => TriggerKind::Http(HttpRequest::new(req.method(), req.path())),
            TriggerKind::Topic(topic) => TriggerKind::Topic(topic.clone()),
        };
        Self::new(
            self.id.clone(),
            TriggerRequest::new(Vec::new(), self.request.mime_type.clone(), kind),
        )
    }

    fn with_error(mut self, _error: &anyhow::Error) -> Self {
        self.response = match self.request.kind {
            TriggerKind::Http(_) => TriggerResponse::Http(HttpResponse::internal_error()),
            TriggerKind::Topic(_) => TriggerResponse::Topic(EventResponse { success: false }),
        };
        self
    }

    fn into_client_message(self) -> ClientMessage {
        let response = match self.response {
            TriggerResponse::Http(resp) => wire::TriggerResponse {
                data: resp.body,
                context: Some(trigger_response::Context::Http(wire::HttpResponseContext {
                    headers: wrap_values(resp.headers, |value| HeaderValue { value }),
                    status: resp.status,
                })),
            },
            TriggerResponse::Topic(resp) => wire::TriggerResponse {
                data: Vec::new(),
                context: Some(trigger_response::Context::Topic(wire::TopicResponseContext {
                    success: resp.success,
                })),
            },
        };
        ClientMessage {
            id: self.id,
            content: Some(client_message::Content::TriggerResponse(response)),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use serde_json::json;

    use super::*;

    fn http_trigger() -> TriggerContext {
        TriggerContext::new(
            "t-1",
            TriggerRequest::new(
                b"hi".to_vec(),
                "text/plain",
                TriggerKind::Http(HttpRequest::new("GET", "/hello").with_header("Accept", "*/*")),
            ),
        )
    }

    fn topic_trigger(data: &[u8]) -> TriggerContext {
        TriggerContext::new(
            "t-2",
            TriggerRequest::new(
                data.to_vec(),
                "application/json",
                TriggerKind::Topic(TopicTrigger {
                    topic: "updates".to_string(),
                }),
            ),
        )
    }

    #[test]
    fn test_defaults_follow_kind() {
        assert_eq!(
            http_trigger().response,
            TriggerResponse::Http(HttpResponse::default())
        );
        assert_eq!(
            topic_trigger(b"{}").response,
            TriggerResponse::Topic(EventResponse { success: true })
        );
    }

    #[test]
    fn test_http_view_round_trip() {
        let trigger = http_trigger();
        let mut http = trigger.to_http().unwrap();
        assert!(trigger.to_message().is_none());
        assert_eq!(http.request.body(), b"hi");
        assert_eq!(http.request.header("accept"), Some("*/*"));

        http.response.status = 204;
        let trigger = trigger.with_http(http);
        let msg = trigger.into_client_message();
        let Some(client_message::Content::TriggerResponse(resp)) = msg.content else {
            panic!("expected a trigger response");
        };
        assert!(matches!(
            resp.context,
            Some(trigger_response::Context::Http(wire::HttpResponseContext { status: 204, .. }))
        ));
    }

    #[test]
    fn test_topic_view_decodes_json() {
        let trigger = topic_trigger(br#"{"n": 1}"#);
        let message = trigger.to_message().unwrap();
        assert_eq!(message.request.topic_name(), "updates");
        assert_eq!(message.request.message(), &json!({"n": 1}));

        let raw = topic_trigger(b"plain").to_message().unwrap();
        assert_eq!(raw.request.message(), &json!("plain"));
    }

    #[test]
    fn test_fallback_keeps_kind_only() {
        let http = http_trigger().fallback();
        assert!(http.request.is_http());
        assert!(http.request.data().is_empty());
        assert_eq!(http.response, TriggerResponse::Http(HttpResponse::default()));

        let topic = topic_trigger(br#"{"n": 1}"#).fallback();
        assert_eq!(
            topic.request.kind(),
            &TriggerKind::Topic(TopicTrigger {
                topic: "updates".to_string()
            })
        );
        assert!(topic.request.data().is_empty());
    }

    #[test]
    fn test_with_error_follows_kind() {
        let http = http_trigger().with_error(&anyhow::anyhow!("x"));
        assert!(matches!(http.response, TriggerResponse::Http(HttpResponse { status: 500, .. })));

        let topic = topic_trigger(b"{}").with_error(&anyhow::anyhow!("x"));
        assert_eq!(topic.response, TriggerResponse::Topic(EventResponse { success: false }));
    }
}
