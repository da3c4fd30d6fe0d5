//! Schedule context.

use super::{EventResponse, Extras, Frame, WorkerContext};
use crate::proto::schedules::{
    self as wire, ClientMessage, ServerMessage, client_message, server_message,
};

/// A schedule tick.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IntervalRequest {
    schedule_name: String,
}

impl IntervalRequest {
    /// Create a tick for the named schedule.
    pub fn new(schedule_name: impl Into<String>) -> Self {
        Self {
            schedule_name: schedule_name.into(),
        }
    }

    /// Name of the schedule that fired.
    pub fn schedule_name(&self) -> &str {
        &self.schedule_name
    }
}

/// Context for a schedule handler.
#[derive(Clone, Debug)]
pub struct IntervalContext {
    id: String,
    /// The tick
    pub request: IntervalRequest,
    /// Whether the tick was handled
    pub response: EventResponse,
    /// Values shared between middleware
    pub extras: Extras,
}

impl IntervalContext {
    /// Create a context with the default (successful) response.
    pub fn new(id: impl Into<String>, request: IntervalRequest) -> Self {
        Self {
            id: id.into(),
            request,
            response: EventResponse::default(),
            extras: Extras::new(),
        }
    }
}

impl WorkerContext for IntervalContext {
    type ClientMessage = ClientMessage;
    type ServerMessage = ServerMessage;

    fn decode(message: ServerMessage) -> Frame<Self> {
        match message.content {
            Some(server_message::Content::RegistrationResponse(_)) => Frame::Registered,
            Some(server_message::Content::IntervalRequest(req)) => Frame::Event(Self::new(
                message.id,
                IntervalRequest::new(req.schedule_name),
            )),
            None => Frame::Unrecognized,
        }
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn fallback(&self) -> Self {
        Self::new(self.id.clone(), self.request.clone())
    }

    fn with_error(mut self, _error: &anyhow::Error) -> Self {
        self.response = EventResponse { success: false };
        self
    }

    fn into_client_message(self) -> ClientMessage {
        ClientMessage {
            id: self.id,
            content: Some(client_message::Content::IntervalResponse(
                wire::IntervalResponse {
                    success: self.response.success,
                },
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tick(id: &str) -> ServerMessage {
        ServerMessage {
            id: id.to_string(),
            content: Some(server_message::Content::IntervalRequest(
                wire::IntervalRequest {
                    schedule_name: "nightly".to_string(),
                },
            )),
        }
    }

    #[test]
    fn test_decode_tick() {
        let Frame::Event(ctx) = IntervalContext::decode(tick("i-1")) else {
            panic!("expected an event frame");
        };
        assert_eq!(ctx.id(), "i-1");
        assert_eq!(ctx.request.schedule_name(), "nightly");
        assert!(ctx.response.success);

        let msg = ctx.into_client_message();
        assert_eq!(msg.id, "i-1");
        assert_eq!(
            msg.content,
            Some(client_message::Content::IntervalResponse(
                wire::IntervalResponse { success: true }
            ))
        );
    }

    #[test]
    fn test_registration_ack() {
        let ack = ServerMessage {
            id: String::new(),
            content: Some(server_message::Content::RegistrationResponse(
                wire::RegistrationResponse {},
            )),
        };
        assert!(matches!(IntervalContext::decode(ack), Frame::Registered));
    }

    #[test]
    fn test_with_error_reports_failure() {
        let ctx = IntervalContext::new("i-2", IntervalRequest::new("nightly"));
        let msg = ctx
            .fallback()
            .with_error(&anyhow::anyhow!("missed"))
            .into_client_message();

        assert_eq!(msg.id, "i-2");
        assert_eq!(
            msg.content,
            Some(client_message::Content::IntervalResponse(
                wire::IntervalResponse { success: false }
            ))
        );
    }
}
