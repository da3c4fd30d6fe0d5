//! Typed contexts for every event source.
//!
//! A context pairs a read-only view of an inbound event (`request`) with the
//! response the handler is building (`response`), plus an `extras` bag that
//! middleware can use to hand derived values to later middleware.
//!
//! Responses are plain values initialised to their defaults when the context
//! is created, so translating a context back to the wire never has to deal
//! with a missing response.

mod blob;
mod http;
mod interval;
mod job;
mod message;
mod trigger;
pub mod value;
mod websocket;

use std::collections::HashMap;

pub use blob::{
    BlobEventContext, BlobEventRequest, BlobEventType, FileEventContext, FileEventRequest, FileRef,
};
pub use http::{HttpContext, HttpRequest, HttpResponse};
pub use interval::{IntervalContext, IntervalRequest};
pub use job::{JobContext, JobRequest};
pub use message::{MessageContext, MessageRequest};
pub use trigger::{TopicTrigger, TriggerContext, TriggerKind, TriggerRequest, TriggerResponse};
pub use websocket::{
    WebsocketContext, WebsocketEvent, WebsocketEventType, WebsocketRequest, WebsocketResponse,
};

/// Values stashed by middleware for downstream middleware.
pub type Extras = HashMap<String, serde_json::Value>;

/// Outcome of an event-like handler (messages, intervals, blob events, jobs).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EventResponse {
    /// Whether the event was processed successfully
    pub success: bool,
}

impl Default for EventResponse {
    fn default() -> Self {
        Self { success: true }
    }
}

/// A server message, classified.
#[derive(Debug)]
pub enum Frame<C> {
    /// The server accepted the registration
    Registered,
    /// An event to run through the middleware chain
    Event(C),
    /// A message with no payload this worker understands
    Unrecognized,
}

/// A context that can be driven by a streaming worker.
///
/// Implementations translate server messages into fresh contexts and turn
/// finished contexts back into client messages stamped with the originating
/// correlation id.
///
/// The context is moved into the middleware chain, so the worker keeps a
/// [`fallback`](WorkerContext::fallback) to answer with when the chain fails.
pub trait WorkerContext: Clone + Send + 'static {
    /// Message type sent to the server
    type ClientMessage: Send + 'static;
    /// Message type received from the server
    type ServerMessage: Send + 'static;

    /// Classify a server message, building a context for event frames.
    fn decode(message: Self::ServerMessage) -> Frame<Self>;

    /// Correlation id of the event this context answers.
    fn id(&self) -> &str;

    /// A copy holding only what the failure response needs: the id and
    /// whatever selects the response shape. Payloads and extras are left out.
    fn fallback(&self) -> Self;

    /// Replace the response with the domain's failure response.
    fn with_error(self, error: &anyhow::Error) -> Self;

    /// Build the response frame for the server.
    fn into_client_message(self) -> Self::ClientMessage;
}
