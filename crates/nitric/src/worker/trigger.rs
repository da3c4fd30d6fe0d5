//! Generic trigger workers.
//!
//! A trigger worker registers once by name and receives every kind of trigger
//! the server routes to it. [`TriggerHandlers`] dispatches each trigger to the
//! most specific handler available.

use std::sync::Arc;

use async_trait::async_trait;
use tonic::Status;
use tonic::transport::Channel;

use super::StreamWorker;
use super::stream::{BoxEventStream, Transport, open_bidi};
use crate::context::{HttpContext, MessageContext, TriggerContext};
use crate::error::Error;
use crate::middleware::{Handler, Middleware, invoke, middleware};
use crate::proto::faas::{
    ClientMessage, InitRequest, ServerMessage, client_message, faas_client::FaasClient,
};

/// Handlers for a trigger worker.
///
/// HTTP triggers go to the `http` handler and topic triggers to the `event`
/// handler. Triggers without a matching typed handler fall back to `default`.
/// A trigger no handler accepts fails with [`Error::NoHandler`].
#[derive(Clone, Default)]
pub struct TriggerHandlers {
    http: Option<Middleware<HttpContext>>,
    event: Option<Middleware<MessageContext>>,
    default: Option<Middleware<TriggerContext>>,
}

impl std::fmt::Debug for TriggerHandlers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TriggerHandlers")
            .field("http", &self.http.is_some())
            .field("event", &self.event.is_some())
            .field("default", &self.default.is_some())
            .finish()
    }
}

impl TriggerHandlers {
    /// No handlers; every trigger is rejected.
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle HTTP triggers.
    pub fn http(mut self, middleware: Middleware<HttpContext>) -> Self {
        self.http = Some(middleware);
        self
    }

    /// Handle topic triggers.
    pub fn event(mut self, middleware: Middleware<MessageContext>) -> Self {
        self.event = Some(middleware);
        self
    }

    /// Handle anything the typed handlers do not.
    pub fn default_handler(mut self, middleware: Middleware<TriggerContext>) -> Self {
        self.default = Some(middleware);
        self
    }

    /// Build the routing middleware.
    pub fn into_middleware(self) -> Middleware<TriggerContext> {
        let handlers = Arc::new(self);
        middleware(move |ctx: TriggerContext, next: Handler<TriggerContext>| {
            let handlers = Arc::clone(&handlers);
            async move {
                let ctx = handlers.route(ctx).await?;
                next(ctx).await
            }
        })
    }

    async fn route(&self, ctx: TriggerContext) -> anyhow::Result<TriggerContext> {
        if let Some(http) = &self.http
            && let Some(view) = ctx.to_http()
        {
            let done = invoke(http, view).await?;
            return Ok(ctx.with_http(done));
        }
        if let Some(event) = &self.event
            && let Some(view) = ctx.to_message()
        {
            let done = invoke(event, view).await?;
            return Ok(ctx.with_message(done));
        }
        match &self.default {
            Some(default) => invoke(default, ctx).await,
            None => Err(Error::NoHandler.into()),
        }
    }
}

#[async_trait]
impl Transport<ClientMessage, ServerMessage> for FaasClient<Channel> {
    async fn open(
        &mut self,
        registration: ClientMessage,
    ) -> Result<BoxEventStream<ClientMessage, ServerMessage>, Status> {
        open_bidi(registration, |outbound| self.trigger_stream(outbound)).await
    }
}

/// The init frame announcing a trigger worker by name.
pub(crate) fn init_message(name: impl Into<String>) -> ClientMessage {
    ClientMessage {
        id: String::new(),
        content: Some(client_message::Content::InitRequest(InitRequest {
            name: name.into(),
        })),
    }
}

impl StreamWorker<TriggerContext> {
    /// A worker receiving every trigger routed to `name`.
    pub fn trigger(channel: Channel, name: impl Into<String>, handlers: TriggerHandlers) -> Self {
        let name = name.into();
        Self::new(
            format!("trigger {name}"),
            FaasClient::new(channel),
            init_message(name),
            handlers.into_middleware(),
        )
    }
}
