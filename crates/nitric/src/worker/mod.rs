//! Streaming workers.
//!
//! Every event source (API routes, subscriptions, schedules, bucket
//! notifications, websockets, jobs and generic triggers) is served by the same
//! loop, [`StreamWorker`]:
//!
//! ```text
//! Worker                                     Server
//! │                                           │
//! │  RegistrationRequest                      │
//! │ ─────────────────────────────────────────>│
//! │                                           │
//! │       RegistrationResponse                │
//! │<───────────────────────────────────────── │
//! │                                           │
//! │       Event{id: "1"}                      │
//! │<───────────────────────────────────────── │
//! │                                           │
//! │  Response{id: "1"}                        │
//! │ ─────────────────────────────────────────>│
//! │                                           │
//! │       <end of stream>                     │
//! │<───────────────────────────────────────── │
//! │                                           │
//! │  <close send>                             │
//! │ ─────────────────────────────────────────>│
//! ```
//!
//! The domains differ only in their context type (see [`WorkerContext`]), the
//! registration frame and the RPC that opens the stream (see [`Transport`]).

mod api;
mod bucket;
mod job;
mod schedule;
mod stream;
mod subscription;
mod trigger;
mod websocket;

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use tokio::sync::watch;

use crate::config::Config;
use crate::context::{Frame, WorkerContext};
use crate::error::Error;
use crate::middleware::{Middleware, invoke};

pub use api::ApiRoute;
pub use bucket::BucketNotification;
pub use job::{JobRegistration, JobResourceRequirements};
pub use schedule::{Cadence, Schedule};
pub use stream::{BoxEventStream, EventStream, GrpcStream, Transport, open_bidi};
pub use subscription::Subscription;
pub use trigger::TriggerHandlers;
pub use websocket::WebsocketRegistration;

/// A unit of work started by the [`Manager`](crate::Manager).
#[async_trait]
pub trait Worker: Send + fmt::Debug {
    /// Human readable description, used in logs and errors.
    fn name(&self) -> &str;

    /// Apply runtime configuration before the worker starts.
    fn configure(&mut self, _config: &Config) {}

    /// Run the worker until its stream ends, it fails, or shutdown is
    /// signalled. Consumes the worker, so it can only be started once.
    async fn start(self: Box<Self>, shutdown: Shutdown) -> Result<(), Error>;
}

/// Signal telling workers to stop.
#[derive(Clone, Debug)]
pub struct Shutdown {
    rx: Option<watch::Receiver<bool>>,
}

impl Shutdown {
    /// A signal that never fires.
    pub fn never() -> Self {
        Self { rx: None }
    }

    /// Create a connected handle and signal.
    pub fn channel() -> (ShutdownHandle, Shutdown) {
        let (tx, rx) = watch::channel(false);
        (ShutdownHandle { tx }, Shutdown { rx: Some(rx) })
    }

    /// Wait until shutdown is requested.
    ///
    /// Never resolves if the handle is dropped without requesting shutdown.
    pub async fn cancelled(&mut self) {
        if let Some(rx) = &mut self.rx {
            let stopped = rx.wait_for(|stop| *stop).await.is_ok();
            if stopped {
                return;
            }
        }
        std::future::pending::<()>().await;
    }
}

/// Requests shutdown of every worker holding a matching [`Shutdown`].
#[derive(Clone, Debug)]
pub struct ShutdownHandle {
    tx: watch::Sender<bool>,
}

impl ShutdownHandle {
    /// Ask all workers to stop.
    pub fn shutdown(&self) {
        self.tx.send_replace(true);
    }

    /// Returns true once [`ShutdownHandle::shutdown`] has been called.
    pub fn is_shutdown(&self) -> bool {
        *self.tx.borrow()
    }

    /// A new signal connected to this handle.
    pub fn subscribe(&self) -> Shutdown {
        Shutdown {
            rx: Some(self.tx.subscribe()),
        }
    }
}

/// The generic streaming worker loop.
///
/// Holds everything one registration needs: the transport that opens the
/// stream, the registration frame, and the composed middleware every event is
/// run through.
pub struct StreamWorker<X: WorkerContext> {
    name: String,
    transport: Box<dyn Transport<X::ClientMessage, X::ServerMessage>>,
    registration: X::ClientMessage,
    middleware: Middleware<X>,
    handler_timeout: Option<Duration>,
}

impl<X: WorkerContext> fmt::Debug for StreamWorker<X> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamWorker")
            .field("name", &self.name)
            .field("handler_timeout", &self.handler_timeout)
            .finish_non_exhaustive()
    }
}

impl<X: WorkerContext> StreamWorker<X> {
    /// Create a worker from its parts.
    pub fn new(
        name: impl Into<String>,
        transport: impl Transport<X::ClientMessage, X::ServerMessage> + 'static,
        registration: X::ClientMessage,
        middleware: Middleware<X>,
    ) -> Self {
        Self {
            name: name.into(),
            transport: Box::new(transport),
            registration,
            middleware,
            handler_timeout: None,
        }
    }

    /// Bound every middleware invocation. A timed out invocation is answered
    /// like a failed one.
    pub fn with_handler_timeout(mut self, timeout: Duration) -> Self {
        self.handler_timeout = Some(timeout);
        self
    }

    /// Description of the worker.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register with the server and serve events until the stream ends.
    ///
    /// Returns `Ok(())` when the server closes the stream, unless an event
    /// arrived that no handler could process, in which case that is reported
    /// once the stream has ended. Stream errors end the loop immediately.
    pub async fn run(self, mut shutdown: Shutdown) -> Result<(), Error> {
        let Self {
            name,
            mut transport,
            registration,
            middleware,
            handler_timeout,
        } = self;

        tracing::info!("Starting worker {}", name);
        let opened = tokio::select! {
            opened = transport.open(registration) => Some(opened),
            () = shutdown.cancelled() => None,
        };
        let Some(opened) = opened else {
            tracing::info!("Worker {} cancelled before registering", name);
            return Err(Error::Cancelled);
        };
        let mut stream = opened.inspect_err(|e| {
            tracing::error!("Worker {} failed to open stream: {}", name, e);
        })?;

        let mut unroutable = None;
        loop {
            let received = tokio::select! {
                received = stream.recv() => Some(received),
                () = shutdown.cancelled() => None,
            };
            let Some(received) = received else {
                tracing::info!("Worker {} shutting down", name);
                stream.close_send();
                return Err(Error::Cancelled);
            };

            let message = match received {
                Ok(Some(message)) => message,
                Ok(None) => {
                    tracing::info!("Worker {} stream closed by server", name);
                    stream.close_send();
                    return unroutable.map_or(Ok(()), Err);
                }
                Err(status) => {
                    tracing::error!("Worker {} receive failed: {}", name, status);
                    return Err(Error::Stream(status));
                }
            };

            let ctx = match X::decode(message) {
                Frame::Registered => {
                    tracing::debug!("Worker {} registered", name);
                    continue;
                }
                Frame::Unrecognized => {
                    tracing::warn!("Worker {} ignoring message without payload", name);
                    continue;
                }
                Frame::Event(ctx) => ctx,
            };

            tracing::debug!("Worker {} handling event {}", name, ctx.id());
            let (ctx, failure) = dispatch(&middleware, handler_timeout, ctx).await;
            if let Some(err) = failure {
                tracing::warn!("Worker {} handler failed: {:#}", name, err);
                if matches!(err.downcast_ref::<Error>(), Some(Error::NoHandler)) {
                    unroutable.get_or_insert(Error::NoHandler);
                }
            }

            if let Err(status) = stream.send(ctx.into_client_message()).await {
                tracing::error!("Worker {} send failed: {}", name, status);
                return Err(Error::Stream(status));
            }
        }
    }
}

/// Run one event through the middleware, turning failures into the domain's
/// failure response. Returns the finished context and the failure, if any.
async fn dispatch<X: WorkerContext>(
    middleware: &Middleware<X>,
    timeout: Option<Duration>,
    ctx: X,
) -> (X, Option<anyhow::Error>) {
    let fallback = ctx.fallback();
    let invocation = invoke(middleware, ctx);
    let result = match timeout {
        Some(limit) => tokio::time::timeout(limit, invocation)
            .await
            .unwrap_or_else(|_| Err(Error::HandlerTimeout(limit).into())),
        None => invocation.await,
    };

    match result {
        Ok(ctx) => (ctx, None),
        Err(err) => (fallback.with_error(&err), Some(err)),
    }
}

#[async_trait]
impl<X: WorkerContext> Worker for StreamWorker<X> {
    fn name(&self) -> &str {
        &self.name
    }

    fn configure(&mut self, config: &Config) {
        if self.handler_timeout.is_none() {
            self.handler_timeout = config.handler_timeout();
        }
    }

    async fn start(self: Box<Self>, shutdown: Shutdown) -> Result<(), Error> {
        self.run(shutdown).await
    }
}

/// Run a worker, reporting a panic as an error instead of unwinding.
pub(crate) async fn start_isolated(
    worker: Box<dyn Worker>,
    shutdown: Shutdown,
) -> Result<(), Error> {
    let name = worker.name().to_string();
    match AssertUnwindSafe(worker.start(shutdown)).catch_unwind().await {
        Ok(result) => result,
        Err(_) => {
            tracing::error!("Worker {} panicked", name);
            Err(Error::WorkerPanicked(name))
        }
    }
}
