//! Shared helpers for the worker tests.
//!
//! [`MockTransport`] stands in for a gRPC client: it records every frame the
//! worker sends (starting with the registration) and plays back inbound frames
//! fed through a channel. Dropping the feed ends the stream.
//!
//! Test crates pull this in with `#[macro_use] mod common;`.

#![allow(dead_code)]
#![allow(clippy::unwrap_used)]

use std::sync::{Arc, Mutex, Once};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tonic::Status;

use nitric::worker::{BoxEventStream, EventStream, Transport};

static INIT_TRACING: Once = Once::new();

pub fn init_tracing() {
    INIT_TRACING.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("nitric=debug")
            .with_test_writer()
            .init();
    });
}

/// Log messages in tests (visible with --nocapture)
macro_rules! test_log {
    ($($arg:tt)*) => {
        eprintln!("[TEST] {}", format!($($arg)*));
    };
}

/// What the worker did to the stream.
#[derive(Debug)]
pub struct Recorded<C> {
    /// Every frame sent, registration first
    pub sent: Vec<C>,
    /// Number of `close_send` calls
    pub closes: usize,
    /// Number of times the transport was opened
    pub opens: usize,
}

impl<C> Default for Recorded<C> {
    fn default() -> Self {
        Self {
            sent: Vec::new(),
            closes: 0,
            opens: 0,
        }
    }
}

pub type Shared<C> = Arc<Mutex<Recorded<C>>>;

/// Inbound frames, or an error to fail `recv` with.
pub type Feed<S> = mpsc::UnboundedSender<Result<S, Status>>;

pub struct MockTransport<C, S> {
    inbound: Option<mpsc::UnboundedReceiver<Result<S, Status>>>,
    recorded: Shared<C>,
    open_error: Option<Status>,
    send_error: Option<Status>,
}

impl<C: Send + 'static, S: Send + 'static> MockTransport<C, S> {
    /// A transport whose stream yields frames pushed into the returned feed.
    pub fn new() -> (Self, Feed<S>, Shared<C>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let recorded = Shared::default();
        let transport = Self {
            inbound: Some(rx),
            recorded: Arc::clone(&recorded),
            open_error: None,
            send_error: None,
        };
        (transport, tx, recorded)
    }

    /// A transport whose stream yields `frames` and then ends.
    pub fn scripted(frames: Vec<Result<S, Status>>) -> (Self, Shared<C>) {
        let (transport, feed, recorded) = Self::new();
        for frame in frames {
            feed.send(frame).unwrap();
        }
        (transport, recorded)
    }

    /// Fail to open the stream.
    pub fn failing_open(mut self, status: Status) -> Self {
        self.open_error = Some(status);
        self
    }

    /// Fail every send after the registration.
    pub fn failing_send(mut self, status: Status) -> Self {
        self.send_error = Some(status);
        self
    }
}

#[async_trait]
impl<C: Send + 'static, S: Send + 'static> Transport<C, S> for MockTransport<C, S> {
    async fn open(&mut self, registration: C) -> Result<BoxEventStream<C, S>, Status> {
        self.recorded.lock().unwrap().opens += 1;
        if let Some(status) = self.open_error.take() {
            return Err(status);
        }
        self.recorded.lock().unwrap().sent.push(registration);
        let inbound = self
            .inbound
            .take()
            .ok_or_else(|| Status::failed_precondition("stream already opened"))?;
        Ok(Box::new(MockStream {
            inbound,
            recorded: Arc::clone(&self.recorded),
            send_error: self.send_error.take(),
            closed: false,
        }))
    }
}

struct MockStream<C, S> {
    inbound: mpsc::UnboundedReceiver<Result<S, Status>>,
    recorded: Shared<C>,
    send_error: Option<Status>,
    closed: bool,
}

#[async_trait]
impl<C: Send + 'static, S: Send + 'static> EventStream<C, S> for MockStream<C, S> {
    async fn send(&mut self, message: C) -> Result<(), Status> {
        if self.closed {
            return Err(Status::failed_precondition("send after close"));
        }
        if let Some(status) = &self.send_error {
            return Err(Status::new(status.code(), status.message()));
        }
        self.recorded.lock().unwrap().sent.push(message);
        Ok(())
    }

    async fn recv(&mut self) -> Result<Option<S>, Status> {
        match self.inbound.recv().await {
            Some(Ok(frame)) => Ok(Some(frame)),
            Some(Err(status)) => Err(status),
            None => Ok(None),
        }
    }

    fn close_send(&mut self) {
        self.closed = true;
        self.recorded.lock().unwrap().closes += 1;
    }
}
