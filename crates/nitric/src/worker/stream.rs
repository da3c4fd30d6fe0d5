//! Bidirectional event streams.
//!
//! The worker loop only needs three operations on a stream: send a frame,
//! receive a frame, and half-close the sending side. [`EventStream`] captures
//! those, [`Transport`] opens a stream with its registration frame queued, and
//! [`GrpcStream`] implements both on top of tonic.

use std::future::Future;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::{Status, Streaming};

/// Outbound frames buffered before the RPC applies backpressure.
const OUTBOUND_BUFFER: usize = 32;

/// One side of a bidirectional stream, as seen by the client.
#[async_trait]
pub trait EventStream<C: Send + 'static, S: Send + 'static>: Send {
    /// Send a frame to the server.
    async fn send(&mut self, message: C) -> Result<(), Status>;

    /// Receive the next frame. `Ok(None)` means the server closed the stream.
    async fn recv(&mut self) -> Result<Option<S>, Status>;

    /// Half-close the sending side.
    fn close_send(&mut self);
}

/// A boxed [`EventStream`].
pub type BoxEventStream<C, S> = Box<dyn EventStream<C, S>>;

/// Opens event streams for a worker.
#[async_trait]
pub trait Transport<C: Send + 'static, S: Send + 'static>: Send {
    /// Open a stream whose first outbound frame is `registration`.
    async fn open(&mut self, registration: C) -> Result<BoxEventStream<C, S>, Status>;
}

/// An [`EventStream`] over a tonic streaming call.
///
/// Outbound frames go through a channel that feeds the request stream;
/// dropping the sender ends the request stream, which half-closes the call.
#[derive(Debug)]
pub struct GrpcStream<C, S> {
    outbound: Option<mpsc::Sender<C>>,
    inbound: Streaming<S>,
}

#[async_trait]
impl<C: Send + 'static, S: Send + 'static> EventStream<C, S> for GrpcStream<C, S> {
    async fn send(&mut self, message: C) -> Result<(), Status> {
        let Some(outbound) = &self.outbound else {
            return Err(Status::failed_precondition("send after close"));
        };
        outbound
            .send(message)
            .await
            .map_err(|_| Status::unavailable("outbound stream closed"))
    }

    async fn recv(&mut self) -> Result<Option<S>, Status> {
        self.inbound.message().await
    }

    fn close_send(&mut self) {
        self.outbound = None;
    }
}

/// Start a bidirectional call with `registration` as its first frame.
///
/// The registration is queued before the call is made, so servers that wait
/// for it before sending response headers do not deadlock the client.
pub async fn open_bidi<C, S, F, Fut>(
    registration: C,
    call: F,
) -> Result<BoxEventStream<C, S>, Status>
where
    C: Send + 'static,
    S: Send + 'static,
    F: FnOnce(ReceiverStream<C>) -> Fut,
    Fut: Future<Output = Result<tonic::Response<Streaming<S>>, Status>>,
{
    let (tx, rx) = mpsc::channel(OUTBOUND_BUFFER);
    tx.send(registration)
        .await
        .map_err(|_| Status::internal("outbound channel closed"))?;

    let response = call(ReceiverStream::new(rx)).await?;
    Ok(Box::new(GrpcStream {
        outbound: Some(tx),
        inbound: response.into_inner(),
    }))
}
