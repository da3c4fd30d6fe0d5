//! Bucket notification workers.

use async_trait::async_trait;
use tonic::Status;
use tonic::transport::Channel;

use super::StreamWorker;
use super::stream::{BoxEventStream, Transport, open_bidi};
use crate::context::{BlobEventContext, BlobEventType, FileEventContext};
use crate::middleware::Middleware;
use crate::proto::storage::{
    self as wire, ClientMessage, RegistrationRequest, ServerMessage, client_message,
    storage_listener_client::StorageListenerClient,
};

/// Notifications for a bucket, filtered by event type and key prefix.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BucketNotification {
    /// Name of the bucket
    pub bucket: String,
    /// Event type to listen for
    pub event_type: BlobEventType,
    /// Only keys starting with this prefix are delivered; empty matches all
    pub key_prefix_filter: String,
}

impl BucketNotification {
    /// Listen for `event_type` on every key in the bucket.
    pub fn new(bucket: impl Into<String>, event_type: BlobEventType) -> Self {
        Self {
            bucket: bucket.into(),
            event_type,
            key_prefix_filter: String::new(),
        }
    }

    /// Restrict notifications to keys with the given prefix.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix_filter = prefix.into();
        self
    }

    fn describe(&self) -> String {
        format!(
            "bucket {} {:?} {:?}",
            self.bucket, self.event_type, self.key_prefix_filter
        )
    }
}

impl From<BucketNotification> for ClientMessage {
    fn from(notification: BucketNotification) -> Self {
        ClientMessage {
            id: String::new(),
            content: Some(client_message::Content::RegistrationRequest(
                RegistrationRequest {
                    bucket_name: notification.bucket,
                    blob_event_type: wire::BlobEventType::from(notification.event_type) as i32,
                    key_prefix_filter: notification.key_prefix_filter,
                },
            )),
        }
    }
}

#[async_trait]
impl Transport<ClientMessage, ServerMessage> for StorageListenerClient<Channel> {
    async fn open(
        &mut self,
        registration: ClientMessage,
    ) -> Result<BoxEventStream<ClientMessage, ServerMessage>, Status> {
        open_bidi(registration, |outbound| self.listen(outbound)).await
    }
}

impl StreamWorker<BlobEventContext> {
    /// A worker handling blob notifications.
    pub fn bucket(
        channel: Channel,
        notification: BucketNotification,
        middleware: Middleware<BlobEventContext>,
    ) -> Self {
        Self::new(
            notification.describe(),
            StorageListenerClient::new(channel),
            notification.into(),
            middleware,
        )
    }
}

impl StreamWorker<FileEventContext> {
    /// A worker handling blob notifications as file references.
    pub fn file(
        channel: Channel,
        notification: BucketNotification,
        middleware: Middleware<FileEventContext>,
    ) -> Self {
        Self::new(
            format!("file {}", notification.describe()),
            StorageListenerClient::new(channel),
            notification.into(),
            middleware,
        )
    }
}
