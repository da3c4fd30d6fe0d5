//! Bucket notification contexts.
//!
//! The server delivers the same blob events to both: [`BlobEventContext`]
//! exposes the raw key, [`FileEventContext`] a reference to the file inside
//! its bucket.

use super::{EventResponse, Extras, Frame, WorkerContext};
use crate::proto::storage::{
    self as wire, ClientMessage, ServerMessage, blob_event_request, client_message,
    server_message,
};

/// Kind of bucket notification.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum BlobEventType {
    /// A blob was written
    #[default]
    Created,
    /// A blob was removed
    Deleted,
}

impl From<wire::BlobEventType> for BlobEventType {
    fn from(value: wire::BlobEventType) -> Self {
        match value {
            wire::BlobEventType::Created => BlobEventType::Created,
            wire::BlobEventType::Deleted => BlobEventType::Deleted,
        }
    }
}

impl From<BlobEventType> for wire::BlobEventType {
    fn from(value: BlobEventType) -> Self {
        match value {
            BlobEventType::Created => wire::BlobEventType::Created,
            BlobEventType::Deleted => wire::BlobEventType::Deleted,
        }
    }
}

/// A blob notification.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BlobEventRequest {
    bucket_name: String,
    key: String,
    event_type: BlobEventType,
}

impl BlobEventRequest {
    /// Create a notification for a key in a bucket.
    pub fn new(
        bucket_name: impl Into<String>,
        key: impl Into<String>,
        event_type: BlobEventType,
    ) -> Self {
        Self {
            bucket_name: bucket_name.into(),
            key: key.into(),
            event_type,
        }
    }

    /// Bucket the blob lives in.
    pub fn bucket_name(&self) -> &str {
        &self.bucket_name
    }

    /// Key of the blob.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// What happened to the blob.
    pub fn event_type(&self) -> BlobEventType {
        self.event_type
    }
}

// Returns None for requests without an event payload.
fn blob_event(req: wire::BlobEventRequest) -> Option<BlobEventRequest> {
    let blob_event_request::Event::BlobEvent(event) = req.event?;
    let event_type = wire::BlobEventType::try_from(event.r#type)
        .map(BlobEventType::from)
        .unwrap_or_default();
    Some(BlobEventRequest::new(req.bucket_name, event.key, event_type))
}

fn decode_with<C>(
    message: ServerMessage,
    build: impl FnOnce(String, BlobEventRequest) -> C,
) -> Frame<C> {
    match message.content {
        Some(server_message::Content::RegistrationResponse(_)) => Frame::Registered,
        Some(server_message::Content::BlobEventRequest(req)) => match blob_event(req) {
            Some(event) => Frame::Event(build(message.id, event)),
            None => Frame::Unrecognized,
        },
        None => Frame::Unrecognized,
    }
}

fn response_message(id: String, response: EventResponse) -> ClientMessage {
    ClientMessage {
        id,
        content: Some(client_message::Content::BlobEventResponse(
            wire::BlobEventResponse {
                success: response.success,
            },
        )),
    }
}

/// Context for a blob notification handler.
#[derive(Clone, Debug)]
pub struct BlobEventContext {
    id: String,
    /// The notification
    pub request: BlobEventRequest,
    /// Whether the notification was handled
    pub response: EventResponse,
    /// Values shared between middleware
    pub extras: Extras,
}

impl BlobEventContext {
    /// Create a context with the default (successful) response.
    pub fn new(id: impl Into<String>, request: BlobEventRequest) -> Self {
        Self {
            id: id.into(),
            request,
            response: EventResponse::default(),
            extras: Extras::new(),
        }
    }
}

impl WorkerContext for BlobEventContext {
    type ClientMessage = ClientMessage;
    type ServerMessage = ServerMessage;

    fn decode(message: ServerMessage) -> Frame<Self> {
        decode_with(message, Self::new)
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
        response_message(self.id, self.response)
    }
}

/// A file inside a bucket.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct FileRef {
    /// Bucket name
    pub bucket: String,
    /// Key of the file within the bucket
    pub key: String,
}

/// A file notification.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FileEventRequest {
    file: FileRef,
    event_type: BlobEventType,
}

impl FileEventRequest {
    /// The file the notification is about.
    pub fn file(&self) -> &FileRef {
        &self.file
    }

    /// What happened to the file.
    pub fn event_type(&self) -> BlobEventType {
        self.event_type
    }
}

impl From<BlobEventRequest> for FileEventRequest {
    fn from(req: BlobEventRequest) -> Self {
        Self {
            file: FileRef {
                bucket: req.bucket_name,
                key: req.key,
            },
            event_type: req.event_type,
        }
    }
}

/// Context for a file notification handler.
#[derive(Clone, Debug)]
pub struct FileEventContext {
    id: String,
    /// The notification
    pub request: FileEventRequest,
    /// Whether the notification was handled
    pub response: EventResponse,
    /// Values shared between middleware
    pub extras: Extras,
}

impl FileEventContext {
    /// Create a context with the default (successful) response.
    pub fn new(id: impl Into<String>, request: FileEventRequest) -> Self {
        Self {
            id: id.into(),
            request,
            response: EventResponse::default(),
            extras: Extras::new(),
        }
    }
}

impl WorkerContext for FileEventContext {
    type ClientMessage = ClientMessage;
    type ServerMessage = ServerMessage;

    fn decode(message: ServerMessage) -> Frame<Self> {
        decode_with(message, |id, event| Self::new(id, event.into()))
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
        response_message(self.id, self.response)
    }
}
