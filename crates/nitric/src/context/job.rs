//! Batch job context.

use serde::de::DeserializeOwned;

use super::value::struct_to_json;
use super::{EventResponse, Extras, Frame, WorkerContext};
use crate::proto::batch::{
    self as wire, ClientMessage, ServerMessage, client_message, job_data, server_message,
};

/// A job submission.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct JobRequest {
    job_name: String,
    data: serde_json::Value,
}

impl JobRequest {
    /// Create a request for the named job.
    pub fn new(job_name: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            job_name: job_name.into(),
            data,
        }
    }

    /// Name of the job.
    pub fn job_name(&self) -> &str {
        &self.job_name
    }

    /// Job payload.
    pub fn data(&self) -> &serde_json::Value {
        &self.data
    }

    /// Deserialize the payload into a typed value.
    pub fn decode<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        T::deserialize(&self.data)
    }
}

impl From<wire::JobRequest> for JobRequest {
    fn from(req: wire::JobRequest) -> Self {
        let data = match req.data.and_then(|d| d.data) {
            Some(job_data::Data::Struct(payload)) => struct_to_json(payload),
            None => serde_json::Value::Null,
        };
        Self {
            job_name: req.job_name,
            data,
        }
    }
}

/// Context for a batch job handler.
#[derive(Clone, Debug)]
pub struct JobContext {
    id: String,
    /// The submission
    pub request: JobRequest,
    /// Whether the job succeeded
    pub response: EventResponse,
    /// Values shared between middleware
    pub extras: Extras,
}

impl JobContext {
    /// Create a context with the default (successful) response.
    pub fn new(id: impl Into<String>, request: JobRequest) -> Self {
        Self {
            id: id.into(),
            request,
            response: EventResponse::default(),
            extras: Extras::new(),
        }
    }
}

impl WorkerContext for JobContext {
    type ClientMessage = ClientMessage;
    type ServerMessage = ServerMessage;

    fn decode(message: ServerMessage) -> Frame<Self> {
        match message.content {
            Some(server_message::Content::RegistrationResponse(_)) => Frame::Registered,
            Some(server_message::Content::JobRequest(req)) => {
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
            JobRequest::new(self.request.job_name(), serde_json::Value::Null),
        )
    }

    fn with_error(mut self, _error: &anyhow::Error) -> Self {
        self.response = EventResponse { success: false };
        self
    }

    fn into_client_message(self) -> ClientMessage {
        ClientMessage {
            id: self.id,
            content: Some(client_message::Content::JobResponse(wire::JobResponse {
                success: self.response.success,
            })),
        }
    }
}
