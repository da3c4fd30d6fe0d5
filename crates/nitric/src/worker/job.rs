//! Batch job workers.

use async_trait::async_trait;
use tonic::Status;
use tonic::transport::Channel;

use super::StreamWorker;
use super::stream::{BoxEventStream, Transport, open_bidi};
use crate::context::JobContext;
use crate::middleware::Middleware;
use crate::proto::batch::{
    self as wire, ClientMessage, RegistrationRequest, ServerMessage, client_message,
    job_client::JobClient,
};

/// Resources a job needs to run.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct JobResourceRequirements {
    /// Number of vCPUs
    pub cpus: f32,
    /// Memory in MiB
    pub memory: i64,
    /// Number of GPUs
    pub gpus: i64,
}

impl Default for JobResourceRequirements {
    fn default() -> Self {
        Self {
            cpus: 1.0,
            memory: 512,
            gpus: 0,
        }
    }
}

/// A batch job definition.
#[derive(Clone, Debug, PartialEq)]
pub struct JobRegistration {
    /// Name of the job
    pub job_name: String,
    /// Resources requested for each run
    pub requirements: JobResourceRequirements,
}

impl JobRegistration {
    /// Register a job with the default requirements.
    pub fn new(job_name: impl Into<String>) -> Self {
        Self {
            job_name: job_name.into(),
            requirements: JobResourceRequirements::default(),
        }
    }

    /// Override the resource requirements.
    pub fn with_requirements(mut self, requirements: JobResourceRequirements) -> Self {
        self.requirements = requirements;
        self
    }
}

impl From<JobRegistration> for ClientMessage {
    fn from(job: JobRegistration) -> Self {
        let JobResourceRequirements { cpus, memory, gpus } = job.requirements;
        ClientMessage {
            id: String::new(),
            content: Some(client_message::Content::RegistrationRequest(
                RegistrationRequest {
                    job_name: job.job_name,
                    requirements: Some(wire::JobResourceRequirements { cpus, memory, gpus }),
                },
            )),
        }
    }
}

#[async_trait]
impl Transport<ClientMessage, ServerMessage> for JobClient<Channel> {
    async fn open(
        &mut self,
        registration: ClientMessage,
    ) -> Result<BoxEventStream<ClientMessage, ServerMessage>, Status> {
        open_bidi(registration, |outbound| self.handle_job(outbound)).await
    }
}

impl StreamWorker<JobContext> {
    /// A worker running submissions of a batch job.
    pub fn job(channel: Channel, job: JobRegistration, middleware: Middleware<JobContext>) -> Self {
        Self::new(
            format!("job {}", job.job_name),
            JobClient::new(channel),
            job.into(),
            middleware,
        )
    }
}
