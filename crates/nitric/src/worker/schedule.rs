//! Schedule workers.

use async_trait::async_trait;
use tonic::Status;
use tonic::transport::Channel;

use super::StreamWorker;
use super::stream::{BoxEventStream, Transport, open_bidi};
use crate::context::IntervalContext;
use crate::middleware::Middleware;
use crate::proto::schedules::{
    ClientMessage, RegistrationRequest, ScheduleCron, ScheduleEvery, ServerMessage,
    client_message, registration_request, schedules_client::SchedulesClient,
};

/// How often a schedule fires.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Cadence {
    /// A rate, e.g. `5 minutes`
    Every(String),
    /// A cron expression, e.g. `0 1 * * *`
    Cron(String),
}

/// A named schedule.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Schedule {
    /// Name of the schedule
    pub name: String,
    /// When it fires
    pub cadence: Cadence,
}

impl Schedule {
    /// A schedule firing at a fixed rate.
    pub fn every(name: impl Into<String>, rate: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cadence: Cadence::Every(rate.into()),
        }
    }

    /// A schedule driven by a cron expression.
    pub fn cron(name: impl Into<String>, expression: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cadence: Cadence::Cron(expression.into()),
        }
    }
}

impl From<Schedule> for ClientMessage {
    fn from(schedule: Schedule) -> Self {
        let cadence = match schedule.cadence {
            Cadence::Every(rate) => registration_request::Cadence::Every(ScheduleEvery { rate }),
            Cadence::Cron(expression) => {
                registration_request::Cadence::Cron(ScheduleCron { expression })
            }
        };
        ClientMessage {
            id: String::new(),
            content: Some(client_message::Content::RegistrationRequest(
                RegistrationRequest {
                    schedule_name: schedule.name,
                    cadence: Some(cadence),
                },
            )),
        }
    }
}

#[async_trait]
impl Transport<ClientMessage, ServerMessage> for SchedulesClient<Channel> {
    async fn open(
        &mut self,
        registration: ClientMessage,
    ) -> Result<BoxEventStream<ClientMessage, ServerMessage>, Status> {
        open_bidi(registration, |outbound| self.schedule(outbound)).await
    }
}

impl StreamWorker<IntervalContext> {
    /// A worker handling ticks of a schedule.
    pub fn schedule(
        channel: Channel,
        schedule: Schedule,
        middleware: Middleware<IntervalContext>,
    ) -> Self {
        Self::new(
            format!("schedule {}", schedule.name),
            SchedulesClient::new(channel),
            schedule.into(),
            middleware,
        )
    }
}
