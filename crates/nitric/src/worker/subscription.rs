//! Topic subscription workers.

use async_trait::async_trait;
use tonic::Status;
use tonic::transport::Channel;

use super::StreamWorker;
use super::stream::{BoxEventStream, Transport, open_bidi};
use crate::context::MessageContext;
use crate::middleware::Middleware;
use crate::proto::topics::{
    ClientMessage, RegistrationRequest, ServerMessage, client_message,
    subscriber_client::SubscriberClient,
};

/// A subscription to a topic.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Subscription {
    /// Name of the topic
    pub topic: String,
}

impl Subscription {
    /// Subscribe to the named topic.
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
        }
    }
}

impl From<Subscription> for ClientMessage {
    fn from(subscription: Subscription) -> Self {
        ClientMessage {
            id: String::new(),
            content: Some(client_message::Content::RegistrationRequest(
                RegistrationRequest {
                    topic_name: subscription.topic,
                },
            )),
        }
    }
}

#[async_trait]
impl Transport<ClientMessage, ServerMessage> for SubscriberClient<Channel> {
    async fn open(
        &mut self,
        registration: ClientMessage,
    ) -> Result<BoxEventStream<ClientMessage, ServerMessage>, Status> {
        open_bidi(registration, |outbound| self.subscribe(outbound)).await
    }
}

impl StreamWorker<MessageContext> {
    /// A worker handling messages published to a topic.
    pub fn subscription(
        channel: Channel,
        subscription: Subscription,
        middleware: Middleware<MessageContext>,
    ) -> Self {
        Self::new(
            format!("subscription {}", subscription.topic),
            SubscriberClient::new(channel),
            subscription.into(),
            middleware,
        )
    }
}
