//! API route workers.

use std::collections::HashMap;

use async_trait::async_trait;
use tonic::Status;
use tonic::transport::Channel;

use super::StreamWorker;
use super::stream::{BoxEventStream, Transport, open_bidi};
use crate::context::HttpContext;
use crate::middleware::Middleware;
use crate::proto::apis::{
    ApiWorkerOptions, ApiWorkerScopes, ClientMessage, RegistrationRequest, ServerMessage,
    api_client::ApiClient, client_message,
};

/// A route on an API, and the methods it handles.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ApiRoute {
    /// Name of the API
    pub api: String,
    /// Route path, e.g. `/customers/:id`
    pub path: String,
    /// HTTP methods served by the worker
    pub methods: Vec<String>,
    /// Security rules and the scopes they require
    pub security: HashMap<String, Vec<String>>,
    /// Opt this route out of the API's security rules
    pub security_disabled: bool,
}

impl ApiRoute {
    /// A route with no methods yet.
    pub fn new(api: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            api: api.into(),
            path: path.into(),
            ..Self::default()
        }
    }

    /// Serve an additional method.
    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.methods.push(method.into().to_uppercase());
        self
    }

    /// Require the given scopes from a security rule.
    pub fn security(mut self, rule: impl Into<String>, scopes: Vec<String>) -> Self {
        self.security.insert(rule.into(), scopes);
        self
    }

    /// Disable security for this route.
    pub fn disable_security(mut self) -> Self {
        self.security_disabled = true;
        self
    }

    fn describe(&self) -> String {
        format!("api {} {} {}", self.api, self.methods.join(","), self.path)
    }
}

impl From<ApiRoute> for ClientMessage {
    fn from(route: ApiRoute) -> Self {
        let security = route
            .security
            .into_iter()
            .map(|(rule, scopes)| (rule, ApiWorkerScopes { scopes }))
            .collect();
        ClientMessage {
            id: String::new(),
            content: Some(client_message::Content::RegistrationRequest(
                RegistrationRequest {
                    api: route.api,
                    path: route.path,
                    methods: route.methods,
                    options: Some(ApiWorkerOptions {
                        security,
                        security_disabled: route.security_disabled,
                    }),
                },
            )),
        }
    }
}

#[async_trait]
impl Transport<ClientMessage, ServerMessage> for ApiClient<Channel> {
    async fn open(
        &mut self,
        registration: ClientMessage,
    ) -> Result<BoxEventStream<ClientMessage, ServerMessage>, Status> {
        open_bidi(registration, |outbound| self.serve(outbound)).await
    }
}

impl StreamWorker<HttpContext> {
    /// A worker serving an API route.
    pub fn api(channel: Channel, route: ApiRoute, middleware: Middleware<HttpContext>) -> Self {
        Self::new(route.describe(), ApiClient::new(channel), route.into(), middleware)
    }
}
