//! HTTP route context.

use std::collections::HashMap;

use serde::Serialize;
use serde::de::DeserializeOwned;

use super::{Extras, Frame, WorkerContext};
use crate::proto::apis::{
    self as wire, ClientMessage, HeaderValue, ServerMessage, client_message, server_message,
};

/// Body sent when a handler fails.
pub const INTERNAL_ERROR_BODY: &str = "Internal Server Error";

/// An inbound HTTP request.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct HttpRequest {
    method: String,
    path: String,
    headers: HashMap<String, Vec<String>>,
    query: HashMap<String, Vec<String>>,
    path_params: HashMap<String, String>,
    body: Vec<u8>,
}

impl HttpRequest {
    /// Create a request with the given method and path.
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            ..Self::default()
        }
    }

    /// Add a header value.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .entry(name.into())
            .or_default()
            .push(value.into());
        self
    }

    /// Add a query parameter value.
    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.entry(name.into()).or_default().push(value.into());
        self
    }

    /// Set a path parameter.
    pub fn with_path_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.path_params.insert(name.into(), value.into());
        self
    }

    /// Set the body.
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// HTTP method, e.g. `GET`.
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Request path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// All headers.
    pub fn headers(&self) -> &HashMap<String, Vec<String>> {
        &self.headers
    }

    /// First value of a header, matched case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .and_then(|(_, v)| v.first())
            .map(String::as_str)
    }

    /// All query parameters.
    pub fn query(&self) -> &HashMap<String, Vec<String>> {
        &self.query
    }

    /// First value of a query parameter.
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query.get(name).and_then(|v| v.first()).map(String::as_str)
    }

    /// Parameters extracted from the route path.
    pub fn path_params(&self) -> &HashMap<String, String> {
        &self.path_params
    }

    /// A single path parameter.
    pub fn path_param(&self, name: &str) -> Option<&str> {
        self.path_params.get(name).map(String::as_str)
    }

    /// Raw body.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Deserialize the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_slice(&self.body)
    }
}

impl From<wire::HttpRequest> for HttpRequest {
    fn from(req: wire::HttpRequest) -> Self {
        Self {
            method: req.method,
            path: req.path,
            headers: unwrap_values(req.headers, |v| v.value),
            query: unwrap_values(req.query_params, |v| v.value),
            path_params: req.path_params,
            body: req.body,
        }
    }
}

/// The response a handler writes.
#[derive(Clone, Debug, PartialEq)]
pub struct HttpResponse {
    /// Status code
    pub status: i32,
    /// Response headers
    pub headers: HashMap<String, Vec<String>>,
    /// Response body
    pub body: Vec<u8>,
}

impl Default for HttpResponse {
    fn default() -> Self {
        Self {
            status: 200,
            headers: HashMap::new(),
            body: Vec::new(),
        }
    }
}

impl HttpResponse {
    /// Replace any existing values of a header.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.insert(name.into(), vec![value.into()]);
    }

    /// Set a plain-text body.
    pub fn text(&mut self, body: impl Into<String>) {
        self.set_header("Content-Type", "text/plain");
        self.body = body.into().into_bytes();
    }

    /// Serialize a JSON body.
    pub fn json<T: Serialize>(&mut self, body: &T) -> serde_json::Result<()> {
        self.body = serde_json::to_vec(body)?;
        self.set_header("Content-Type", "application/json");
        Ok(())
    }

    pub(crate) fn internal_error() -> Self {
        let mut response = Self {
            status: 500,
            ..Self::default()
        };
        response.text(INTERNAL_ERROR_BODY);
        response
    }
}

/// Context for an API route handler.
#[derive(Clone, Debug)]
pub struct HttpContext {
    id: String,
    /// The inbound request
    pub request: HttpRequest,
    /// The response to send back
    pub response: HttpResponse,
    /// Values shared between middleware
    pub extras: Extras,
}

impl HttpContext {
    /// Create a context with the default response.
    pub fn new(id: impl Into<String>, request: HttpRequest) -> Self {
        Self {
            id: id.into(),
            request,
            response: HttpResponse::default(),
            extras: Extras::new(),
        }
    }
}

impl WorkerContext for HttpContext {
    type ClientMessage = ClientMessage;
    type ServerMessage = ServerMessage;

    fn decode(message: ServerMessage) -> Frame<Self> {
        match message.content {
            Some(server_message::Content::RegistrationResponse(_)) => Frame::Registered,
            Some(server_message::Content::HttpRequest(req)) => {
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
            HttpRequest::new(self.request.method(), self.request.path()),
        )
    }

    fn with_error(mut self, _error: &anyhow::Error) -> Self {
        self.response = HttpResponse::internal_error();
        self
    }

    fn into_client_message(self) -> ClientMessage {
        ClientMessage {
            id: self.id,
            content: Some(client_message::Content::HttpResponse(wire::HttpResponse {
                status: self.response.status,
                headers: wrap_values(self.response.headers, |value| HeaderValue { value }),
                body: self.response.body,
            })),
        }
    }
}

pub(crate) fn unwrap_values<T>(
    map: HashMap<String, T>,
    values: impl Fn(T) -> Vec<String>,
) -> HashMap<String, Vec<String>> {
    map.into_iter().map(|(k, v)| (k, values(v))).collect()
}

pub(crate) fn wrap_values<T>(
    map: HashMap<String, Vec<String>>,
    wrap: impl Fn(Vec<String>) -> T,
) -> HashMap<String, T> {
    map.into_iter().map(|(k, v)| (k, wrap(v))).collect()
}
