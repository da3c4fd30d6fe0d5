//! Runtime configuration, read from the environment.

use std::time::Duration;

use clap::Parser;

use crate::error::Error;

/// Value of `NITRIC_ENVIRONMENT` while the resource graph is being collected.
pub const BUILD_ENVIRONMENT: &str = "build";

/// Connection and worker settings.
///
/// Every field has an environment variable fallback, so a `Config` can be
/// read with [`Config::from_env`] or flattened into a binary's own arguments
/// with `#[command(flatten)]`.
#[derive(Parser, Clone, Debug, PartialEq, Eq)]
#[command(name = "nitric")]
pub struct Config {
    /// Address of the Nitric server
    #[arg(long, env = "SERVICE_ADDRESS", default_value = "127.0.0.1:50051")]
    pub service_address: String,

    /// Timeout for establishing a connection, in milliseconds
    #[arg(long = "connect-timeout-ms", env = "NITRIC_CONNECT_TIMEOUT_MS", default_value_t = 10_000)]
    pub connect_timeout_ms: u64,

    /// Upper bound on a single middleware invocation, in milliseconds
    #[arg(long = "handler-timeout-ms", env = "NITRIC_HANDLER_TIMEOUT_MS")]
    pub handler_timeout_ms: Option<u64>,

    /// Deployment environment; `build` enables discovery mode
    #[arg(long, env = "NITRIC_ENVIRONMENT")]
    pub environment: Option<String>,
}

impl Config {
    /// Read the configuration from environment variables only.
    pub fn from_env() -> Result<Self, Error> {
        Self::try_parse_from(["nitric"]).map_err(|e| Error::Config(e.to_string()))
    }

    /// Timeout for dialling the server.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Per-invocation middleware timeout, if any.
    pub fn handler_timeout(&self) -> Option<Duration> {
        self.handler_timeout_ms.map(Duration::from_millis)
    }

    /// Returns true when running in build/discovery mode.
    pub fn is_build(&self) -> bool {
        self.environment.as_deref() == Some(BUILD_ENVIRONMENT)
    }

    /// The server address as a URI tonic can dial.
    pub fn endpoint_uri(&self) -> String {
        if self.service_address.contains("://") {
            self.service_address.clone()
        } else {
            format!("http://{}", self.service_address)
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service_address: "127.0.0.1:50051".to_string(),
            connect_timeout_ms: 10_000,
            handler_timeout_ms: None,
            environment: None,
        }
    }
}
