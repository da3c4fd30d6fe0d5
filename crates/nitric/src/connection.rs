//! Dialling the Nitric server.

use tonic::transport::{Channel, Endpoint};

use crate::config::Config;
use crate::error::Error;

/// Open a new channel to the configured server.
///
/// Every worker gets its own channel. Failing to connect is returned to the
/// caller, who decides whether to retry or abort.
///
/// In build mode the channel is not dialled until first use, so workers can
/// be registered without a server. A missing server then shows up as an
/// `Unavailable` status when the worker opens its stream.
pub async fn connect(config: &Config) -> Result<Channel, Error> {
    let address = config.endpoint_uri();
    let endpoint = Endpoint::from_shared(address.clone())
        .map_err(|source| Error::InvalidAddress {
            address: config.service_address.clone(),
            source,
        })?
        .connect_timeout(config.connect_timeout());

    if config.is_build() {
        tracing::debug!("Connecting lazily to {}", address);
        return Ok(endpoint.connect_lazy());
    }

    tracing::debug!("Connecting to {}", address);
    endpoint
        .connect()
        .await
        .map_err(|source| Error::Connect { address, source })
}
