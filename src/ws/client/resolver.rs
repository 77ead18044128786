use snafu::prelude::*;
use url::Url;

use crate::api::{self, types::ParseGatewayURLError};

/// Error when resolve a fresh gateway url
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)), module(error), context(suffix(false)))]
pub enum ResolveError {
    /// Call kaiheila api failed
    #[snafu(display("call kaiheila api failed: {source}"))]
    CallAPIFailed {
        /// source error
        source: api::Error,
    },

    /// Received invalid websocket gateway url address
    #[snafu(display("invalid gateway url {url}: {source}"))]
    InvalidGatewayURL {
        /// received url
        url: String,
        /// source error
        source: ParseGatewayURLError,
    },

    /// Gateway can't be resolved for now
    #[snafu(display("gateway unavailable: {message}"))]
    Unavailable {
        /// reason
        message: String,
    },
}

/// Source of short-lived gateway urls.
///
/// Called again before every connection attempt, any error is retried by the engine.
#[async_trait::async_trait]
pub trait GatewayResolver: Send + Sync + 'static {
    /// Fetch a fresh gateway url
    async fn resolve(&self) -> Result<Url, ResolveError>;
}

#[async_trait::async_trait]
impl GatewayResolver for api::Client {
    async fn resolve(&self) -> Result<Url, ResolveError> {
        log::info!("Getting gateway url ...");

        let gateway = match self.gateway_url().await {
            Ok(gateway) => gateway,
            Err(err) => {
                if err.is_unauthorized() {
                    log::error!("Kaiheila api refused the token: {}", err);
                }
                return Err(err).context(error::CallAPIFailed);
            }
        };

        log::debug!("Got gateway url: {}", gateway);

        api::types::parse_gateway_url(&gateway)
            .with_context(|_| error::InvalidGatewayURL { url: &gateway })
    }
}
