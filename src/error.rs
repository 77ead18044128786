//! framework error types

use std::sync::Arc;

use snafu::prelude::*;

use super::api::Error as APIError;
use super::ws::client::GatewayError;

/// framework error type
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)), context(suffix(false)))]
pub enum Error {
    /// Create kaiheila api client failed
    #[snafu(display("create kaiheila api client failed: {source}"))]
    CreateAPIClientFailed {
        /// source error
        source: APIError,
    },

    /// Gateway engine stopped with a fatal error
    #[snafu(display("gateway failed: {source}"))]
    GatewayFailed {
        /// source error
        source: Arc<GatewayError>,
    },
}
