//! Kaiheila HTTP API, only the part the gateway engine needs: resolving a
//! gateway url.

mod client;
mod error;
pub mod types;

pub use client::Client;
pub use error::Error;
pub use types::{parse_gateway_url, ParseGatewayURLError};

/// Result type for api module
pub type Result<T> = std::result::Result<T, Error>;
