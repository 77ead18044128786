use reqwest::{Method, StatusCode};
use snafu::prelude::*;

/// Error of calling Kaiheila HTTP API
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)), module(variant), context(suffix(false)))]
pub enum Error {
    /// token can't be put into an authorization header
    #[snafu(display("token contains character not allowed in http header"))]
    TokenInvalid,

    /// reqwest client can't be built
    #[snafu(display("build http client failed: {source}"))]
    ClientCreateFailed {
        /// source error
        source: reqwest::Error,
    },

    /// request can't be built, usually a bad base url
    #[snafu(display("build api request failed: {source}"))]
    BuildRequestFailed {
        /// source error
        source: reqwest::Error,
    },

    /// request sent but no complete response
    #[snafu(display("{} {url} failed: {source}", method.as_str()))]
    RequestFailed {
        /// http method
        method: Method,
        /// request url
        url: String,
        /// source error
        source: reqwest::Error,
    },

    /// http status is not 200
    #[snafu(display("{} {url} got http status {status_code}", method.as_str()))]
    HTTPStatusNotOK {
        /// http method
        method: Method,
        /// request url
        url: String,
        /// received status
        status_code: StatusCode,
    },

    /// body is not the expected json
    #[snafu(display("parse api response body {body:?} failed: {source}"))]
    ParseBodyFailed {
        /// raw body
        body: bytes::Bytes,
        /// source error
        source: serde_json::Error,
    },

    /// api answered with a non-zero code
    #[snafu(display("api returned code {code}: {message}"))]
    CodeNotZero {
        /// api code
        code: i64,
        /// api message
        message: String,
    },
}

impl Error {
    /// The api refused our credential, the gateway engine still retries it.
    pub fn is_unauthorized(&self) -> bool {
        matches!(
            self,
            Self::HTTPStatusNotOK {
                status_code: StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN,
                ..
            } | Self::CodeNotZero { code: 401, .. }
        )
    }
}
