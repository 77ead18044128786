use std::time::Duration;

use snafu::prelude::*;

use super::{resolver::ResolveError, transport::TransportError};

/// Error which ends one connection generation, or the whole engine
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)), module(error), context(suffix(false)))]
pub enum GatewayError {
    /// fetch gateway url failed
    #[snafu(display("resolve gateway failed: {source}"))]
    ResolveFailure {
        /// source error
        source: ResolveError,
    },

    /// transport can't be established, or broken
    #[snafu(display("transport failed: {source}"))]
    TransportFailure {
        /// source error
        source: TransportError,
    },

    /// no hello received in time after transport established
    #[snafu(display("no hello received in {timeout:?}"))]
    HelloTimeout {
        /// configured timeout
        timeout: Duration,
    },

    /// no pong received in time after ping sent
    #[snafu(display("no pong received in {timeout:?}"))]
    PongTimeout {
        /// configured timeout
        timeout: Duration,
    },

    /// server asked us to reconnect
    /// see: <https://developer.kaiheila.cn/doc/websocket#%E4%BF%A1%E4%BB%A4[5]%20RECONNECT>
    #[snafu(display("server requested reconnect, code {code}, message: {}", err.as_deref().unwrap_or("<none>")))]
    ServerReconnect {
        /// reconnect reason code
        code: i64,
        /// reconnect reason message
        err: Option<String>,
    },

    /// hello signal code is not zero
    /// see <https://developer.kaiheila.cn/doc/websocket#%E4%BF%A1%E4%BB%A4[1]%20HELLO> for code meaning
    #[snafu(display("handshake rejected, hello code {code}"))]
    HandshakeRejected {
        /// status code
        code: i64,
    },

    /// server refused to resume last session
    #[snafu(display("resume rejected: {reason}"))]
    ResumeRejected {
        /// why it is rejected
        reason: String,
    },

    /// too many failed attempts
    #[snafu(display("give up after {attempts} attempts, last error: {source}"))]
    RetriesExhausted {
        /// failed attempts count
        attempts: u32,
        /// last error before give up
        #[snafu(source(from(GatewayError, Box::new)))]
        source: Box<GatewayError>,
    },
}

impl GatewayError {
    /// This error makes the engine stop in failed state
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::HandshakeRejected { .. } | Self::RetriesExhausted { .. }
        )
    }
}
