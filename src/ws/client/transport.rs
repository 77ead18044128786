//! Frame level transport used by the gateway engine.

use std::{fmt::Debug, pin::Pin, task::Poll};

use futures_util::{Sink, SinkExt, Stream, StreamExt};
use snafu::prelude::*;
use tokio_tungstenite as websocket;
use url::Url;

use crate::ws::message::Frame;

/// Error of the underlying transport
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)), module(error), context(suffix(false)))]
pub enum TransportError {
    /// connect to websocket gateway failed
    #[snafu(display("connect ws gateway {url} failed: {source}"))]
    ConnectGateway {
        /// connected url
        url: String,
        /// source error
        source: websocket::tungstenite::Error,
    },

    /// underlying websocket stream broken
    #[snafu(display("underlying websocket stream broken: {source}"))]
    Websocket {
        /// source error
        source: websocket::tungstenite::Error,
    },

    /// peer closed the connection
    #[snafu(display("connection closed by peer"))]
    Closed,
}

/// A bidirectional frame transport for one connection generation.
pub trait Transport:
    Stream<Item = Result<Frame, TransportError>>
    + Sink<Frame, Error = TransportError>
    + Debug
    + Send
    + Unpin
    + 'static
{
}

impl<T> Transport for T where
    T: Stream<Item = Result<Frame, TransportError>>
        + Sink<Frame, Error = TransportError>
        + Debug
        + Send
        + Unpin
        + 'static
{
}

/// Open a fresh transport to a resolved gateway url.
#[async_trait::async_trait]
pub trait Connector: Send + Sync + 'static {
    /// transport type this connector produces
    type Transport: Transport;

    /// connect to the gateway
    async fn connect(&self, url: &Url) -> Result<Self::Transport, TransportError>;
}

pub(crate) type WebsocketClient =
    websocket::WebSocketStream<websocket::MaybeTlsStream<tokio::net::TcpStream>>;

/// Connector for real Kaiheila websocket gateway
#[derive(Debug, Default, Clone, Copy)]
pub struct WebsocketConnector;

#[async_trait::async_trait]
impl Connector for WebsocketConnector {
    type Transport = WebsocketTransport;

    async fn connect(&self, url: &Url) -> Result<Self::Transport, TransportError> {
        log::debug!("Connecting gateway: {}", url);

        let (ws, _) = websocket::connect_async(url)
            .await
            .with_context(|_| error::ConnectGateway { url: url.as_str() })?;

        Ok(WebsocketTransport { ws })
    }
}

/// Websocket connection seen as a frame stream/sink.
///
/// Control frames are answered by the websocket layer itself and never yielded,
/// a close frame ends the stream.
#[derive(Debug)]
pub struct WebsocketTransport {
    ws: WebsocketClient,
}

impl Stream for WebsocketTransport {
    type Item = Result<Frame, TransportError>;

    fn poll_next(
        mut self: Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> Poll<Option<Self::Item>> {
        loop {
            let message = match self.ws.poll_next_unpin(cx) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Ready(Some(Err(websocket::tungstenite::Error::ConnectionClosed))) => {
                    return Poll::Ready(None)
                }
                Poll::Ready(Some(Err(err))) => {
                    return Poll::Ready(Some(Err(TransportError::Websocket { source: err })))
                }
                Poll::Ready(Some(Ok(message))) => message,
            };

            match message {
                websocket::tungstenite::Message::Text(text) => {
                    return Poll::Ready(Some(Ok(Frame::Text(text))))
                }
                websocket::tungstenite::Message::Binary(data) => {
                    return Poll::Ready(Some(Ok(Frame::Binary(data.into()))))
                }
                websocket::tungstenite::Message::Close(close) => {
                    log::debug!("Received close frame: {:?}", close);
                    return Poll::Ready(None);
                }
                other => {
                    log::trace!("Skip websocket control frame: {:?}", other);
                }
            }
        }
    }
}

impl Sink<Frame> for WebsocketTransport {
    type Error = TransportError;

    fn poll_ready(
        mut self: Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> Poll<Result<(), Self::Error>> {
        self.ws
            .poll_ready_unpin(cx)
            .map_err(|e| Self::Error::Websocket { source: e })
    }

    fn start_send(mut self: Pin<&mut Self>, item: Frame) -> Result<(), Self::Error> {
        let message = match item {
            Frame::Text(text) => websocket::tungstenite::Message::Text(text),
            Frame::Binary(data) => websocket::tungstenite::Message::Binary(data.to_vec()),
        };

        self.ws
            .start_send_unpin(message)
            .map_err(|e| Self::Error::Websocket { source: e })
    }

    fn poll_flush(
        mut self: Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> Poll<Result<(), Self::Error>> {
        self.ws
            .poll_flush_unpin(cx)
            .map_err(|e| Self::Error::Websocket { source: e })
    }

    fn poll_close(
        mut self: Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> Poll<Result<(), Self::Error>> {
        self.ws
            .poll_close_unpin(cx)
            .map_err(|e| Self::Error::Websocket { source: e })
    }
}
