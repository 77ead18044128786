//! In-memory gateway used by engine tests.

use std::{
    pin::Pin,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
    task::{Context, Poll},
};

use futures_util::{Sink, Stream};
use serde_json::json;
use tokio::sync::mpsc;
use url::Url;

use super::{Connector, GatewayResolver, ResolveError, TransportError};
use crate::{
    subscriber::{DeliverError, Subscriber},
    ws::{message::Frame, Event},
};

#[derive(Debug, Clone, Default)]
pub(crate) struct MockResolver {
    calls: Arc<AtomicUsize>,
    failing: Arc<AtomicBool>,
}

impl MockResolver {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl GatewayResolver for MockResolver {
    async fn resolve(&self) -> Result<Url, ResolveError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self.failing.load(Ordering::SeqCst) {
            return Err(ResolveError::Unavailable {
                message: "control plane down".to_string(),
            });
        }

        Ok(Url::parse("ws://gateway.test/gateway?compress=0&token=test").unwrap())
    }
}

#[derive(Debug)]
pub(crate) struct MockTransport {
    inbound: mpsc::UnboundedReceiver<Result<Frame, TransportError>>,
    outbound: mpsc::UnboundedSender<Frame>,
}

impl Stream for MockTransport {
    type Item = Result<Frame, TransportError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inbound.poll_recv(cx)
    }
}

impl Sink<Frame> for MockTransport {
    type Error = TransportError;

    fn poll_ready(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn start_send(self: Pin<&mut Self>, item: Frame) -> Result<(), Self::Error> {
        self.outbound
            .send(item)
            .map_err(|_| TransportError::Closed)
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn poll_close(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }
}

/// Server side of one accepted mock connection.
#[derive(Debug)]
pub(crate) struct MockServer {
    to_client: mpsc::UnboundedSender<Result<Frame, TransportError>>,
    from_client: mpsc::UnboundedReceiver<Frame>,
}

impl MockServer {
    pub fn send_frame(&self, frame: Frame) {
        let _ = self.to_client.send(Ok(frame));
    }

    pub fn send(&self, value: serde_json::Value) {
        self.send_frame(Frame::Text(value.to_string()));
    }

    pub fn hello(&self, session_id: &str) {
        self.send(json!({ "s": 1, "d": { "code": 0, "session_id": session_id } }));
    }

    pub fn hello_rejected(&self, code: i64) {
        self.send(json!({ "s": 1, "d": { "code": code } }));
    }

    pub fn event(&self, sn: u64, d: serde_json::Value) {
        self.send(json!({ "s": 0, "d": d, "sn": sn }));
    }

    pub fn pong(&self) {
        self.send(json!({ "s": 3 }));
    }

    pub fn reconnect(&self, code: i64) {
        self.send(json!({ "s": 5, "d": { "code": code, "err": "reconnect please" } }));
    }

    pub fn resume_ack(&self, session_id: &str) {
        self.send(json!({ "s": 6, "d": { "session_id": session_id } }));
    }

    /// Next frame sent by the client, `None` once the client dropped the transport.
    pub async fn recv(&mut self) -> Option<serde_json::Value> {
        self.from_client.recv().await.map(|frame| match frame {
            Frame::Text(text) => serde_json::from_str(&text).unwrap(),
            Frame::Binary(_) => panic!("client sent a binary frame"),
        })
    }

    pub fn try_recv(&mut self) -> Option<serde_json::Value> {
        match self.from_client.try_recv() {
            Ok(Frame::Text(text)) => Some(serde_json::from_str(&text).unwrap()),
            Ok(Frame::Binary(_)) => panic!("client sent a binary frame"),
            Err(_) => None,
        }
    }
}

#[derive(Debug)]
pub(crate) struct MockConnector {
    servers: mpsc::UnboundedSender<MockServer>,
}

impl MockConnector {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<MockServer>) {
        let (servers, accepted) = mpsc::unbounded_channel();
        (Self { servers }, accepted)
    }
}

#[async_trait::async_trait]
impl Connector for MockConnector {
    type Transport = MockTransport;

    async fn connect(&self, _url: &Url) -> Result<Self::Transport, TransportError> {
        let (to_client, inbound) = mpsc::unbounded_channel();
        let (outbound, from_client) = mpsc::unbounded_channel();

        self.servers
            .send(MockServer {
                to_client,
                from_client,
            })
            .map_err(|_| TransportError::Closed)?;

        Ok(MockTransport { inbound, outbound })
    }
}

/// Subscriber records every event, and fails on events with `"fail": true`.
pub(crate) fn recorder() -> (impl Subscriber, mpsc::UnboundedReceiver<Event>) {
    let (tx, rx) = mpsc::unbounded_channel();

    let subscriber = move |event: Event| {
        let tx = tx.clone();
        async move {
            let fail = event["fail"].as_bool().unwrap_or(false);
            let _ = tx.send(event);
            if fail {
                Err::<(), DeliverError>("subscriber refused the event".into())
            } else {
                Ok(())
            }
        }
    };

    (subscriber, rx)
}
