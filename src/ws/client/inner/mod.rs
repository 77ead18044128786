mod dispatcher;
mod generation;
mod heartbeat;
mod machine;
mod receiver;
mod session;

pub(crate) use machine::Machine;
pub(crate) use session::SnCell;

use std::sync::Arc;

use futures_util::{stream::SplitSink, SinkExt};
use tokio::sync::Mutex;

use super::transport::{Transport, TransportError};
use crate::ws::message::{Frame, Signal};

/// Something happened in a generation's task, reported to the driver.
#[derive(Debug)]
pub(crate) struct Input {
    pub generation: u64,
    pub kind: InputKind,
}

#[derive(Debug)]
pub(crate) enum InputKind {
    /// non-event signal received
    Signal(Signal),
    /// transport can't be read or written any more
    TransportLost(TransportError),
    /// no hello in time
    HelloTimeout,
    /// no pong in time
    PongTimeout,
}

/// Write half of a generation's transport.
///
/// Shared by the heartbeat and the driver, writes are serialized by the lock.
#[derive(Debug)]
pub(crate) struct Outbound<T: Transport> {
    sink: Arc<Mutex<SplitSink<T, Frame>>>,
}

impl<T: Transport> Clone for Outbound<T> {
    fn clone(&self) -> Self {
        Self {
            sink: Arc::clone(&self.sink),
        }
    }
}

impl<T: Transport> Outbound<T> {
    pub fn new(sink: SplitSink<T, Frame>) -> Self {
        Self {
            sink: Arc::new(Mutex::new(sink)),
        }
    }

    pub async fn send(&self, frame: Frame) -> Result<(), TransportError> {
        self.sink.lock().await.send(frame).await
    }

    pub async fn close(&self) -> Result<(), TransportError> {
        self.sink.lock().await.close().await
    }
}
