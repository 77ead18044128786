use std::sync::Arc;

use futures_util::{stream::SplitStream, StreamExt};
use tokio::sync::mpsc;

use super::{Input, InputKind, SnCell};
use crate::ws::{
    client::transport::{Transport, TransportError},
    event::{Event, EventData},
    message::{self, Frame},
};

/// Frame receive loop of one generation.
///
/// Event sn is recorded right here in arrival order and the body queued for the
/// dispatcher, every other signal goes to the driver.
pub(crate) struct ReceiveLoop<T: Transport> {
    pub generation: u64,
    pub stream: SplitStream<T>,
    pub sn: Arc<SnCell>,
    pub events: mpsc::UnboundedSender<Event>,
    pub inputs: mpsc::UnboundedSender<Input>,
}

impl<T: Transport> ReceiveLoop<T> {
    fn report(&self, kind: InputKind) -> bool {
        self.inputs
            .send(Input {
                generation: self.generation,
                kind,
            })
            .is_ok()
    }

    fn on_event(&self, data: EventData) {
        log::trace!("Received event sn = {}", data.sn);

        match self.sn.advance(data.sn) {
            Ok(()) => log::trace!("Update sn to {}", data.sn),
            Err(last) => log::warn!(
                "Received event sn {} lower than last sn {}, keep last sn",
                data.sn,
                last
            ),
        }

        if self.events.send(data.event).is_err() {
            log::debug!("Dispatcher gone, event {} dropped", data.sn);
        }
    }

    pub async fn run(mut self) {
        log::debug!("Generation {} receive loop start", self.generation);

        loop {
            let frame = match self.stream.next().await {
                Some(Ok(frame)) => frame,
                Some(Err(err)) => {
                    log::warn!("Find transport broken when receive frame: {}", err);
                    self.report(InputKind::TransportLost(err));
                    break;
                }
                None => {
                    log::warn!("Transport closed by peer");
                    self.report(InputKind::TransportLost(TransportError::Closed));
                    break;
                }
            };

            let signal = match message::decode(&frame) {
                Ok(signal) => signal,
                Err(err) => {
                    if err.is_unknown_signal() {
                        log::warn!("Skip frame with unknown signal: {}", err);
                    } else {
                        log::warn!("Skip malformed frame: {}", err);
                        if let Frame::Text(ref text) = frame {
                            log::trace!("Malformed frame data: {}", text);
                        }
                    }
                    continue;
                }
            };

            log::trace!("Received new {} signal", signal.type_name());

            match signal.into_event() {
                Ok(data) => self.on_event(data),
                Err(signal) => {
                    if !self.report(InputKind::Signal(signal)) {
                        log::debug!("Driver gone, stop receive loop");
                        break;
                    }
                }
            }
        }
    }
}
