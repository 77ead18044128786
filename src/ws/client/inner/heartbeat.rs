use std::{sync::Arc, time::Duration};

use rand::Rng;
use tokio::{sync::mpsc, time::Instant};

use super::{Input, InputKind, Outbound, SnCell};
use crate::ws::{
    client::{transport::Transport, Config},
    message::{self, Frame},
};

/// Lower bound of the time between two pings, whatever the config says.
pub(crate) const MIN_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(1);

/// `base` moved by a random offset in `[-jitter, +jitter]`.
pub(crate) fn jittered_interval<R: Rng + ?Sized>(
    base: Duration,
    jitter: Duration,
    rng: &mut R,
) -> Duration {
    if jitter.is_zero() {
        return base;
    }

    let max_offset = u64::try_from(jitter.as_millis()).unwrap_or(u64::MAX);
    let offset = Duration::from_millis(rng.gen_range(0..=max_offset));

    if rng.gen_bool(0.5) {
        base.saturating_add(offset)
    } else {
        base.saturating_sub(offset)
    }
}

/// Driver side of a generation's heartbeat.
#[derive(Debug)]
pub(crate) struct HeartbeatHandle {
    pong_tx: mpsc::UnboundedSender<()>,
}

impl HeartbeatHandle {
    /// The only way to disarm a pending pong deadline.
    pub fn on_pong(&self) {
        if self.pong_tx.send(()).is_err() {
            log::trace!("Heartbeat already stopped, pong ignored");
        }
    }
}

/// Periodic ping sender of one generation.
#[derive(Debug)]
pub(crate) struct Heartbeat<T: Transport> {
    generation: u64,
    interval: Duration,
    jitter: Duration,
    pong_timeout: Duration,
    sn: Arc<SnCell>,
    outbound: Outbound<T>,
    pong_rx: mpsc::UnboundedReceiver<()>,
    inputs: mpsc::UnboundedSender<Input>,
    next_interval: Duration,
    pong_deadline: Option<Instant>,
}

impl<T: Transport> Heartbeat<T> {
    pub fn new(
        generation: u64,
        config: &Config,
        sn: Arc<SnCell>,
        outbound: Outbound<T>,
        inputs: mpsc::UnboundedSender<Input>,
    ) -> (Self, HeartbeatHandle) {
        let (pong_tx, pong_rx) = mpsc::unbounded_channel();

        (
            Self {
                generation,
                interval: config.heartbeat_interval.max(MIN_HEARTBEAT_INTERVAL),
                jitter: config.heartbeat_jitter,
                pong_timeout: config.pong_timeout,
                sn,
                outbound,
                pong_rx,
                inputs,
                next_interval: config.heartbeat_interval,
                pong_deadline: None,
            },
            HeartbeatHandle { pong_tx },
        )
    }

    fn report(&self, kind: InputKind) {
        let input = Input {
            generation: self.generation,
            kind,
        };
        if self.inputs.send(input).is_err() {
            log::debug!("Driver gone, heartbeat report dropped");
        }
    }

    pub async fn run(mut self) {
        log::debug!("Generation {} heartbeat start", self.generation);

        loop {
            self.next_interval =
                jittered_interval(self.interval, self.jitter, &mut rand::thread_rng())
                    .max(MIN_HEARTBEAT_INTERVAL);
            log::trace!("Next ping in {:?}", self.next_interval);

            tokio::time::sleep(self.next_interval).await;

            // pong arrived with no ping pending
            while self.pong_rx.try_recv().is_ok() {
                log::debug!("Drop unsolicited pong");
            }

            let sn = self.sn.get();
            log::trace!("Send ping with sn {}", sn);

            if let Err(err) = self.outbound.send(Frame::Text(message::encode_ping(sn))).await {
                log::warn!("Find transport broken when send ping: {}", err);
                self.report(InputKind::TransportLost(err));
                return;
            }

            let deadline = Instant::now() + self.pong_timeout;
            self.pong_deadline = Some(deadline);

            tokio::select! {
                pong = self.pong_rx.recv() => {
                    if pong.is_none() {
                        log::debug!("Pong notifier dropped, stop heartbeat");
                        return;
                    }
                    log::trace!("Pong received, disarm deadline {:?}", self.pong_deadline.take());
                }

                _ = tokio::time::sleep_until(deadline) => {
                    log::warn!("No pong in {:?} after ping", self.pong_timeout);
                    self.report(InputKind::PongTimeout);
                    return;
                }
            }
        }
    }
}
