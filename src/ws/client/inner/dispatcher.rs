use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::{
    subscriber::{self, Subscriber},
    ws::Event,
};

/// Hands queued events to the subscriber, one at a time in queue order.
///
/// Lives as long as the engine, across generations, so a slow subscriber never
/// holds up reading the transport.
pub(crate) struct Dispatcher {
    pub subscriber: Arc<dyn Subscriber>,
    pub events: mpsc::UnboundedReceiver<Event>,
    pub stop: CancellationToken,
}

impl Dispatcher {
    pub async fn run(mut self) {
        log::debug!("Event dispatcher for {} start", self.subscriber.name());

        loop {
            let event = tokio::select! {
                biased;

                _ = self.stop.cancelled() => break,

                event = self.events.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
            };

            tokio::select! {
                biased;

                _ = self.stop.cancelled() => {
                    log::debug!("Engine stopped while delivering an event");
                    break;
                }

                _ = subscriber::deliver(self.subscriber.as_ref(), event) => {}
            }
        }

        log::debug!("Event dispatcher stopped");
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::{subscriber::DeliverError, ws::client::testing::recorder};

    #[tokio::test]
    async fn test_deliver_in_order_until_queue_closed() {
        let (subscriber, mut delivered) = recorder();
        let (events, queue) = mpsc::unbounded_channel();

        for n in 0..5 {
            events.send(json!({ "n": n })).unwrap();
        }
        drop(events);

        Dispatcher {
            subscriber: Arc::new(subscriber),
            events: queue,
            stop: CancellationToken::new(),
        }
        .run()
        .await;

        for n in 0..5 {
            assert_eq!(delivered.recv().await.unwrap()["n"], n);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_interrupts_slow_subscriber() {
        let subscriber = |_event: Event| async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok::<(), DeliverError>(())
        };
        let (events, queue) = mpsc::unbounded_channel();
        let stop = CancellationToken::new();

        let task = tokio::spawn(
            Dispatcher {
                subscriber: Arc::new(subscriber),
                events: queue,
                stop: stop.clone(),
            }
            .run(),
        );

        events.send(json!({})).unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        stop.cancel();

        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
    }
}
