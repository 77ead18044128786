use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use futures_util::StreamExt;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use super::{
    dispatcher::Dispatcher,
    generation::Generation,
    heartbeat::{Heartbeat, HeartbeatHandle},
    receiver::ReceiveLoop,
    session::Session,
    Input, InputKind, Outbound, SnCell,
};
use crate::{
    subscriber::Subscriber,
    ws::{
        client::{
            policy::{self, Recovery, RetryDecision, RetryState},
            resolver::GatewayResolver,
            transport::Connector,
            Config, ConnectionState, GatewayError, Status,
        },
        event::Event,
        message::{self, Frame, OnlyData, Reconnect, Signal},
    },
};

const CLOSE_TRANSPORT_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug)]
enum GenerationEnd {
    Stopped,
    Failed(GatewayError),
}

/// The connection state machine driver, runs as one background task.
pub(crate) struct Machine<R, C> {
    config: Config,
    resolver: Arc<R>,
    connector: Arc<C>,
    subscriber: Arc<dyn Subscriber>,
    status: Arc<watch::Sender<Status>>,
    generations: Arc<AtomicU64>,
    root: CancellationToken,
    session: Session,
    retry: RetryState,
    inputs_tx: mpsc::UnboundedSender<Input>,
    inputs_rx: mpsc::UnboundedReceiver<Input>,
    events_tx: mpsc::UnboundedSender<Event>,
    events_rx: Option<mpsc::UnboundedReceiver<Event>>,
}

impl<R, C> Machine<R, C>
where
    R: GatewayResolver,
    C: Connector,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: Config,
        resolver: Arc<R>,
        connector: Arc<C>,
        subscriber: Arc<dyn Subscriber>,
        status: Arc<watch::Sender<Status>>,
        generations: Arc<AtomicU64>,
        sn: Arc<SnCell>,
        root: CancellationToken,
    ) -> Self {
        let (inputs_tx, inputs_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        sn.reset();

        Self {
            retry: RetryState::new(config.max_retry_attempts),
            config,
            resolver,
            connector,
            subscriber,
            status,
            generations,
            root,
            session: Session::new(sn),
            inputs_tx,
            inputs_rx,
            events_tx,
            events_rx: Some(events_rx),
        }
    }

    #[cfg(test)]
    pub fn inputs(&self) -> mpsc::UnboundedSender<Input> {
        self.inputs_tx.clone()
    }

    fn set_state(&self, state: ConnectionState) {
        log::debug!("Move to {:?} state", state);
        self.status.send_modify(|status| status.state = state);
    }

    fn fail(&mut self, err: GatewayError) {
        log::error!("Gateway engine failed: {}", err);
        self.retry.disable();
        self.status.send_modify(|status| {
            status.state = ConnectionState::Failed;
            status.last_error = Some(Arc::new(err));
        });
    }

    pub async fn run(mut self) {
        let dispatcher = self.events_rx.take().map(|events| {
            tokio::spawn(
                Dispatcher {
                    subscriber: Arc::clone(&self.subscriber),
                    events,
                    stop: self.root.clone(),
                }
                .run(),
            )
        });

        self.run_generations().await;

        // dropping the queue sender lets the dispatcher finish what is queued
        drop(self);

        if let Some(dispatcher) = dispatcher {
            if let Err(err) = dispatcher.await {
                log::error!("Event dispatcher ended abnormally: {}", err);
            }
        }
    }

    async fn run_generations(&mut self) {
        loop {
            let err = match self.run_generation().await {
                GenerationEnd::Stopped => break,
                GenerationEnd::Failed(err) => err,
            };

            match policy::classify(&err) {
                Recovery::Fatal => {
                    self.fail(err);
                    return;
                }
                Recovery::Cold => {
                    log::info!("Drop session {:?}, next connect is a cold one", self.session.id);
                    self.session.clear();
                }
                Recovery::Resume => {}
            }

            let wait = match self.retry.record_failure() {
                RetryDecision::GiveUp => {
                    let attempts = self.retry.attempt();
                    self.fail(GatewayError::RetriesExhausted {
                        attempts,
                        source: Box::new(err),
                    });
                    return;
                }
                RetryDecision::Wait(wait) => wait,
            };

            log::warn!(
                "Generation ended: {}, retry #{} after {:?}",
                err,
                self.retry.attempt(),
                wait
            );

            let session_id = self.session.id.clone();
            self.status.send_modify(|status| {
                status.state = ConnectionState::Reconnecting;
                status.session_id = session_id;
                status.last_error = Some(Arc::new(err));
            });

            tokio::select! {
                biased;

                _ = self.root.cancelled() => break,

                _ = tokio::time::sleep(wait) => {}
            }
        }

        self.retry.disable();
        self.set_state(ConnectionState::Closed);

        log::info!("Gateway engine stopped");
    }

    async fn run_generation(&mut self) -> GenerationEnd {
        let generation = self.generations.fetch_add(1, Ordering::SeqCst) + 1;
        let resuming = self.session.resumable();
        if !resuming {
            // a cold session numbers its events from scratch
            self.session.sn.reset();
        }

        log::debug!(
            "Generation {} start, {}",
            generation,
            if resuming { "resume" } else { "cold connect" }
        );

        self.status.send_modify(|status| {
            status.state = ConnectionState::Connecting;
            status.generation = generation;
        });

        let url = tokio::select! {
            biased;

            _ = self.root.cancelled() => return GenerationEnd::Stopped,

            result = self.resolver.resolve() => match result {
                Ok(url) => url,
                Err(source) => return GenerationEnd::Failed(GatewayError::ResolveFailure { source }),
            },
        };

        let transport = tokio::select! {
            biased;

            _ = self.root.cancelled() => return GenerationEnd::Stopped,

            result = self.connector.connect(&url) => match result {
                Ok(transport) => transport,
                Err(source) => return GenerationEnd::Failed(GatewayError::TransportFailure { source }),
            },
        };

        log::info!("Gateway connected, generation {}", generation);

        let (sink, stream) = transport.split();
        let outbound = Outbound::new(sink);
        let mut scope = Generation::new(generation, &self.root);

        scope.spawn(
            "receive loop",
            ReceiveLoop {
                generation,
                stream,
                sn: Arc::clone(&self.session.sn),
                events: self.events_tx.clone(),
                inputs: self.inputs_tx.clone(),
            }
            .run(),
        );

        let hello_guard = scope.guard();
        let hello_timeout = self.config.hello_timeout;
        let inputs = self.inputs_tx.clone();
        scope.spawn_guarded(hello_guard.clone(), "hello watcher", async move {
            tokio::time::sleep(hello_timeout).await;
            let _ = inputs.send(Input {
                generation,
                kind: InputKind::HelloTimeout,
            });
        });

        self.set_state(ConnectionState::AwaitingHello);

        let end = if resuming {
            let sn = self.session.sn.get();
            log::debug!("Send resume with sn {}", sn);
            match outbound.send(Frame::Text(message::encode_resume(sn))).await {
                Ok(()) => None,
                Err(source) => Some(GenerationEnd::Failed(GatewayError::TransportFailure {
                    source,
                })),
            }
        } else {
            None
        };

        let end = match end {
            Some(end) => end,
            None => {
                self.drive(&mut scope, &outbound, &hello_guard, resuming)
                    .await
            }
        };

        scope.retire().await;

        match tokio::time::timeout(CLOSE_TRANSPORT_TIMEOUT, outbound.close()).await {
            Ok(Ok(())) => log::trace!("Generation {} transport closed", generation),
            Ok(Err(err)) => log::debug!("Close transport of generation {}: {}", generation, err),
            Err(_) => log::debug!("Close transport of generation {} timeout", generation),
        }

        end
    }

    fn activate(
        &mut self,
        scope: &mut Generation,
        outbound: &Outbound<C::Transport>,
        hello_guard: &CancellationToken,
    ) -> HeartbeatHandle {
        hello_guard.cancel();
        self.retry.reset();

        let (heartbeat, handle) = Heartbeat::new(
            scope.id(),
            &self.config,
            Arc::clone(&self.session.sn),
            outbound.clone(),
            self.inputs_tx.clone(),
        );
        scope.spawn("heartbeat", heartbeat.run());

        let session_id = self.session.id.clone();
        self.status.send_modify(|status| {
            status.state = ConnectionState::Active;
            status.session_id = session_id;
        });

        handle
    }

    async fn drive(
        &mut self,
        scope: &mut Generation,
        outbound: &Outbound<C::Transport>,
        hello_guard: &CancellationToken,
        resuming: bool,
    ) -> GenerationEnd {
        let generation = scope.id();
        let mut heartbeat: Option<HeartbeatHandle> = None;

        loop {
            let input = tokio::select! {
                biased;

                _ = self.root.cancelled() => return GenerationEnd::Stopped,

                input = self.inputs_rx.recv() => match input {
                    Some(input) => input,
                    None => return GenerationEnd::Stopped,
                },
            };

            if input.generation != generation {
                log::debug!(
                    "Drop {:?} from stale generation {}",
                    input.kind,
                    input.generation
                );
                continue;
            }

            let active = heartbeat.is_some();

            let signal = match input.kind {
                InputKind::Signal(signal) => signal,
                InputKind::TransportLost(source) => {
                    return GenerationEnd::Failed(GatewayError::TransportFailure { source })
                }
                InputKind::HelloTimeout if active => continue,
                InputKind::HelloTimeout => {
                    let timeout = self.config.hello_timeout;
                    log::warn!("Wait hello timeout");
                    return GenerationEnd::Failed(if resuming {
                        GatewayError::ResumeRejected {
                            reason: format!("no resume ack in {:?}", timeout),
                        }
                    } else {
                        GatewayError::HelloTimeout { timeout }
                    });
                }
                InputKind::PongTimeout => {
                    return GenerationEnd::Failed(GatewayError::PongTimeout {
                        timeout: self.config.pong_timeout,
                    })
                }
            };

            match signal {
                Signal::Hello(hello) if !active => {
                    log::debug!("Hello signal data: {:?}", hello.data);

                    let code = hello.data.code;
                    if code != 0 {
                        return GenerationEnd::Failed(if resuming {
                            GatewayError::ResumeRejected {
                                reason: format!("hello code {}", code),
                            }
                        } else {
                            GatewayError::HandshakeRejected { code }
                        });
                    }

                    if resuming {
                        log::debug!("Hello received while resuming, keep waiting resume ack");
                        continue;
                    }

                    self.session.id = hello.data.session_id;
                    heartbeat = Some(self.activate(scope, outbound, hello_guard));

                    log::info!("Gateway active, session id {:?}", self.session.id);
                }

                Signal::ResumeAck(ack) if !active && resuming => {
                    self.session.id = Some(ack.data.session_id);
                    heartbeat = Some(self.activate(scope, outbound, hello_guard));

                    log::info!(
                        "Session {:?} resumed at sn {}",
                        self.session.id,
                        self.session.sn.get()
                    );
                }

                Signal::Pong => match heartbeat {
                    Some(ref handle) => handle.on_pong(),
                    None => log::debug!("Ignore pong before active"),
                },

                Signal::Reconnect(OnlyData {
                    data: Reconnect { code, err },
                }) => {
                    log::warn!("Server requested reconnect, code {}, err {:?}", code, err);

                    return GenerationEnd::Failed(if resuming && !active {
                        GatewayError::ResumeRejected {
                            reason: format!("reconnect code {}", code),
                        }
                    } else {
                        GatewayError::ServerReconnect { code, err }
                    });
                }

                other => {
                    log::debug!("Ignore unexpected {} signal", other.type_name());
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use tokio::time::Instant;

    use super::*;
    use crate::ws::client::testing::{recorder, MockConnector, MockResolver};

    async fn wait_state(status: &watch::Sender<Status>, state: ConnectionState) -> Status {
        let mut rx = status.subscribe();
        let current = rx.wait_for(|status| status.state == state).await.unwrap().clone();
        current
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_pong_does_not_disarm_new_deadline() {
        let config = Config::default().with_heartbeat(Duration::from_secs(30), Duration::ZERO);
        let (connector, mut servers) = MockConnector::new();
        let (subscriber, _events) = recorder();
        let (status, _) = watch::channel(Status::default());
        let status = Arc::new(status);
        let root = CancellationToken::new();

        let machine = Machine::new(
            config,
            Arc::new(MockResolver::default()),
            Arc::new(connector),
            Arc::new(subscriber),
            Arc::clone(&status),
            Arc::new(AtomicU64::new(0)),
            Arc::new(SnCell::default()),
            root.clone(),
        );
        let inputs = machine.inputs();
        let task = tokio::spawn(machine.run());

        let mut first = servers.recv().await.unwrap();
        first.hello("abc");
        wait_state(&status, ConnectionState::Active).await;

        // first generation never answers its ping
        assert_eq!(first.recv().await.unwrap()["s"], 2);

        let mut second = servers.recv().await.unwrap();
        assert_eq!(
            status.borrow().last_error.as_deref().map(GatewayError::is_fatal),
            Some(false)
        );
        assert_eq!(second.recv().await.unwrap(), serde_json::json!({ "s": 4, "sn": 0 }));
        second.resume_ack("abc");
        let resumed = wait_state(&status, ConnectionState::Active).await;
        assert_eq!(resumed.generation, 2);

        assert_eq!(second.recv().await.unwrap()["s"], 2);
        let pinged = Instant::now();

        // late pong of the first generation
        inputs
            .send(Input {
                generation: 1,
                kind: InputKind::Signal(Signal::Pong),
            })
            .unwrap();

        let reconnecting = wait_state(&status, ConnectionState::Reconnecting).await;
        assert_eq!(reconnecting.generation, 2);
        assert!(matches!(
            reconnecting.last_error.as_deref(),
            Some(GatewayError::PongTimeout { .. })
        ));
        assert!(Instant::now() - pinged < Duration::from_secs(7));

        root.cancel();
        task.await.unwrap();
        assert_eq!(status.borrow().state, ConnectionState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_while_connecting() {
        let (connector, _servers) = MockConnector::new();
        let (subscriber, _events) = recorder();
        let (status, _) = watch::channel(Status::default());
        let status = Arc::new(status);
        let root = CancellationToken::new();

        let machine = Machine::new(
            Config::default(),
            Arc::new(MockResolver::default()),
            Arc::new(connector),
            Arc::new(subscriber),
            Arc::clone(&status),
            Arc::new(AtomicU64::new(0)),
            Arc::new(SnCell::default()),
            root.clone(),
        );

        root.cancel();
        machine.run().await;

        assert_eq!(status.borrow().state, ConnectionState::Closed);
        assert_eq!(status.borrow().generation, 1);
    }
}
