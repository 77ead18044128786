//! Websocket gateway engine and its connection state machine.

mod config;
mod error;
mod inner;
pub mod policy;
mod resolver;
mod transport;

#[cfg(test)]
mod testing;

pub use config::Config;
pub use error::GatewayError;
pub use resolver::{GatewayResolver, ResolveError};
pub use transport::{Connector, Transport, TransportError, WebsocketConnector, WebsocketTransport};

use std::{
    fmt::Debug,
    sync::{atomic::AtomicU64, Arc},
};

use tokio::{sync::watch, task::JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::subscriber::Subscriber;
use inner::{Machine, SnCell};

/// Connection state of the gateway engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// not started yet
    Idle,
    /// resolving gateway url and establishing transport
    Connecting,
    /// transport established, waiting hello (or resume ack)
    AwaitingHello,
    /// handshake finished, receiving events
    Active,
    /// last generation ended, waiting before next attempt
    Reconnecting,
    /// stopped by user
    Closed,
    /// stopped by a fatal error, see [`Status::last_error`]
    Failed,
}

impl ConnectionState {
    /// The engine will not leave this state by itself
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Closed | Self::Failed)
    }
}

/// Observable snapshot of the gateway engine
#[derive(Debug, Clone)]
pub struct Status {
    /// current state
    pub state: ConnectionState,
    /// current connection generation, zero before first connect
    pub generation: u64,
    /// session id negotiated by hello or resume ack
    pub session_id: Option<String>,
    /// last error which ended a generation
    pub last_error: Option<Arc<GatewayError>>,
}

impl Default for Status {
    fn default() -> Self {
        Self {
            state: ConnectionState::Idle,
            generation: 0,
            session_id: None,
            last_error: None,
        }
    }
}

#[derive(Debug)]
struct Running {
    root: CancellationToken,
    task: JoinHandle<()>,
}

/// Kaiheila websocket gateway engine, it will follow the official state machine at:
/// <https://developer.kaiheila.cn/doc/websocket#Gateway>
///
/// Events are delivered to the subscriber in arrival order, connection failures are
/// retried in background and only show up in [`Gateway::status`].
pub struct Gateway<R, C = WebsocketConnector> {
    config: Config,
    resolver: Arc<R>,
    connector: Arc<C>,
    subscriber: Arc<dyn Subscriber>,
    status: Arc<watch::Sender<Status>>,
    generations: Arc<AtomicU64>,
    sn: Arc<SnCell>,
    running: Option<Running>,
}

impl<R, C> Debug for Gateway<R, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("config", &self.config)
            .field("subscriber", &self.subscriber.name())
            .field("status", &*self.status.borrow())
            .field("running", &self.running.is_some())
            .finish()
    }
}

impl<R, C> Gateway<R, C>
where
    R: GatewayResolver,
    C: Connector,
{
    /// Create a gateway engine, it does nothing until [`Gateway::start`]
    pub fn new<S>(config: Config, resolver: R, connector: C, subscriber: S) -> Self
    where
        S: Subscriber + 'static,
    {
        let (status, _) = watch::channel(Status::default());

        Self {
            config,
            resolver: Arc::new(resolver),
            connector: Arc::new(connector),
            subscriber: Arc::new(subscriber),
            status: Arc::new(status),
            generations: Arc::new(AtomicU64::new(0)),
            sn: Arc::new(SnCell::default()),
            running: None,
        }
    }

    /// Start connecting in background.
    ///
    /// Calling it on a running engine does nothing, calling it after the engine
    /// closed or failed starts again with a cold connect.
    pub fn start(&mut self) {
        if let Some(ref running) = self.running {
            if !running.task.is_finished() {
                log::warn!("Gateway engine already running, ignore start");
                return;
            }
        }

        log::info!("Start gateway engine");

        let root = CancellationToken::new();
        let machine = Machine::new(
            self.config.clone(),
            Arc::clone(&self.resolver),
            Arc::clone(&self.connector),
            Arc::clone(&self.subscriber),
            Arc::clone(&self.status),
            Arc::clone(&self.generations),
            Arc::clone(&self.sn),
            root.clone(),
        );

        self.status.send_modify(|status| {
            status.state = ConnectionState::Connecting;
            status.session_id = None;
            status.last_error = None;
        });

        let task = tokio::spawn(machine.run());
        self.running = Some(Running { root, task });
    }

    /// Stop the engine, close the transport and wait all background tasks to stop.
    ///
    /// Safe to call in any state, and more than once.
    pub async fn stop(&mut self) {
        if let Some(running) = self.running.take() {
            log::info!("Stop gateway engine");

            running.root.cancel();
            if let Err(err) = running.task.await {
                log::error!("Gateway engine task ended abnormally: {}", err);
            }
        }

        self.status
            .send_modify(|status| status.state = ConnectionState::Closed);
    }
}

impl<R, C> Gateway<R, C> {
    /// Current status snapshot
    pub fn status(&self) -> Status {
        self.status.borrow().clone()
    }

    /// Current state
    pub fn state(&self) -> ConnectionState {
        self.status.borrow().state
    }

    /// Last error which ended a generation, or made the engine fail
    pub fn last_error(&self) -> Option<Arc<GatewayError>> {
        self.status.borrow().last_error.clone()
    }

    /// Serial number of last received event in current session
    pub fn last_sn(&self) -> u64 {
        self.sn.get()
    }

    /// Observe every status change
    pub fn watch(&self) -> watch::Receiver<Status> {
        self.status.subscribe()
    }

    /// Wait until the engine closed or failed, returns the final status
    pub async fn terminated(&self) -> Status {
        let mut rx = self.watch();
        let result = rx.wait_for(|status| status.state.is_terminal()).await;
        match result {
            Ok(status) => status.clone(),
            Err(_) => self.status(),
        }
    }
}

impl<R, C> Drop for Gateway<R, C> {
    fn drop(&mut self) {
        if let Some(ref running) = self.running {
            running.root.cancel();
        }
    }
}
