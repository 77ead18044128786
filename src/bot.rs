//! Bot runner, wires the api client and websocket gateway together.

use snafu::prelude::*;

use crate::{
    api, error,
    subscriber::Subscriber,
    ws::{client::WebsocketConnector, Config, ConnectionState, Gateway},
    Result,
};

/// Burz instance
#[derive(Debug)]
pub struct Bot {
    api_client: api::Client,
    config: Config,
}

impl Bot {
    /// Create new framework instance using bot token
    pub fn new<S: AsRef<str> + ?Sized>(token: &S) -> Result<Self> {
        let api_client =
            api::Client::new_from_bot_token(&token).context(error::CreateAPIClientFailed)?;

        log::info!("Create api client success");

        Ok(Self {
            api_client,
            config: Config::default(),
        })
    }

    /// Use custom gateway engine config
    #[must_use]
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Connect to gateway and deliver events to subscriber, until the gateway
    /// engine gives up.
    pub async fn run<S>(self, subscriber: S) -> Result<()>
    where
        S: Subscriber + 'static,
    {
        log::info!("Bot start with subscriber {}", subscriber.name());

        let mut gateway = Gateway::new(
            self.config,
            self.api_client,
            WebsocketConnector,
            subscriber,
        );

        gateway.start();

        let status = gateway.terminated().await;

        log::debug!("Gateway engine terminated: {:?}", status);

        match (status.state, status.last_error) {
            (ConnectionState::Failed, Some(source)) => Err(error::Error::GatewayFailed { source }),
            _ => Ok(()),
        }
    }
}
