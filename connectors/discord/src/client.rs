//! The client most callers start from.
//!
//! Ties one gateway connection to the REST client and the event buses.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{info, instrument, warn};

use crate::{
    api::{DiscordApiClient, RestResult, UnregisterSummary},
    config::DiscordConfig,
    dispatch::{DEFAULT_CAPACITY, DispatchBus},
    error::{DiscordError, DiscordResult},
    gateway::{
        ConnectionInfo, ConnectionSnapshot, FrameSink, GatewayHandler, GatewayParams,
        GatewaySender, HeartbeatTiming, Identity, ReadyState, Transport, TransportHandle,
    },
    interaction::{InteractionBus, InteractionClassifier},
    types::{ApplicationCommand, CommandDefinition, Presence},
};

/// Close code used by [`DiscordClient::close`].
const NORMAL_CLOSURE: u16 = 1000;

struct Connection {
    transport: TransportHandle,
    sender: GatewaySender,
    task: Option<JoinHandle<()>>,
}

/// Discord bot client: one gateway connection plus the REST API.
pub struct DiscordClient {
    config: DiscordConfig,
    api: Arc<DiscordApiClient>,
    bus: Arc<DispatchBus>,
    info: Arc<ConnectionInfo>,
    connection: Mutex<Option<Connection>>,
}

impl DiscordClient {
    /// Build a client. Nothing connects until [`Self::start`].
    pub fn new(config: DiscordConfig) -> DiscordResult<Self> {
        config.validate()?;

        let api = Arc::new(DiscordApiClient::new(&config)?);
        let classifier = InteractionClassifier::new(Arc::clone(&api));

        Ok(Self {
            bus: Arc::new(DispatchBus::new(classifier, DEFAULT_CAPACITY)),
            info: Arc::new(ConnectionInfo::default()),
            connection: Mutex::new(None),
            api,
            config,
        })
    }

    #[must_use]
    pub const fn config(&self) -> &DiscordConfig {
        &self.config
    }

    #[must_use]
    pub const fn api(&self) -> &Arc<DiscordApiClient> {
        &self.api
    }

    /// Gateway dispatch events.
    #[must_use]
    pub fn events(&self) -> &DispatchBus {
        &self.bus
    }

    /// Classified interactions.
    #[must_use]
    pub fn interactions(&self) -> &InteractionBus {
        self.bus.interactions()
    }

    /// Connect to the gateway and start handling frames.
    ///
    /// Resolves once the socket is open; the handshake carries on in the
    /// background. Fails if a connection is already live.
    #[instrument(skip(self), fields(url = %self.config.gateway_url))]
    pub async fn start(&self) -> DiscordResult<()> {
        if self.ready_state() != ReadyState::Closed {
            return Err(DiscordError::Gateway("connection already started".into()));
        }

        let params = GatewayParams::new(&self.config.gateway_url, self.config.gateway_version);
        let (signal, transport, events) = Transport::connect(&params)?;

        let sink: Arc<dyn FrameSink> = Arc::new(transport.clone());
        let identity = Identity {
            token: self.config.token().to_owned(),
            intents: self.config.intents.clone(),
            name: self.config.identifier.clone(),
        };
        let timing = HeartbeatTiming {
            margin_ms: self.config.heartbeat_margin_ms,
            jitter_ms: self.config.heartbeat_jitter_ms,
        };
        let handler = GatewayHandler::new(
            Arc::clone(&sink),
            identity,
            timing,
            Arc::clone(&self.bus),
            Arc::clone(&self.info),
        );
        let task = tokio::spawn(handler.run(events));

        *self.connection.lock() = Some(Connection {
            transport,
            sender: GatewaySender::new(sink),
            task: Some(task),
        });

        signal.wait().await?;
        info!("Gateway socket open");
        Ok(())
    }

    /// Socket state; `Closed` before the first start.
    #[must_use]
    pub fn ready_state(&self) -> ReadyState {
        self.connection
            .lock()
            .as_ref()
            .map_or(ReadyState::Closed, |conn| conn.transport.ready_state())
    }

    /// What the gateway has reported so far.
    #[must_use]
    pub fn connection(&self) -> ConnectionSnapshot {
        self.info.snapshot()
    }

    /// The configured application id, else the one from Ready.
    #[must_use]
    pub fn application_id(&self) -> Option<String> {
        self.config
            .application_id
            .clone()
            .or_else(|| self.info.application_id())
    }

    /// Send a presence update over the gateway.
    pub fn update_presence(&self, presence: &Presence) -> DiscordResult<()> {
        let connection = self.connection.lock();
        let conn = connection.as_ref().ok_or(DiscordError::TransportClosed)?;
        conn.sender.update_presence(presence)
    }

    /// Close the gateway connection. No-op when nothing is connected.
    pub fn close(&self) {
        if let Some(conn) = self.connection.lock().as_ref() {
            conn.transport.close(NORMAL_CLOSURE, "client closed");
        }
    }

    /// Wait for the gateway loop to finish.
    pub async fn closed(&self) {
        let task = self
            .connection
            .lock()
            .as_mut()
            .and_then(|conn| conn.task.take());
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!(error = %e, "Gateway task ended abnormally");
            }
        }
    }

    /// Register a command for this application.
    pub async fn register_command(
        &self,
        definition: &CommandDefinition,
        guild_id: Option<&str>,
    ) -> DiscordResult<RestResult<ApplicationCommand>> {
        let application_id = self
            .application_id()
            .ok_or(DiscordError::MissingApplicationId)?;
        self.api
            .register_command(&application_id, guild_id, definition)
            .await
    }

    /// Remove every global command and the commands of `guild_ids`.
    pub async fn unregister_all_commands(
        &self,
        guild_ids: &[String],
    ) -> DiscordResult<UnregisterSummary> {
        let application_id = self
            .application_id()
            .ok_or(DiscordError::MissingApplicationId)?;
        Ok(self
            .api
            .unregister_all_commands(&application_id, guild_ids)
            .await)
    }
}

impl std::fmt::Debug for DiscordClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscordClient")
            .field("api_url", &self.config.api_url)
            .field("gateway_url", &self.config.gateway_url)
            .field("ready_state", &self.ready_state())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PresenceStatus;

    fn config() -> DiscordConfig {
        DiscordConfig::new("Bot secret-token")
    }

    #[test]
    fn new_rejects_invalid_config() {
        let mut cfg = config();
        cfg.bot_token = String::new();
        assert!(DiscordClient::new(cfg).is_err());
    }

    #[test]
    fn new_rejects_empty_intents() {
        let mut cfg = config();
        cfg.intents = Vec::new();
        let err = DiscordClient::new(cfg).unwrap_err();
        assert!(matches!(err, DiscordError::EmptyIntents));
    }

    #[test]
    fn starts_closed() {
        let client = DiscordClient::new(config()).unwrap();
        assert_eq!(client.ready_state(), ReadyState::Closed);
        assert_eq!(client.connection(), ConnectionSnapshot::default());
        client.close();
    }

    #[test]
    fn presence_needs_a_connection() {
        let client = DiscordClient::new(config()).unwrap();
        let presence = Presence {
            since: None,
            activities: Vec::new(),
            status: PresenceStatus::Idle,
            afk: true,
        };
        let err = client.update_presence(&presence).unwrap_err();
        assert!(matches!(err, DiscordError::TransportClosed));
    }

    #[test]
    fn configured_application_id_wins() {
        let mut cfg = config();
        cfg.application_id = Some("42".into());
        let client = DiscordClient::new(cfg).unwrap();
        assert_eq!(client.application_id().as_deref(), Some("42"));
    }

    #[tokio::test]
    async fn commands_need_an_application_id() {
        let client = DiscordClient::new(config()).unwrap();
        let definition = CommandDefinition::chat_input("ping", "Pong back");

        let err = client
            .register_command(&definition, None)
            .await
            .unwrap_err();
        assert!(matches!(err, DiscordError::MissingApplicationId));

        let err = client.unregister_all_commands(&[]).await.unwrap_err();
        assert!(matches!(err, DiscordError::MissingApplicationId));
    }

    #[tokio::test]
    async fn start_fails_when_nothing_listens() {
        let mut cfg = config();
        cfg.gateway_url = "ws://127.0.0.1:9".into();
        let client = DiscordClient::new(cfg).unwrap();

        let err = client.start().await.unwrap_err();
        assert!(matches!(err, DiscordError::Connect { .. }));
        client.closed().await;
        assert_eq!(client.ready_state(), ReadyState::Closed);
    }
}
