//! Outgoing gateway commands.

use std::sync::Arc;

use tracing::debug;

use super::{FrameSink, GatewayOpcode};
use crate::{
    error::{DiscordError, DiscordResult},
    intents::{BASELINE_INTENTS, GatewayIntent, intent_mask},
    types::{GatewayIdentify, GatewayPayload, GatewayProperties, Presence},
};

/// Who the connection identifies as.
#[derive(Debug, Clone)]
pub struct Identity {
    /// Bot token without the `Bot ` prefix
    pub token: String,
    pub intents: Vec<GatewayIntent>,
    /// Sent as both browser and device
    pub name: String,
}

/// Writes protocol commands to the gateway.
#[derive(Clone)]
pub struct GatewaySender {
    sink: Arc<dyn FrameSink>,
}

impl GatewaySender {
    pub fn new(sink: Arc<dyn FrameSink>) -> Self {
        Self { sink }
    }

    /// The sink frames go to, shared with the heartbeat.
    #[must_use]
    pub fn sink(&self) -> Arc<dyn FrameSink> {
        Arc::clone(&self.sink)
    }

    /// Send Identify and return the intent bitmask that was sent.
    ///
    /// The bitmask is the union of the baseline intents and `intents`.
    ///
    /// # Errors
    ///
    /// [`DiscordError::EmptyIntents`] before anything is sent when `intents`
    /// is empty.
    pub fn send_identification(
        &self,
        token: &str,
        intents: &[GatewayIntent],
        name: &str,
    ) -> DiscordResult<u64> {
        if intents.is_empty() {
            return Err(DiscordError::EmptyIntents);
        }

        let mask = intent_mask(BASELINE_INTENTS) | intent_mask(intents);
        let identify = GatewayIdentify {
            token: token.to_string(),
            properties: GatewayProperties {
                os: std::env::consts::OS.into(),
                browser: name.into(),
                device: name.into(),
            },
            intents: mask,
        };

        debug!(intents = intents.len(), mask, name, "Sending identify");
        self.sink.send_frame(&GatewayPayload::outgoing(
            GatewayOpcode::Identify,
            serde_json::to_value(&identify)?,
        ))?;
        Ok(mask)
    }

    /// Update the bot's presence.
    pub fn update_presence(&self, presence: &Presence) -> DiscordResult<()> {
        debug!(status = ?presence.status, "Sending presence update");
        self.sink.send_frame(&GatewayPayload::outgoing(
            GatewayOpcode::PresenceUpdate,
            serde_json::to_value(presence)?,
        ))
    }
}

impl std::fmt::Debug for GatewaySender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewaySender").finish_non_exhaustive()
    }
}
