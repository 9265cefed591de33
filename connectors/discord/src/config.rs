//! Discord client configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{
    error::{DiscordError, DiscordResult},
    intents::{GatewayIntent, default_intents},
};

/// Configuration for the Discord client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordConfig {
    /// Bot token from Discord Developer Portal
    pub bot_token: String,

    /// Application ID (learned from the Ready event when absent)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application_id: Option<String>,

    /// Base URL for the Discord API (default: https://discord.com/api/v10)
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Gateway URL without query parameters
    #[serde(default = "default_gateway_url")]
    pub gateway_url: String,

    /// Gateway protocol version, sent as the `v` query parameter
    #[serde(default = "default_gateway_version")]
    pub gateway_version: u8,

    /// REST request timeout
    #[serde(default = "default_timeout", with = "duration_secs")]
    pub timeout: Duration,

    /// Gateway intents, on top of the baseline ones
    #[serde(default = "default_intents")]
    pub intents: Vec<GatewayIntent>,

    /// Client name sent as identify browser/device
    #[serde(default = "default_identifier")]
    pub identifier: String,

    /// Subtracted from the gateway heartbeat interval
    #[serde(default = "default_heartbeat_margin_ms")]
    pub heartbeat_margin_ms: u64,

    /// Upper bound (exclusive) of the delay before the first heartbeat
    #[serde(default = "default_heartbeat_jitter_ms")]
    pub heartbeat_jitter_ms: u64,
}

fn default_api_url() -> String {
    "https://discord.com/api/v10".into()
}

fn default_gateway_url() -> String {
    "wss://gateway.discord.gg".into()
}

const fn default_gateway_version() -> u8 {
    10
}

const fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_identifier() -> String {
    "rabscuttle".into()
}

const fn default_heartbeat_margin_ms() -> u64 {
    5_000
}

const fn default_heartbeat_jitter_ms() -> u64 {
    100
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

impl DiscordConfig {
    /// Configuration with defaults for everything but the token.
    #[must_use]
    pub fn new(bot_token: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
            ..Self::default()
        }
    }

    /// Parse and validate a JSON configuration document.
    pub fn from_json_str(json: &str) -> DiscordResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the client cannot start with.
    pub fn validate(&self) -> DiscordResult<()> {
        if self.token().is_empty() {
            return Err(DiscordError::Config(
                "Missing required 'bot_token' in configuration".into(),
            ));
        }
        if self.identifier.is_empty() {
            return Err(DiscordError::Config("'identifier' must not be empty".into()));
        }
        if self.intents.is_empty() {
            return Err(DiscordError::EmptyIntents);
        }
        Ok(())
    }

    /// The bot token with any `Bot ` prefix removed.
    #[must_use]
    pub fn token(&self) -> &str {
        self.bot_token
            .strip_prefix("Bot ")
            .unwrap_or(&self.bot_token)
            .trim()
    }
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            application_id: None,
            api_url: default_api_url(),
            gateway_url: default_gateway_url(),
            gateway_version: default_gateway_version(),
            timeout: default_timeout(),
            intents: default_intents(),
            identifier: default_identifier(),
            heartbeat_margin_ms: default_heartbeat_margin_ms(),
            heartbeat_jitter_ms: default_heartbeat_jitter_ms(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_document_fills_defaults() {
        let config = DiscordConfig::from_json_str(r#"{"bot_token": "abc"}"#).unwrap();
        assert_eq!(config.api_url, "https://discord.com/api/v10");
        assert_eq!(config.gateway_url, "wss://gateway.discord.gg");
        assert_eq!(config.gateway_version, 10);
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.intents, default_intents());
        assert_eq!(config.identifier, "rabscuttle");
        assert_eq!(config.heartbeat_margin_ms, 5_000);
        assert!(config.application_id.is_none());
    }

    #[test]
    fn empty_token_is_rejected() {
        let err = DiscordConfig::from_json_str(r#"{"bot_token": ""}"#).unwrap_err();
        assert!(matches!(err, DiscordError::Config(_)));

        let err = DiscordConfig::new("Bot ").validate().unwrap_err();
        assert!(matches!(err, DiscordError::Config(_)));
    }

    #[test]
    fn empty_intents_are_rejected() {
        let err = DiscordConfig::from_json_str(r#"{"bot_token": "t", "intents": []}"#).unwrap_err();
        assert!(matches!(err, DiscordError::EmptyIntents));

        let mut config = DiscordConfig::new("t");
        config.intents.clear();
        assert!(matches!(config.validate(), Err(DiscordError::EmptyIntents)));
    }

    #[test]
    fn bot_prefix_is_stripped() {
        assert_eq!(DiscordConfig::new("Bot abc.def").token(), "abc.def");
        assert_eq!(DiscordConfig::new("abc.def").token(), "abc.def");
    }

    #[test]
    fn timeout_round_trips_as_seconds() {
        let config = DiscordConfig::from_json_str(r#"{"bot_token": "t", "timeout": 5}"#).unwrap();
        assert_eq!(config.timeout, Duration::from_secs(5));
        let value = serde_json::to_value(&config).unwrap();
        assert_eq!(value["timeout"], 5);
    }
}
