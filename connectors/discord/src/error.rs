//! Discord client error types.

use thiserror::Error;

use crate::gateway::ReadyState;

/// Discord client errors.
///
/// REST responses with an unexpected status are not errors; they come back as
/// [`crate::api::RestResult::Failure`]. Everything here is either a local
/// contract violation or a network-level failure.
#[derive(Error, Debug)]
pub enum DiscordError {
    /// HTTP request failed before a response was received
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket error
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Gateway URL could not be built
    #[error("Invalid gateway URL: {0}")]
    Url(#[from] url::ParseError),

    /// The socket left the connecting state without ever opening
    #[error("WebSocket is either closing or already closed (state: {state:?})")]
    Connect {
        /// Ready-state observed when the connect signal resolved
        state: ReadyState,
    },

    /// Identify was attempted without any intents
    #[error("Intents cannot be empty")]
    EmptyIntents,

    /// The transport is gone; frames can no longer be sent
    #[error("Transport closed")]
    TransportClosed,

    /// Generic gateway error
    #[error("Gateway error: {0}")]
    Gateway(String),

    /// Invalid client configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// A command registration needed the application id before Ready arrived
    #[error("Application id unknown: configure it or wait for the Ready event")]
    MissingApplicationId,

    /// Logging subscriber could not be installed
    #[error("Logging initialization failed: {0}")]
    Logging(String),
}

impl DiscordError {
    /// Check if this error is worth retrying by the caller.
    ///
    /// Nothing in this crate retries on its own.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Http(_) | Self::WebSocket(_) | Self::Connect { .. } | Self::TransportClosed
        )
    }
}

/// Result type for Discord operations.
pub type DiscordResult<T> = Result<T, DiscordError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contract_violations_are_not_retryable() {
        assert!(!DiscordError::EmptyIntents.is_retryable());
        assert!(!DiscordError::Config("missing token".into()).is_retryable());
        assert!(!DiscordError::MissingApplicationId.is_retryable());
    }

    #[test]
    fn network_failures_are_retryable() {
        assert!(DiscordError::Connect { state: ReadyState::Closed }.is_retryable());
        assert!(DiscordError::TransportClosed.is_retryable());
    }

    #[test]
    fn connect_error_names_observed_state() {
        let err = DiscordError::Connect { state: ReadyState::Closing };
        assert!(err.to_string().contains("Closing"));
    }
}
