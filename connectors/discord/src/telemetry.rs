//! Logging setup and redaction of secrets in logged payloads.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    prelude::*,
};

use crate::error::{DiscordError, DiscordResult};

/// Keys whose values never reach a log line.
pub const SENSITIVE_KEYS: &[&str] = &["token", "authorization", "password", "secret"];

const REDACTED: &str = "[REDACTED]";

/// Logging options for binaries embedding the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset
    #[serde(default = "default_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

fn default_level() -> String {
    "info".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            json: false,
        }
    }
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over `config.level`. Calling this twice
/// returns an error.
pub fn init_logging(config: &LoggingConfig) -> DiscordResult<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let subscriber = tracing_subscriber::registry().with(env_filter);

    let installed = if config.json {
        subscriber
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_target(true)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .try_init()
    } else {
        subscriber
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_line_number(true)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .try_init()
    };

    installed.map_err(|e| DiscordError::Logging(e.to_string()))
}

fn is_sensitive(key: &str, keys: &[&str]) -> bool {
    let key = key.to_ascii_lowercase();
    keys.iter().any(|k| key.contains(&k.to_ascii_lowercase()))
}

/// Copy of `value` with every field whose name contains one of `keys`
/// replaced by `[REDACTED]`, at any depth.
#[must_use]
pub fn redact_sensitive(value: &Value, keys: &[&str]) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, val)| {
                    let val = if is_sensitive(key, keys) {
                        Value::String(REDACTED.into())
                    } else {
                        redact_sensitive(val, keys)
                    };
                    (key.clone(), val)
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(|v| redact_sensitive(v, keys)).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn identify_token_is_redacted() {
        let frame = json!({
            "op": 2,
            "d": {
                "token": "abc.def",
                "properties": {"os": "linux", "browser": "rabscuttle", "device": "rabscuttle"},
                "intents": 33281
            }
        });

        let redacted = redact_sensitive(&frame, SENSITIVE_KEYS);
        assert_eq!(redacted["d"]["token"], "[REDACTED]");
        assert_eq!(redacted["d"]["intents"], 33281);
        assert_eq!(redacted["d"]["properties"]["browser"], "rabscuttle");
    }

    #[test]
    fn matching_is_case_insensitive_and_nested_in_arrays() {
        let value = json!([{"Authorization": "Bot x"}, {"client_secret": "y", "name": "z"}]);
        let redacted = redact_sensitive(&value, SENSITIVE_KEYS);
        assert_eq!(redacted[0]["Authorization"], "[REDACTED]");
        assert_eq!(redacted[1]["client_secret"], "[REDACTED]");
        assert_eq!(redacted[1]["name"], "z");
    }

    #[test]
    fn logging_config_defaults() {
        let config: LoggingConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.level, "info");
        assert!(!config.json);
    }
}
