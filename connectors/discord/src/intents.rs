//! Gateway intents.
//!
//! An intent subscribes the connection to a category of events. Identify
//! sends them as a single bitmask.

use serde::{Deserialize, Serialize};

/// A single gateway intent, stored as its bit position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum GatewayIntent {
    Guilds = 0,
    GuildMembers = 1,
    GuildModeration = 2,
    GuildExpressions = 3,
    GuildIntegrations = 4,
    GuildWebhooks = 5,
    GuildInvites = 6,
    GuildVoiceStates = 7,
    GuildPresences = 8,
    GuildMessages = 9,
    GuildMessageReactions = 10,
    GuildMessageTyping = 11,
    DirectMessages = 12,
    DirectMessageReactions = 13,
    DirectMessageTyping = 14,
    MessageContent = 15,
    GuildScheduledEvents = 16,
    AutoModerationConfiguration = 20,
    AutoModerationExecution = 21,
    GuildMessagePolls = 24,
    DirectMessagePolls = 25,
}

/// Intents every identify carries regardless of configuration.
pub const BASELINE_INTENTS: &[GatewayIntent] = &[GatewayIntent::MessageContent];

impl GatewayIntent {
    /// The flag value of this intent.
    #[must_use]
    pub const fn bit(self) -> u64 {
        1 << (self as u8)
    }
}

/// OR a set of intents into a bitmask. Duplicates collapse.
#[must_use]
pub fn intent_mask(intents: &[GatewayIntent]) -> u64 {
    intents.iter().fold(0, |mask, intent| mask | intent.bit())
}

/// Intents used when the configuration does not name any.
#[must_use]
pub fn default_intents() -> Vec<GatewayIntent> {
    vec![
        GatewayIntent::Guilds,
        GatewayIntent::GuildMessages,
        GatewayIntent::GuildWebhooks,
    ]
}
