//! Discord API types.
//!
//! Only the fields this client reads or writes are modelled; unknown fields
//! are ignored on deserialization.

use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// Gateway frames
// ─────────────────────────────────────────────────────────────────────────────

/// Gateway frame, both directions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayPayload {
    /// Opcode
    pub op: i32,

    /// Event data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub d: Option<serde_json::Value>,

    /// Sequence number
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s: Option<u64>,

    /// Event name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub t: Option<String>,
}

/// Gateway hello event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayHello {
    /// Heartbeat interval in milliseconds
    pub heartbeat_interval: u64,
}

/// Gateway identify payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayIdentify {
    /// Bot token
    pub token: String,

    /// Connection properties
    pub properties: GatewayProperties,

    /// Gateway intents bitmask
    pub intents: u64,
}

/// Gateway connection properties.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayProperties {
    pub os: String,
    pub browser: String,
    pub device: String,
}

/// Presence update payload (opcode 3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Presence {
    /// Unix time in milliseconds the client went idle
    pub since: Option<u64>,

    #[serde(default)]
    pub activities: Vec<Activity>,

    pub status: PresenceStatus,

    #[serde(default)]
    pub afk: bool,
}

/// Presence status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceStatus {
    Online,
    Dnd,
    Idle,
    Invisible,
    Offline,
}

/// Bot activity shown in the member list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Activity {
    pub name: String,

    /// 0 playing, 1 streaming, 2 listening, 3 watching, 4 custom, 5 competing
    #[serde(rename = "type")]
    pub kind: u8,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Entities
// ─────────────────────────────────────────────────────────────────────────────

/// Discord user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// User ID
    pub id: String,

    /// Username
    pub username: String,

    /// Global display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_name: Option<String>,

    /// Avatar hash
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,

    /// Whether this is a bot
    #[serde(default)]
    pub bot: bool,
}

/// Guild member, as embedded in interactions and member updates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuildMember {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nick: Option<String>,

    #[serde(default)]
    pub roles: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub joined_at: Option<String>,
}

/// Reaction emoji. Custom emoji carry an id, unicode emoji only a name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Emoji {
    pub id: Option<String>,
    pub name: Option<String>,

    #[serde(default)]
    pub animated: bool,
}

/// Discord message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Message ID
    pub id: String,

    /// Channel ID
    pub channel_id: String,

    /// Author
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<User>,

    /// Message content (empty without the message content intent)
    #[serde(default)]
    pub content: String,

    /// Timestamp
    #[serde(default)]
    pub timestamp: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edited_timestamp: Option<String>,

    /// Embeds
    #[serde(default)]
    pub embeds: Vec<Embed>,

    #[serde(default)]
    pub mentions: Vec<User>,

    /// Guild ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member: Option<GuildMember>,

    #[serde(default)]
    pub flags: u64,
}

/// Discord embed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Embed {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<u32>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<EmbedField>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub footer: Option<EmbedFooter>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<EmbedMedia>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<EmbedMedia>,
}

/// Embed field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,

    #[serde(default)]
    pub inline: bool,
}

/// Embed footer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedFooter {
    pub text: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,
}

/// Embed image or thumbnail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedMedia {
    pub url: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Dispatch event payloads
// ─────────────────────────────────────────────────────────────────────────────

/// Gateway ready event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ready {
    /// API version
    pub v: u8,

    /// Bot user
    pub user: User,

    pub session_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resume_gateway_url: Option<String>,

    pub application: PartialApplication,

    /// Guilds the bot is in, all unavailable at this point
    #[serde(default)]
    pub guilds: Vec<UnavailableGuild>,
}

/// The application section of the ready event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartialApplication {
    pub id: String,

    #[serde(default)]
    pub flags: u64,
}

/// Guild listed in ready before its guild create arrives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnavailableGuild {
    pub id: String,

    #[serde(default)]
    pub unavailable: bool,
}

/// A single message was deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageDelete {
    pub id: String,
    pub channel_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<String>,
}

/// Several messages were deleted at once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageDeleteBulk {
    pub ids: Vec<String>,
    pub channel_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<String>,
}

/// A user reacted to a message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageReactionAdd {
    pub user_id: String,
    pub channel_id: String,
    pub message_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member: Option<GuildMember>,

    pub emoji: Emoji,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_author_id: Option<String>,
}

/// A user removed their reaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageReactionRemove {
    pub user_id: String,
    pub channel_id: String,
    pub message_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<String>,

    pub emoji: Emoji,
}

/// All reactions were removed from a message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageReactionRemoveAll {
    pub channel_id: String,
    pub message_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<String>,
}

/// All reactions of one emoji were removed from a message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageReactionRemoveEmoji {
    pub channel_id: String,
    pub message_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<String>,

    pub emoji: Emoji,
}

/// A guild member changed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuildMemberUpdate {
    pub guild_id: String,

    #[serde(default)]
    pub roles: Vec<String>,

    pub user: User,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nick: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub joined_at: Option<String>,
}

/// Thread membership of a single user. Also the thread member update payload,
/// which adds `guild_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadMember {
    /// Thread id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    pub join_timestamp: String,

    #[serde(default)]
    pub flags: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<String>,
}

/// Members were added to or removed from a thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadMembersUpdate {
    /// Thread id
    pub id: String,
    pub guild_id: String,
    pub member_count: u32,

    #[serde(default)]
    pub added_members: Vec<ThreadMember>,

    #[serde(default)]
    pub removed_member_ids: Vec<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Interactions
// ─────────────────────────────────────────────────────────────────────────────

/// Interaction type tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum InteractionType {
    Ping = 1,
    ApplicationCommand = 2,
    MessageComponent = 3,
    ApplicationCommandAutocomplete = 4,
    ModalSubmit = 5,
}

impl TryFrom<u8> for InteractionType {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Ping),
            2 => Ok(Self::ApplicationCommand),
            3 => Ok(Self::MessageComponent),
            4 => Ok(Self::ApplicationCommandAutocomplete),
            5 => Ok(Self::ModalSubmit),
            other => Err(other),
        }
    }
}

/// Interaction as it arrives in `INTERACTION_CREATE`, before classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawInteraction {
    pub id: String,
    pub application_id: String,

    #[serde(rename = "type")]
    pub kind: u8,

    /// Type-specific data, decoded by the classifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,

    /// Set when invoked in a guild
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member: Option<GuildMember>,

    /// Set when invoked in a DM
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,

    /// Continuation token, valid for 15 minutes
    pub token: String,

    #[serde(default)]
    pub version: u8,

    /// Message the component was attached to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<Message>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
}

impl RawInteraction {
    /// The invoking user, from either the guild member or the DM user.
    #[must_use]
    pub fn invoker(&self) -> Option<&User> {
        self.member
            .as_ref()
            .and_then(|member| member.user.as_ref())
            .or(self.user.as_ref())
    }
}

/// Data of application command and autocomplete interactions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandData {
    pub id: String,
    pub name: String,

    #[serde(rename = "type")]
    pub kind: u8,

    #[serde(default)]
    pub options: Vec<CommandDataOption>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<String>,

    /// Target user or message of context menu commands
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved: Option<serde_json::Value>,
}

/// Option value supplied by the invoking user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandDataOption {
    pub name: String,

    #[serde(rename = "type")]
    pub kind: u8,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,

    /// Nested options of subcommands and groups
    #[serde(default)]
    pub options: Vec<CommandDataOption>,

    /// The option the user is typing into (autocomplete only)
    #[serde(default)]
    pub focused: bool,
}

impl CommandData {
    /// Top-level option by name.
    #[must_use]
    pub fn option(&self, name: &str) -> Option<&CommandDataOption> {
        self.options.iter().find(|option| option.name == name)
    }

    /// The option currently focused in an autocomplete request, searching
    /// through subcommands.
    #[must_use]
    pub fn focused_option(&self) -> Option<&CommandDataOption> {
        fn find(options: &[CommandDataOption]) -> Option<&CommandDataOption> {
            options
                .iter()
                .find_map(|option| if option.focused { Some(option) } else { find(&option.options) })
        }
        find(&self.options)
    }
}

/// Data of message component interactions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentData {
    pub custom_id: String,
    pub component_type: u8,

    /// Selected values of select menus
    #[serde(default)]
    pub values: Vec<String>,
}

/// Data of modal submit interactions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModalSubmitData {
    pub custom_id: String,

    #[serde(default)]
    pub components: Vec<serde_json::Value>,
}

/// Interaction response callback types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum InteractionCallbackType {
    Pong = 1,
    ChannelMessageWithSource = 4,
    DeferredChannelMessageWithSource = 5,
    DeferredUpdateMessage = 6,
    UpdateMessage = 7,
    ApplicationCommandAutocompleteResult = 8,
    Modal = 9,
}

/// Message flag values used in responses.
pub mod message_flags {
    pub const SUPPRESS_EMBEDS: u64 = 1 << 2;
    pub const EPHEMERAL: u64 = 1 << 6;
    pub const SUPPRESS_NOTIFICATIONS: u64 = 1 << 12;
}

/// Body of message-creating and message-editing calls.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessagePayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tts: Option<bool>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub embeds: Vec<Embed>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flags: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_mentions: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<serde_json::Value>,
}

impl MessagePayload {
    /// Plain text message.
    #[must_use]
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::default()
        }
    }

    /// Only visible to the invoking user.
    #[must_use]
    pub const fn ephemeral(mut self) -> Self {
        self.flags = Some(match self.flags {
            Some(flags) => flags | message_flags::EPHEMERAL,
            None => message_flags::EPHEMERAL,
        });
        self
    }

    #[must_use]
    pub fn with_embed(mut self, embed: Embed) -> Self {
        self.embeds.push(embed);
        self
    }
}

/// A single autocomplete suggestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandOptionChoice {
    pub name: String,

    /// String, integer or number, matching the option type
    pub value: serde_json::Value,
}

/// Modal presented in response to an interaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModalPayload {
    pub custom_id: String,
    pub title: String,
    pub components: Vec<serde_json::Value>,
}

/// Callback data, shaped by the callback type.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum InteractionCallbackData {
    Message(MessagePayload),
    Autocomplete { choices: Vec<CommandOptionChoice> },
    Modal(ModalPayload),
}

/// Body of `POST /interactions/{id}/{token}/callback`.
#[derive(Debug, Clone, Serialize)]
pub struct InteractionResponse {
    #[serde(rename = "type")]
    pub kind: u8,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<InteractionCallbackData>,
}

impl InteractionResponse {
    /// Acknowledge a ping.
    #[must_use]
    pub const fn pong() -> Self {
        Self {
            kind: InteractionCallbackType::Pong as u8,
            data: None,
        }
    }

    /// Reply with a message.
    #[must_use]
    pub const fn message(payload: MessagePayload) -> Self {
        Self {
            kind: InteractionCallbackType::ChannelMessageWithSource as u8,
            data: Some(InteractionCallbackData::Message(payload)),
        }
    }

    /// Show a loading state; the message is edited in later.
    #[must_use]
    pub fn deferred(flags: Option<u64>) -> Self {
        Self {
            kind: InteractionCallbackType::DeferredChannelMessageWithSource as u8,
            data: Some(InteractionCallbackData::Message(MessagePayload {
                flags,
                ..MessagePayload::default()
            })),
        }
    }

    /// Answer an autocomplete request.
    #[must_use]
    pub const fn autocomplete(choices: Vec<CommandOptionChoice>) -> Self {
        Self {
            kind: InteractionCallbackType::ApplicationCommandAutocompleteResult as u8,
            data: Some(InteractionCallbackData::Autocomplete { choices }),
        }
    }

    /// Open a modal.
    #[must_use]
    pub const fn modal(modal: ModalPayload) -> Self {
        Self {
            kind: InteractionCallbackType::Modal as u8,
            data: Some(InteractionCallbackData::Modal(modal)),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Application commands
// ─────────────────────────────────────────────────────────────────────────────

/// Application command types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ApplicationCommandType {
    ChatInput = 1,
    User = 2,
    Message = 3,
}

/// Command option types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CommandOptionType {
    SubCommand = 1,
    SubCommandGroup = 2,
    String = 3,
    Integer = 4,
    Boolean = 5,
    User = 6,
    Channel = 7,
    Role = 8,
    Mentionable = 9,
    Number = 10,
    Attachment = 11,
}

/// Command descriptor supplied at registration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommandDefinition {
    pub name: String,

    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<u8>,

    /// Required for chat input commands, must be empty for context menus
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<CommandOption>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_member_permissions: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nsfw: Option<bool>,
}

impl CommandDefinition {
    /// Slash command.
    #[must_use]
    pub fn chat_input(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: Some(ApplicationCommandType::ChatInput as u8),
            description: description.into(),
            ..Self::default()
        }
    }

    /// Context menu command on users or messages.
    #[must_use]
    pub fn context_menu(name: impl Into<String>, kind: ApplicationCommandType) -> Self {
        Self {
            name: name.into(),
            kind: Some(kind as u8),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_option(mut self, option: CommandOption) -> Self {
        self.options.push(option);
        self
    }
}

/// Option schema of a command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandOption {
    #[serde(rename = "type")]
    pub kind: u8,

    pub name: String,
    pub description: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<CommandOptionChoice>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<CommandOption>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub autocomplete: Option<bool>,
}

impl CommandOption {
    #[must_use]
    pub fn new(
        kind: CommandOptionType,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            kind: kind as u8,
            name: name.into(),
            description: description.into(),
            required: None,
            choices: Vec::new(),
            options: Vec::new(),
            autocomplete: None,
        }
    }

    #[must_use]
    pub const fn required(mut self) -> Self {
        self.required = Some(true);
        self
    }

    #[must_use]
    pub const fn autocomplete(mut self) -> Self {
        self.autocomplete = Some(true);
        self
    }
}

/// Registered command as returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationCommand {
    pub id: String,
    pub application_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<String>,

    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(rename = "type", default)]
    pub kind: u8,

    #[serde(default)]
    pub version: String,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn deferred_response_carries_flags() {
        let body = serde_json::to_value(InteractionResponse::deferred(Some(
            message_flags::EPHEMERAL,
        )))
        .unwrap();
        assert_eq!(body, json!({"type": 5, "data": {"flags": 64}}));
    }

    #[test]
    fn pong_has_no_data() {
        let body = serde_json::to_value(InteractionResponse::pong()).unwrap();
        assert_eq!(body, json!({"type": 1}));
    }

    #[test]
    fn autocomplete_response_shape() {
        let body = serde_json::to_value(InteractionResponse::autocomplete(vec![
            CommandOptionChoice {
                name: "Dota 2".into(),
                value: json!("570"),
            },
        ]))
        .unwrap();
        assert_eq!(
            body,
            json!({"type": 8, "data": {"choices": [{"name": "Dota 2", "value": "570"}]}})
        );
    }

    #[test]
    fn context_menu_definition_omits_description() {
        let body = serde_json::to_value(CommandDefinition::context_menu(
            "bleagh",
            ApplicationCommandType::User,
        ))
        .unwrap();
        assert_eq!(body, json!({"name": "bleagh", "type": 2}));
    }

    #[test]
    fn focused_option_searches_subcommands() {
        let data: CommandData = serde_json::from_value(json!({
            "id": "1", "name": "steam", "type": 1,
            "options": [{
                "name": "app", "type": 1,
                "options": [{"name": "title", "type": 3, "value": "dot", "focused": true}]
            }]
        }))
        .unwrap();
        let focused = data.focused_option().unwrap();
        assert_eq!(focused.name, "title");
        assert_eq!(focused.value, Some(json!("dot")));
        assert!(data.option("app").is_some());
    }

    #[test]
    fn invoker_prefers_guild_member() {
        let raw: RawInteraction = serde_json::from_value(json!({
            "id": "1", "application_id": "2", "type": 2, "token": "t",
            "member": {"user": {"id": "10", "username": "guild"}, "roles": []},
            "user": {"id": "11", "username": "dm"}
        }))
        .unwrap();
        assert_eq!(raw.invoker().unwrap().username, "guild");
    }

    #[test]
    fn unknown_interaction_type_is_rejected() {
        assert_eq!(InteractionType::try_from(2), Ok(InteractionType::ApplicationCommand));
        assert_eq!(InteractionType::try_from(42), Err(42));
    }
}
