//! Dispatch event bus.
//!
//! One `broadcast` stream per dispatch event. Subscribers consume in their
//! own tasks, so a slow subscriber never holds up the gateway; one that
//! falls more than the channel capacity behind gets
//! [`broadcast::error::RecvError::Lagged`] and misses the oldest events.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::{
    interaction::{Interaction, InteractionBus, InteractionClassifier},
    types::{
        GuildMemberUpdate, Message, MessageDelete, MessageDeleteBulk, MessageReactionAdd,
        MessageReactionRemove, MessageReactionRemoveAll, MessageReactionRemoveEmoji,
        RawInteraction, Ready, ThreadMember, ThreadMembersUpdate, User,
    },
};

/// Dispatch events the bus routes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DispatchEventKind {
    Ready,
    InteractionCreate,
    MessageCreate,
    MessageUpdate,
    MessageDelete,
    MessageDeleteBulk,
    MessageReactionAdd,
    MessageReactionRemove,
    MessageReactionRemoveAll,
    MessageReactionRemoveEmoji,
    UserUpdate,
    GuildMemberUpdate,
    ThreadMemberUpdate,
    ThreadMembersUpdate,
}

impl DispatchEventKind {
    pub const ALL: [Self; 14] = [
        Self::Ready,
        Self::InteractionCreate,
        Self::MessageCreate,
        Self::MessageUpdate,
        Self::MessageDelete,
        Self::MessageDeleteBulk,
        Self::MessageReactionAdd,
        Self::MessageReactionRemove,
        Self::MessageReactionRemoveAll,
        Self::MessageReactionRemoveEmoji,
        Self::UserUpdate,
        Self::GuildMemberUpdate,
        Self::ThreadMemberUpdate,
        Self::ThreadMembersUpdate,
    ];

    /// The `t` field value of this event.
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Ready => "READY",
            Self::InteractionCreate => "INTERACTION_CREATE",
            Self::MessageCreate => "MESSAGE_CREATE",
            Self::MessageUpdate => "MESSAGE_UPDATE",
            Self::MessageDelete => "MESSAGE_DELETE",
            Self::MessageDeleteBulk => "MESSAGE_DELETE_BULK",
            Self::MessageReactionAdd => "MESSAGE_REACTION_ADD",
            Self::MessageReactionRemove => "MESSAGE_REACTION_REMOVE",
            Self::MessageReactionRemoveAll => "MESSAGE_REACTION_REMOVE_ALL",
            Self::MessageReactionRemoveEmoji => "MESSAGE_REACTION_REMOVE_EMOJI",
            Self::UserUpdate => "USER_UPDATE",
            Self::GuildMemberUpdate => "GUILD_MEMBER_UPDATE",
            Self::ThreadMemberUpdate => "THREAD_MEMBER_UPDATE",
            Self::ThreadMembersUpdate => "THREAD_MEMBERS_UPDATE",
        }
    }

    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.tag() == tag)
    }
}

/// Decode `data` and send it; decode failures are logged and dropped.
fn publish<T: DeserializeOwned>(
    kind: DispatchEventKind,
    sender: &broadcast::Sender<Arc<T>>,
    data: Value,
) {
    match serde_json::from_value::<T>(data) {
        Ok(event) => {
            // No subscribers is fine.
            let _ = sender.send(Arc::new(event));
        }
        Err(e) => warn!(event = kind.tag(), error = %e, "Failed to decode dispatch payload"),
    }
}

/// Typed streams for every routed dispatch event.
#[derive(Debug)]
pub struct DispatchBus {
    classifier: InteractionClassifier,
    interactions: InteractionBus,
    ready: broadcast::Sender<Arc<Ready>>,
    message_create: broadcast::Sender<Arc<Message>>,
    message_update: broadcast::Sender<Arc<Message>>,
    message_delete: broadcast::Sender<Arc<MessageDelete>>,
    message_delete_bulk: broadcast::Sender<Arc<MessageDeleteBulk>>,
    reaction_add: broadcast::Sender<Arc<MessageReactionAdd>>,
    reaction_remove: broadcast::Sender<Arc<MessageReactionRemove>>,
    reaction_remove_all: broadcast::Sender<Arc<MessageReactionRemoveAll>>,
    reaction_remove_emoji: broadcast::Sender<Arc<MessageReactionRemoveEmoji>>,
    user_update: broadcast::Sender<Arc<User>>,
    guild_member_update: broadcast::Sender<Arc<GuildMemberUpdate>>,
    thread_member_update: broadcast::Sender<Arc<ThreadMember>>,
    thread_members_update: broadcast::Sender<Arc<ThreadMembersUpdate>>,
}

/// Default per-stream buffer.
pub const DEFAULT_CAPACITY: usize = 256;

impl DispatchBus {
    /// All streams are created here and live as long as the bus.
    #[must_use]
    pub fn new(classifier: InteractionClassifier, capacity: usize) -> Self {
        Self {
            classifier,
            interactions: InteractionBus::new(capacity),
            ready: broadcast::channel(capacity).0,
            message_create: broadcast::channel(capacity).0,
            message_update: broadcast::channel(capacity).0,
            message_delete: broadcast::channel(capacity).0,
            message_delete_bulk: broadcast::channel(capacity).0,
            reaction_add: broadcast::channel(capacity).0,
            reaction_remove: broadcast::channel(capacity).0,
            reaction_remove_all: broadcast::channel(capacity).0,
            reaction_remove_emoji: broadcast::channel(capacity).0,
            user_update: broadcast::channel(capacity).0,
            guild_member_update: broadcast::channel(capacity).0,
            thread_member_update: broadcast::channel(capacity).0,
            thread_members_update: broadcast::channel(capacity).0,
        }
    }

    /// Route one dispatch payload. Returns `false` for events the bus does
    /// not know.
    pub fn dispatch(&self, event_name: &str, data: Value) -> bool {
        let Some(kind) = DispatchEventKind::from_tag(event_name) else {
            debug!(event = event_name, "Unhandled dispatch event");
            return false;
        };

        match kind {
            DispatchEventKind::Ready => publish(kind, &self.ready, data),
            DispatchEventKind::InteractionCreate => {
                if let Some(raw) = decode_interaction(data) {
                    if let Some(interaction) = self.classifier.classify(raw) {
                        self.interactions.publish(&interaction);
                    }
                }
            }
            DispatchEventKind::MessageCreate => publish(kind, &self.message_create, data),
            DispatchEventKind::MessageUpdate => publish(kind, &self.message_update, data),
            DispatchEventKind::MessageDelete => publish(kind, &self.message_delete, data),
            DispatchEventKind::MessageDeleteBulk => publish(kind, &self.message_delete_bulk, data),
            DispatchEventKind::MessageReactionAdd => publish(kind, &self.reaction_add, data),
            DispatchEventKind::MessageReactionRemove => publish(kind, &self.reaction_remove, data),
            DispatchEventKind::MessageReactionRemoveAll => publish(kind, &self.reaction_remove_all, data),
            DispatchEventKind::MessageReactionRemoveEmoji => publish(kind, &self.reaction_remove_emoji, data),
            DispatchEventKind::UserUpdate => publish(kind, &self.user_update, data),
            DispatchEventKind::GuildMemberUpdate => publish(kind, &self.guild_member_update, data),
            DispatchEventKind::ThreadMemberUpdate => publish(kind, &self.thread_member_update, data),
            DispatchEventKind::ThreadMembersUpdate => publish(kind, &self.thread_members_update, data),
        }
        true
    }

    /// Per-type interaction streams.
    #[must_use]
    pub const fn interactions(&self) -> &InteractionBus {
        &self.interactions
    }

    #[must_use]
    pub fn subscribe_ready(&self) -> broadcast::Receiver<Arc<Ready>> {
        self.ready.subscribe()
    }

    /// Every classified interaction, whatever its type.
    #[must_use]
    pub fn subscribe_interaction_create(&self) -> broadcast::Receiver<Interaction> {
        self.interactions.subscribe_any()
    }

    #[must_use]
    pub fn subscribe_message_create(&self) -> broadcast::Receiver<Arc<Message>> {
        self.message_create.subscribe()
    }

    #[must_use]
    pub fn subscribe_message_update(&self) -> broadcast::Receiver<Arc<Message>> {
        self.message_update.subscribe()
    }

    #[must_use]
    pub fn subscribe_message_delete(&self) -> broadcast::Receiver<Arc<MessageDelete>> {
        self.message_delete.subscribe()
    }

    #[must_use]
    pub fn subscribe_message_delete_bulk(&self) -> broadcast::Receiver<Arc<MessageDeleteBulk>> {
        self.message_delete_bulk.subscribe()
    }

    #[must_use]
    pub fn subscribe_reaction_add(&self) -> broadcast::Receiver<Arc<MessageReactionAdd>> {
        self.reaction_add.subscribe()
    }

    #[must_use]
    pub fn subscribe_reaction_remove(&self) -> broadcast::Receiver<Arc<MessageReactionRemove>> {
        self.reaction_remove.subscribe()
    }

    #[must_use]
    pub fn subscribe_reaction_remove_all(
        &self,
    ) -> broadcast::Receiver<Arc<MessageReactionRemoveAll>> {
        self.reaction_remove_all.subscribe()
    }

    #[must_use]
    pub fn subscribe_reaction_remove_emoji(
        &self,
    ) -> broadcast::Receiver<Arc<MessageReactionRemoveEmoji>> {
        self.reaction_remove_emoji.subscribe()
    }

    #[must_use]
    pub fn subscribe_user_update(&self) -> broadcast::Receiver<Arc<User>> {
        self.user_update.subscribe()
    }

    #[must_use]
    pub fn subscribe_guild_member_update(&self) -> broadcast::Receiver<Arc<GuildMemberUpdate>> {
        self.guild_member_update.subscribe()
    }

    #[must_use]
    pub fn subscribe_thread_member_update(&self) -> broadcast::Receiver<Arc<ThreadMember>> {
        self.thread_member_update.subscribe()
    }

    #[must_use]
    pub fn subscribe_thread_members_update(
        &self,
    ) -> broadcast::Receiver<Arc<ThreadMembersUpdate>> {
        self.thread_members_update.subscribe()
    }
}

fn decode_interaction(data: Value) -> Option<RawInteraction> {
    match serde_json::from_value(data) {
        Ok(raw) => Some(raw),
        Err(e) => {
            warn!(
                event = DispatchEventKind::InteractionCreate.tag(),
                error = %e,
                "Failed to decode dispatch payload"
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{api::DiscordApiClient, config::DiscordConfig};

    fn bus() -> DispatchBus {
        let api = DiscordApiClient::new(&DiscordConfig::new("token")).unwrap();
        DispatchBus::new(InteractionClassifier::new(Arc::new(api)), 16)
    }

    #[test]
    fn tags_round_trip() {
        for kind in DispatchEventKind::ALL {
            assert_eq!(DispatchEventKind::from_tag(kind.tag()), Some(kind));
        }
        assert_eq!(DispatchEventKind::from_tag("GUILD_CREATE"), None);
    }

    #[test]
    fn message_create_reaches_subscriber() {
        let bus = bus();
        let mut messages = bus.subscribe_message_create();

        assert!(bus.dispatch(
            "MESSAGE_CREATE",
            json!({"id": "1", "channel_id": "2", "content": "hi", "author": {"id": "3", "username": "ana"}})
        ));

        let message = messages.try_recv().unwrap();
        assert_eq!(message.content, "hi");
        assert_eq!(message.author.as_ref().unwrap().username, "ana");
    }

    #[test]
    fn reaction_remove_emoji_is_routed() {
        let bus = bus();
        let mut removed = bus.subscribe_reaction_remove_emoji();
        let mut added = bus.subscribe_reaction_add();

        bus.dispatch(
            "MESSAGE_REACTION_REMOVE_EMOJI",
            json!({"channel_id": "1", "message_id": "2", "emoji": {"id": null, "name": "🔥"}}),
        );

        assert_eq!(removed.try_recv().unwrap().emoji.name.as_deref(), Some("🔥"));
        assert!(added.try_recv().is_err());
    }

    #[test]
    fn unknown_event_is_dropped() {
        let bus = bus();
        assert!(!bus.dispatch("GUILD_CREATE", json!({"id": "1"})));
    }

    #[test]
    fn undecodable_payload_is_dropped() {
        let bus = bus();
        let mut deletes = bus.subscribe_message_delete_bulk();
        assert!(bus.dispatch("MESSAGE_DELETE_BULK", json!({"ids": "not a list"})));
        assert!(deletes.try_recv().is_err());
    }

    #[test]
    fn command_interaction_reaches_both_streams() {
        let bus = bus();
        let mut commands = bus.interactions().subscribe_commands();
        let mut any = bus.subscribe_interaction_create();

        bus.dispatch(
            "INTERACTION_CREATE",
            json!({
                "id": "10", "application_id": "20", "type": 2, "token": "tok",
                "data": {"id": "1", "name": "blep", "type": 1}
            }),
        );

        let command = commands.try_recv().unwrap();
        let Interaction::Command(same) = any.try_recv().unwrap() else {
            panic!("expected a command on the catch-all stream");
        };
        assert!(Arc::ptr_eq(&command, &same));
        assert_eq!(command.name(), "blep");
    }
}
