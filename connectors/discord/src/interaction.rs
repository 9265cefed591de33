//! Typed interactions.
//!
//! [`InteractionClassifier::classify`] is the only way to obtain an
//! [`Interaction`]. Commands and autocomplete requests come with response
//! actions bound to their own id and token; components, modals and pings
//! carry their payload only.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::{
    api::{DiscordApiClient, RestResult},
    error::DiscordResult,
    types::{
        CommandData, CommandOptionChoice, ComponentData, InteractionResponse, InteractionType,
        Message, MessagePayload, ModalSubmitData, RawInteraction,
    },
};

/// REST actions scoped to one interaction.
#[derive(Debug, Clone)]
struct Responder {
    api: Arc<DiscordApiClient>,
    interaction_id: String,
    application_id: String,
    token: String,
}

impl Responder {
    fn new(api: &Arc<DiscordApiClient>, raw: &RawInteraction) -> Self {
        Self {
            api: Arc::clone(api),
            interaction_id: raw.id.clone(),
            application_id: raw.application_id.clone(),
            token: raw.token.clone(),
        }
    }

    async fn respond(&self, response: &InteractionResponse) -> DiscordResult<RestResult<()>> {
        self.api
            .create_interaction_response(&self.interaction_id, &self.token, response)
            .await
    }
}

/// A slash or context menu command invocation.
#[derive(Debug)]
pub struct CommandInteraction {
    raw: RawInteraction,
    data: CommandData,
    responder: Responder,
}

impl CommandInteraction {
    #[must_use]
    pub const fn raw(&self) -> &RawInteraction {
        &self.raw
    }

    #[must_use]
    pub const fn data(&self) -> &CommandData {
        &self.data
    }

    /// Command name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.data.name
    }

    /// Acknowledge now and show a loading state; [`Self::edit`] fills it in.
    pub async fn defer(&self, flags: Option<u64>) -> DiscordResult<RestResult<()>> {
        let r = &self.responder;
        r.api
            .defer_interaction_response(&r.interaction_id, &r.token, flags)
            .await
    }

    /// Answer with a message.
    pub async fn reply(&self, payload: &MessagePayload) -> DiscordResult<RestResult<()>> {
        self.responder
            .respond(&InteractionResponse::message(payload.clone()))
            .await
    }

    /// Edit the original response.
    pub async fn edit(&self, payload: &MessagePayload) -> DiscordResult<RestResult<Message>> {
        let r = &self.responder;
        r.api
            .edit_original_response(&r.application_id, &r.token, payload)
            .await
    }

    /// Delete the original response.
    pub async fn delete(&self) -> DiscordResult<RestResult<()>> {
        let r = &self.responder;
        r.api
            .delete_original_response(&r.application_id, &r.token)
            .await
    }

    /// Send another message after the initial response.
    pub async fn follow_up(&self, payload: &MessagePayload) -> DiscordResult<RestResult<Message>> {
        let r = &self.responder;
        r.api
            .create_followup(&r.application_id, &r.token, payload)
            .await
    }

    pub async fn edit_follow_up(
        &self,
        message_id: &str,
        payload: &MessagePayload,
    ) -> DiscordResult<RestResult<Message>> {
        let r = &self.responder;
        r.api
            .edit_followup(&r.application_id, &r.token, message_id, payload)
            .await
    }

    pub async fn delete_follow_up(&self, message_id: &str) -> DiscordResult<RestResult<()>> {
        let r = &self.responder;
        r.api
            .delete_followup(&r.application_id, &r.token, message_id)
            .await
    }

    pub async fn fetch_follow_up(&self, message_id: &str) -> DiscordResult<RestResult<Message>> {
        let r = &self.responder;
        r.api
            .fetch_followup(&r.application_id, &r.token, message_id)
            .await
    }
}

/// The user is typing into an option with autocomplete.
#[derive(Debug)]
pub struct AutocompleteInteraction {
    raw: RawInteraction,
    data: CommandData,
    responder: Responder,
}

impl AutocompleteInteraction {
    #[must_use]
    pub const fn raw(&self) -> &RawInteraction {
        &self.raw
    }

    #[must_use]
    pub const fn data(&self) -> &CommandData {
        &self.data
    }

    /// Offer suggestions, at most 25.
    pub async fn reply(&self, choices: Vec<CommandOptionChoice>) -> DiscordResult<RestResult<()>> {
        let r = &self.responder;
        r.api
            .autocomplete_response(&r.interaction_id, &r.token, choices)
            .await
    }
}

/// A button press or select menu choice.
#[derive(Debug)]
pub struct ComponentInteraction {
    raw: RawInteraction,
    data: ComponentData,
}

impl ComponentInteraction {
    #[must_use]
    pub const fn raw(&self) -> &RawInteraction {
        &self.raw
    }

    #[must_use]
    pub const fn data(&self) -> &ComponentData {
        &self.data
    }
}

/// A submitted modal.
#[derive(Debug)]
pub struct ModalSubmitInteraction {
    raw: RawInteraction,
    data: ModalSubmitData,
}

impl ModalSubmitInteraction {
    #[must_use]
    pub const fn raw(&self) -> &RawInteraction {
        &self.raw
    }

    #[must_use]
    pub const fn data(&self) -> &ModalSubmitData {
        &self.data
    }
}

/// Connectivity check.
#[derive(Debug)]
pub struct PingInteraction {
    raw: RawInteraction,
}

impl PingInteraction {
    #[must_use]
    pub const fn raw(&self) -> &RawInteraction {
        &self.raw
    }
}

/// A classified interaction. Cloning shares the underlying value.
#[derive(Debug, Clone)]
pub enum Interaction {
    Command(Arc<CommandInteraction>),
    Autocomplete(Arc<AutocompleteInteraction>),
    Component(Arc<ComponentInteraction>),
    ModalSubmit(Arc<ModalSubmitInteraction>),
    Ping(Arc<PingInteraction>),
}

impl Interaction {
    #[must_use]
    pub fn raw(&self) -> &RawInteraction {
        match self {
            Self::Command(i) => i.raw(),
            Self::Autocomplete(i) => i.raw(),
            Self::Component(i) => i.raw(),
            Self::ModalSubmit(i) => i.raw(),
            Self::Ping(i) => i.raw(),
        }
    }

    #[must_use]
    pub const fn kind(&self) -> InteractionType {
        match self {
            Self::Command(_) => InteractionType::ApplicationCommand,
            Self::Autocomplete(_) => InteractionType::ApplicationCommandAutocomplete,
            Self::Component(_) => InteractionType::MessageComponent,
            Self::ModalSubmit(_) => InteractionType::ModalSubmit,
            Self::Ping(_) => InteractionType::Ping,
        }
    }
}

/// Turns raw interactions into typed ones.
#[derive(Debug, Clone)]
pub struct InteractionClassifier {
    api: Arc<DiscordApiClient>,
}

fn decode_data<T: DeserializeOwned>(raw: &RawInteraction) -> Option<T> {
    let data = raw.data.clone().unwrap_or_default();
    match serde_json::from_value(data) {
        Ok(data) => Some(data),
        Err(e) => {
            warn!(interaction_id = %raw.id, kind = raw.kind, error = %e, "Malformed interaction data");
            None
        }
    }
}

impl InteractionClassifier {
    pub const fn new(api: Arc<DiscordApiClient>) -> Self {
        Self { api }
    }

    /// `None` for unknown interaction types and for payloads whose data does
    /// not match their type.
    #[must_use]
    pub fn classify(&self, raw: RawInteraction) -> Option<Interaction> {
        let kind = match InteractionType::try_from(raw.kind) {
            Ok(kind) => kind,
            Err(unknown) => {
                warn!(interaction_id = %raw.id, kind = unknown, "Unhandled interaction type");
                return None;
            }
        };

        let interaction = match kind {
            InteractionType::ApplicationCommand => {
                let data = decode_data(&raw)?;
                let responder = Responder::new(&self.api, &raw);
                Interaction::Command(Arc::new(CommandInteraction {
                    raw,
                    data,
                    responder,
                }))
            }
            InteractionType::ApplicationCommandAutocomplete => {
                let data = decode_data(&raw)?;
                let responder = Responder::new(&self.api, &raw);
                Interaction::Autocomplete(Arc::new(AutocompleteInteraction {
                    raw,
                    data,
                    responder,
                }))
            }
            InteractionType::MessageComponent => {
                let data = decode_data(&raw)?;
                Interaction::Component(Arc::new(ComponentInteraction { raw, data }))
            }
            InteractionType::ModalSubmit => {
                let data = decode_data(&raw)?;
                Interaction::ModalSubmit(Arc::new(ModalSubmitInteraction { raw, data }))
            }
            InteractionType::Ping => Interaction::Ping(Arc::new(PingInteraction { raw })),
        };

        debug!(interaction_id = %interaction.raw().id, kind = ?kind, "Classified interaction");
        Some(interaction)
    }
}

/// One stream per interaction type plus a catch-all.
#[derive(Debug)]
pub struct InteractionBus {
    any: broadcast::Sender<Interaction>,
    command: broadcast::Sender<Arc<CommandInteraction>>,
    autocomplete: broadcast::Sender<Arc<AutocompleteInteraction>>,
    component: broadcast::Sender<Arc<ComponentInteraction>>,
    modal_submit: broadcast::Sender<Arc<ModalSubmitInteraction>>,
    ping: broadcast::Sender<Arc<PingInteraction>>,
}

impl InteractionBus {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            any: broadcast::channel(capacity).0,
            command: broadcast::channel(capacity).0,
            autocomplete: broadcast::channel(capacity).0,
            component: broadcast::channel(capacity).0,
            modal_submit: broadcast::channel(capacity).0,
            ping: broadcast::channel(capacity).0,
        }
    }

    /// Emit on the type's own stream, then on the catch-all stream. Both
    /// carry the same allocation.
    pub fn publish(&self, interaction: &Interaction) {
        // A send error only means there are no subscribers right now.
        match interaction {
            Interaction::Command(i) => {
                let _ = self.command.send(Arc::clone(i));
            }
            Interaction::Autocomplete(i) => {
                let _ = self.autocomplete.send(Arc::clone(i));
            }
            Interaction::Component(i) => {
                let _ = self.component.send(Arc::clone(i));
            }
            Interaction::ModalSubmit(i) => {
                let _ = self.modal_submit.send(Arc::clone(i));
            }
            Interaction::Ping(i) => {
                let _ = self.ping.send(Arc::clone(i));
            }
        }
        let _ = self.any.send(interaction.clone());
    }

    #[must_use]
    pub fn subscribe_any(&self) -> broadcast::Receiver<Interaction> {
        self.any.subscribe()
    }

    #[must_use]
    pub fn subscribe_commands(&self) -> broadcast::Receiver<Arc<CommandInteraction>> {
        self.command.subscribe()
    }

    #[must_use]
    pub fn subscribe_autocomplete(&self) -> broadcast::Receiver<Arc<AutocompleteInteraction>> {
        self.autocomplete.subscribe()
    }

    #[must_use]
    pub fn subscribe_components(&self) -> broadcast::Receiver<Arc<ComponentInteraction>> {
        self.component.subscribe()
    }

    #[must_use]
    pub fn subscribe_modal_submits(&self) -> broadcast::Receiver<Arc<ModalSubmitInteraction>> {
        self.modal_submit.subscribe()
    }

    #[must_use]
    pub fn subscribe_pings(&self) -> broadcast::Receiver<Arc<PingInteraction>> {
        self.ping.subscribe()
    }
}
