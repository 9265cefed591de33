//! Rabscuttle Discord client
//!
//! A bot-side client for the Discord Gateway and REST API:
//! - Gateway WebSocket connection with heartbeats and the identify handshake
//! - Typed dispatch events fanned out to any number of subscribers
//! - Slash commands, autocomplete, components and modal submits as
//!   interaction objects that know how to answer themselves
//! - Command registration and interaction callbacks over REST

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod api;
mod client;
mod config;
pub mod dispatch;
mod error;
pub mod gateway;
pub mod intents;
pub mod interaction;
pub mod state_machine;
pub mod telemetry;
pub mod types;

pub use api::{Authorization, DiscordApiClient, RestError, RestResult, UnregisterSummary};
pub use client::DiscordClient;
pub use config::DiscordConfig;
pub use dispatch::{DispatchBus, DispatchEventKind};
pub use error::{DiscordError, DiscordResult};
pub use gateway::{ConnectionSnapshot, GatewayOpcode, ReadyState};
pub use intents::GatewayIntent;
pub use interaction::{
    AutocompleteInteraction, CommandInteraction, ComponentInteraction, Interaction,
    InteractionBus, ModalSubmitInteraction, PingInteraction,
};
pub use telemetry::{LoggingConfig, init_logging};
