//! Discord REST API client.
//!
//! Every call declares the statuses it expects. A response with one of them
//! is a [`RestResult::Success`]; anything else is a [`RestResult::Failure`]
//! carrying the platform's error body. Only network-level problems are
//! `Err`, and nothing is retried here.

use reqwest::{
    Client, Method,
    header::{AUTHORIZATION, CONTENT_TYPE},
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tracing::{debug, error, info, instrument, warn};

use crate::{
    config::DiscordConfig,
    error::DiscordResult,
    types::{
        ApplicationCommand, CommandDefinition, CommandOptionChoice, InteractionResponse, Message,
        MessagePayload,
    },
};

/// Credential attached as the `Authorization` header.
#[derive(Clone)]
pub enum Authorization {
    /// `Bot {token}`
    Bot(String),
    /// `Bearer {token}`, for user-scoped OAuth2 calls
    Bearer(String),
}

impl Authorization {
    fn header_value(&self) -> String {
        match self {
            Self::Bot(token) => format!("Bot {token}"),
            Self::Bearer(token) => format!("Bearer {token}"),
        }
    }
}

impl std::fmt::Debug for Authorization {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bot(_) => f.write_str("Bot([REDACTED])"),
            Self::Bearer(_) => f.write_str("Bearer([REDACTED])"),
        }
    }
}

/// Error body returned by the platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestError {
    /// HTTP status of the response
    #[serde(skip)]
    pub status: u16,

    /// Discord JSON error code
    #[serde(default)]
    pub code: i64,

    #[serde(default)]
    pub message: String,

    /// Per-field validation errors
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<serde_json::Value>,
}

impl RestError {
    fn from_body(status: u16, bytes: &[u8]) -> Self {
        serde_json::from_slice::<Self>(bytes).map_or_else(
            |_| Self {
                status,
                code: i64::from(status),
                message: String::from_utf8_lossy(bytes).into_owned(),
                errors: None,
            },
            |body| Self { status, ..body },
        )
    }
}

impl std::fmt::Display for RestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (code {}, status {})", self.message, self.code, self.status)
    }
}

/// Outcome of a REST call that got a response.
#[must_use = "a REST failure is returned, not raised"]
#[derive(Debug, Clone, PartialEq)]
pub enum RestResult<T> {
    Success(T),
    Failure(RestError),
}

impl<T> RestResult<T> {
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// The payload, dropping any failure.
    pub fn success(self) -> Option<T> {
        match self {
            Self::Success(value) => Some(value),
            Self::Failure(_) => None,
        }
    }

    pub fn into_result(self) -> Result<T, RestError> {
        match self {
            Self::Success(value) => Ok(value),
            Self::Failure(err) => Err(err),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> RestResult<U> {
        match self {
            Self::Success(value) => RestResult::Success(f(value)),
            Self::Failure(err) => RestResult::Failure(err),
        }
    }
}

/// Outcome of [`DiscordApiClient::unregister_all_commands`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnregisterSummary {
    pub global: bool,
    pub guilds_cleared: usize,
    pub guild_failures: usize,
}

/// GET, HEAD and DELETE carry no body.
fn has_body(method: &Method) -> bool {
    !matches!(*method, Method::GET | Method::HEAD | Method::DELETE)
}

/// Discord REST API client.
#[derive(Debug, Clone)]
pub struct DiscordApiClient {
    client: Client,
    base_url: String,
    auth: Authorization,
}

impl DiscordApiClient {
    /// Create a new API client from configuration.
    pub fn new(config: &DiscordConfig) -> DiscordResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(format!(
                "DiscordBot ({}, {})",
                env!("CARGO_PKG_REPOSITORY"),
                env!("CARGO_PKG_VERSION")
            ))
            .build()?;

        Ok(Self {
            client,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            auth: Authorization::Bot(config.token().to_string()),
        })
    }

    async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&B>,
        auth: Option<&Authorization>,
    ) -> DiscordResult<(u16, Vec<u8>)> {
        let url = format!("{}{}", self.base_url, endpoint);
        let mut request = self.client.request(method.clone(), &url);

        if let Some(auth) = auth {
            request = request.header(AUTHORIZATION, auth.header_value());
        }
        if has_body(&method) {
            request = request.header(CONTENT_TYPE, "application/json");
            if let Some(body) = body {
                request = request.body(serde_json::to_vec(body)?);
            }
        } else if body.is_some() {
            warn!(%method, "Dropping body of bodyless request");
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let bytes = response.bytes().await?.to_vec();
        debug!(%method, status, "Discord API response");
        Ok((status, bytes))
    }

    /// Call an endpoint that answers with a JSON body.
    pub async fn request_json<T, B>(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&B>,
        auth: Option<&Authorization>,
        expected: &[u16],
    ) -> DiscordResult<RestResult<T>>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let (status, bytes) = self.send(method, endpoint, body, auth).await?;
        if expected.contains(&status) {
            Ok(RestResult::Success(serde_json::from_slice(&bytes)?))
        } else {
            Ok(RestResult::Failure(RestError::from_body(status, &bytes)))
        }
    }

    /// Call an endpoint whose success response has no body worth reading.
    pub async fn request_empty<B>(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&B>,
        auth: Option<&Authorization>,
        expected: &[u16],
    ) -> DiscordResult<RestResult<()>>
    where
        B: Serialize + ?Sized,
    {
        let (status, bytes) = self.send(method, endpoint, body, auth).await?;
        if expected.contains(&status) {
            Ok(RestResult::Success(()))
        } else {
            Ok(RestResult::Failure(RestError::from_body(status, &bytes)))
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Application commands
    // ─────────────────────────────────────────────────────────────────────────

    fn commands_route(application_id: &str, guild_id: Option<&str>) -> String {
        guild_id.map_or_else(
            || format!("/applications/{application_id}/commands"),
            |guild_id| format!("/applications/{application_id}/guilds/{guild_id}/commands"),
        )
    }

    /// Create or update a command, globally or in one guild.
    #[instrument(skip(self, definition), fields(command = %definition.name))]
    pub async fn register_command(
        &self,
        application_id: &str,
        guild_id: Option<&str>,
        definition: &CommandDefinition,
    ) -> DiscordResult<RestResult<ApplicationCommand>> {
        let result: RestResult<ApplicationCommand> = self
            .request_json(
                Method::POST,
                &Self::commands_route(application_id, guild_id),
                Some(definition),
                Some(&self.auth),
                &[200, 201],
            )
            .await?;

        match &result {
            RestResult::Success(command) => {
                debug!(id = %command.id, version = %command.version, "Registered command");
            }
            RestResult::Failure(err) => debug!(error = %err, "Command registration failed"),
        }
        Ok(result)
    }

    /// Replace every command in scope with `definitions`.
    #[instrument(skip(self, definitions), fields(count = definitions.len()))]
    pub async fn bulk_overwrite_commands(
        &self,
        application_id: &str,
        guild_id: Option<&str>,
        definitions: &[CommandDefinition],
    ) -> DiscordResult<RestResult<Vec<ApplicationCommand>>> {
        self.request_json(
            Method::PUT,
            &Self::commands_route(application_id, guild_id),
            Some(definitions),
            Some(&self.auth),
            &[200],
        )
        .await
    }

    /// Remove all global commands and all commands of `guild_ids`.
    ///
    /// Keeps going past failures; network errors count as failures too.
    #[instrument(skip(self, guild_ids), fields(guilds = guild_ids.len()))]
    pub async fn unregister_all_commands(
        &self,
        application_id: &str,
        guild_ids: &[String],
    ) -> UnregisterSummary {
        let mut summary = UnregisterSummary::default();

        match self.bulk_overwrite_commands(application_id, None, &[]).await {
            Ok(RestResult::Success(_)) => summary.global = true,
            Ok(RestResult::Failure(err)) => error!(error = %err, "Global command deletion failed"),
            Err(e) => error!(error = %e, "Global command deletion failed"),
        }

        for guild_id in guild_ids {
            match self
                .bulk_overwrite_commands(application_id, Some(guild_id), &[])
                .await
            {
                Ok(RestResult::Success(_)) => summary.guilds_cleared += 1,
                Ok(RestResult::Failure(err)) => {
                    error!(guild_id = %guild_id, error = %err, "Guild command deletion failed");
                    summary.guild_failures += 1;
                }
                Err(e) => {
                    error!(guild_id = %guild_id, error = %e, "Guild command deletion failed");
                    summary.guild_failures += 1;
                }
            }
        }

        info!(
            global = summary.global,
            guilds_cleared = summary.guilds_cleared,
            guild_failures = summary.guild_failures,
            "Unregistered commands"
        );
        summary
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Interaction responses
    //
    // Callbacks are keyed by interaction id and token, follow-ups by
    // application id and token. The token expires after 15 minutes; calls
    // after that come back as failures.
    // ─────────────────────────────────────────────────────────────────────────

    /// Respond to an interaction.
    #[instrument(skip(self, token, response), fields(kind = response.kind))]
    pub async fn create_interaction_response(
        &self,
        interaction_id: &str,
        token: &str,
        response: &InteractionResponse,
    ) -> DiscordResult<RestResult<()>> {
        self.request_empty(
            Method::POST,
            &format!("/interactions/{interaction_id}/{token}/callback"),
            Some(response),
            Some(&self.auth),
            &[204],
        )
        .await
    }

    /// Acknowledge now, answer later with [`Self::edit_original_response`].
    pub async fn defer_interaction_response(
        &self,
        interaction_id: &str,
        token: &str,
        flags: Option<u64>,
    ) -> DiscordResult<RestResult<()>> {
        self.create_interaction_response(interaction_id, token, &InteractionResponse::deferred(flags))
            .await
    }

    /// Answer an autocomplete request.
    pub async fn autocomplete_response(
        &self,
        interaction_id: &str,
        token: &str,
        choices: Vec<CommandOptionChoice>,
    ) -> DiscordResult<RestResult<()>> {
        self.create_interaction_response(
            interaction_id,
            token,
            &InteractionResponse::autocomplete(choices),
        )
        .await
    }

    fn webhook_message_route(application_id: &str, token: &str, message_id: &str) -> String {
        format!("/webhooks/{application_id}/{token}/messages/{message_id}")
    }

    /// Fetch a response message; `message_id` is `@original` for the
    /// initial response.
    #[instrument(skip(self, token))]
    pub async fn fetch_followup(
        &self,
        application_id: &str,
        token: &str,
        message_id: &str,
    ) -> DiscordResult<RestResult<Message>> {
        self.request_json(
            Method::GET,
            &Self::webhook_message_route(application_id, token, message_id),
            None::<&()>,
            Some(&self.auth),
            &[200],
        )
        .await
    }

    /// Edit a response message.
    #[instrument(skip(self, token, payload))]
    pub async fn edit_followup(
        &self,
        application_id: &str,
        token: &str,
        message_id: &str,
        payload: &MessagePayload,
    ) -> DiscordResult<RestResult<Message>> {
        self.request_json(
            Method::PATCH,
            &Self::webhook_message_route(application_id, token, message_id),
            Some(payload),
            Some(&self.auth),
            &[200],
        )
        .await
    }

    /// Delete a response message.
    #[instrument(skip(self, token))]
    pub async fn delete_followup(
        &self,
        application_id: &str,
        token: &str,
        message_id: &str,
    ) -> DiscordResult<RestResult<()>> {
        self.request_empty(
            Method::DELETE,
            &Self::webhook_message_route(application_id, token, message_id),
            None::<&()>,
            Some(&self.auth),
            &[204],
        )
        .await
    }

    pub async fn edit_original_response(
        &self,
        application_id: &str,
        token: &str,
        payload: &MessagePayload,
    ) -> DiscordResult<RestResult<Message>> {
        self.edit_followup(application_id, token, "@original", payload)
            .await
    }

    pub async fn delete_original_response(
        &self,
        application_id: &str,
        token: &str,
    ) -> DiscordResult<RestResult<()>> {
        self.delete_followup(application_id, token, "@original").await
    }

    /// Send an additional message for an interaction.
    #[instrument(skip(self, token, payload))]
    pub async fn create_followup(
        &self,
        application_id: &str,
        token: &str,
        payload: &MessagePayload,
    ) -> DiscordResult<RestResult<Message>> {
        self.request_json(
            Method::POST,
            &format!("/webhooks/{application_id}/{token}"),
            Some(payload),
            Some(&self.auth),
            &[200, 201],
        )
        .await
    }
}
