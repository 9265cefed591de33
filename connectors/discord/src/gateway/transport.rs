//! WebSocket transport for the gateway.
//!
//! [`Transport::connect`] spawns a task that owns the socket. Everything the
//! socket reports comes back as [`TransportEvent`]s in delivery order;
//! outgoing frames go through a cloneable [`TransportHandle`].

use std::{
    sync::{
        Arc,
        atomic::{AtomicU8, Ordering},
    },
    time::Duration,
};

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::{
    sync::{mpsc, oneshot},
    time::{Instant, sleep_until},
};
use tokio_tungstenite::{
    connect_async,
    tungstenite::{
        Error as WsError,
        protocol::{CloseFrame, Message as WsMessage, frame::coding::CloseCode},
    },
};
use tracing::{debug, error, info, instrument, warn};
use url::Url;

use super::FrameSink;
use crate::{
    error::{DiscordError, DiscordResult},
    telemetry::{SENSITIVE_KEYS, redact_sensitive},
    types::GatewayPayload,
};

/// Close code used when the socket went away without a close frame.
const ABNORMAL_CLOSURE: u16 = 1006;

/// Close code used when a close frame carried no status.
const NO_STATUS: u16 = 1005;

/// How long the peer gets to finish the closing handshake after we sent our
/// close frame.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Socket ready-state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ReadyState {
    Connecting = 0,
    Open = 1,
    Closing = 2,
    Closed = 3,
}

impl ReadyState {
    const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Connecting,
            1 => Self::Open,
            2 => Self::Closing,
            _ => Self::Closed,
        }
    }
}

#[derive(Debug, Default)]
struct SharedState(AtomicU8);

impl SharedState {
    fn get(&self) -> ReadyState {
        ReadyState::from_u8(self.0.load(Ordering::Acquire))
    }

    fn set(&self, state: ReadyState) {
        self.0.store(state as u8, Ordering::Release);
    }
}

/// Where to connect.
#[derive(Debug, Clone)]
pub struct GatewayParams {
    /// Base gateway URL
    pub url: String,

    /// Protocol version, sent as `v`
    pub version: u8,

    /// Extra query parameters; these win over the defaults
    pub query: Vec<(String, String)>,
}

impl GatewayParams {
    #[must_use]
    pub fn new(url: impl Into<String>, version: u8) -> Self {
        Self {
            url: url.into(),
            version,
            query: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// The URL to open: `v` and `encoding=json` merged with the parameters
    /// already on the base URL and the caller overrides, later ones winning.
    pub fn endpoint(&self) -> DiscordResult<Url> {
        let mut url = Url::parse(&self.url)?;

        let mut params: Vec<(String, String)> = vec![
            ("v".into(), self.version.to_string()),
            ("encoding".into(), "json".into()),
        ];
        let overrides: Vec<(String, String)> = url
            .query_pairs()
            .into_owned()
            .chain(self.query.iter().cloned())
            .collect();
        for (key, value) in overrides {
            match params.iter_mut().find(|(k, _)| *k == key) {
                Some(slot) => slot.1 = value,
                None => params.push((key, value)),
            }
        }

        url.query_pairs_mut().clear().extend_pairs(params);
        Ok(url)
    }
}

/// Everything the socket reports, in the order it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The socket is open
    Open,
    /// A data frame
    Message { data: Vec<u8>, is_binary: bool },
    Ping(Vec<u8>),
    Pong(Vec<u8>),
    /// The HTTP upgrade response was accepted
    Upgrade { status: u16 },
    /// The server answered the upgrade request with a plain HTTP response
    UnexpectedResponse { status: u16 },
    Error(String),
    /// Always the last event
    Close { code: u16, reason: String },
}

/// Resolves once the socket is open, or fails with the state it ended in.
#[derive(Debug)]
pub struct ConnectSignal(oneshot::Receiver<DiscordResult<()>>);

impl ConnectSignal {
    pub async fn wait(self) -> DiscordResult<()> {
        self.0.await.unwrap_or(Err(DiscordError::Connect {
            state: ReadyState::Closed,
        }))
    }
}

#[derive(Debug)]
enum Command {
    Send(WsMessage),
    Close { code: u16, reason: String },
}

/// Cloneable handle for writing to the socket.
#[derive(Debug, Clone)]
pub struct TransportHandle {
    commands: mpsc::UnboundedSender<Command>,
    state: Arc<SharedState>,
}

impl TransportHandle {
    #[must_use]
    pub fn ready_state(&self) -> ReadyState {
        self.state.get()
    }

    /// Queue a text frame.
    pub fn send_text(&self, text: String) -> DiscordResult<()> {
        if self.ready_state() != ReadyState::Open {
            return Err(DiscordError::TransportClosed);
        }
        self.commands
            .send(Command::Send(WsMessage::Text(text.into())))
            .map_err(|_| DiscordError::TransportClosed)
    }

    /// Start the closing handshake. Closing twice is a no-op.
    pub fn close(&self, code: u16, reason: impl Into<String>) {
        let reason = reason.into();
        if matches!(self.ready_state(), ReadyState::Closing | ReadyState::Closed) {
            return;
        }
        info!(code, reason = %reason, "Closing gateway connection");
        // A send error means the socket task is already gone.
        let _ = self.commands.send(Command::Close { code, reason });
    }
}

impl FrameSink for TransportHandle {
    fn send_frame(&self, frame: &GatewayPayload) -> DiscordResult<()> {
        let value: Value = serde_json::to_value(frame)?;
        debug!(
            op = frame.op,
            frame = %redact_sensitive(&value, SENSITIVE_KEYS),
            "Sending gateway frame"
        );
        self.send_text(value.to_string())
    }

    fn close(&self, code: u16, reason: &str) {
        Self::close(self, code, reason);
    }
}

/// Gateway socket connector.
pub struct Transport;

impl Transport {
    /// Open the socket in a background task.
    ///
    /// The returned receiver yields every socket event and ends after
    /// [`TransportEvent::Close`]. Nothing is retried.
    #[instrument(skip(params), fields(url = %params.url))]
    pub fn connect(
        params: &GatewayParams,
    ) -> DiscordResult<(
        ConnectSignal,
        TransportHandle,
        mpsc::UnboundedReceiver<TransportEvent>,
    )> {
        let url = params.endpoint()?;
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (ready_tx, ready_rx) = oneshot::channel();
        let state = Arc::new(SharedState::default());

        info!(url = %url, "Connecting to Discord gateway");
        tokio::spawn(run_socket(
            url,
            Arc::clone(&state),
            command_rx,
            event_tx,
            ready_tx,
        ));

        let handle = TransportHandle {
            commands: command_tx,
            state,
        };
        Ok((ConnectSignal(ready_rx), handle, event_rx))
    }
}

fn emit(events: &mpsc::UnboundedSender<TransportEvent>, event: TransportEvent) {
    // Nobody listening is not an error for the socket.
    let _ = events.send(event);
}

async fn run_socket(
    url: Url,
    state: Arc<SharedState>,
    mut commands: mpsc::UnboundedReceiver<Command>,
    events: mpsc::UnboundedSender<TransportEvent>,
    ready: oneshot::Sender<DiscordResult<()>>,
) {
    let (stream, response) = match connect_async(url.as_str()).await {
        Ok(connected) => connected,
        Err(err) => {
            state.set(ReadyState::Closed);
            error!(error = %err, "Failed to connect to gateway");
            if let WsError::Http(response) = &err {
                emit(
                    &events,
                    TransportEvent::UnexpectedResponse {
                        status: response.status().as_u16(),
                    },
                );
            }
            emit(&events, TransportEvent::Error(err.to_string()));
            emit(
                &events,
                TransportEvent::Close {
                    code: ABNORMAL_CLOSURE,
                    reason: String::new(),
                },
            );
            let _ = ready.send(Err(DiscordError::Connect {
                state: state.get(),
            }));
            return;
        }
    };

    state.set(ReadyState::Open);
    emit(
        &events,
        TransportEvent::Upgrade {
            status: response.status().as_u16(),
        },
    );
    emit(&events, TransportEvent::Open);
    let _ = ready.send(Ok(()));
    info!("Gateway socket open");

    let (mut write, mut read) = stream.split();
    let mut commands_open = true;
    let mut close: Option<(u16, String)> = None;
    let mut close_deadline: Option<Instant> = None;

    loop {
        tokio::select! {
            command = commands.recv(), if commands_open => match command {
                Some(Command::Send(message)) => {
                    if let Err(err) = write.send(message).await {
                        error!(error = %err, "Failed to write gateway frame");
                        emit(&events, TransportEvent::Error(err.to_string()));
                        break;
                    }
                }
                Some(Command::Close { code, reason }) => {
                    state.set(ReadyState::Closing);
                    let frame = CloseFrame {
                        code: CloseCode::from(code),
                        reason: reason.into(),
                    };
                    if let Err(err) = write.send(WsMessage::Close(Some(frame))).await {
                        debug!(error = %err, "Close frame not delivered");
                        break;
                    }
                    close_deadline.get_or_insert_with(|| Instant::now() + CLOSE_TIMEOUT);
                }
                None => {
                    // Every handle is gone; nobody can write any more.
                    commands_open = false;
                    if state.get() == ReadyState::Open {
                        state.set(ReadyState::Closing);
                        let _ = write.send(WsMessage::Close(None)).await;
                        close_deadline.get_or_insert_with(|| Instant::now() + CLOSE_TIMEOUT);
                    }
                }
            },

            () = sleep_until(close_deadline.unwrap_or_else(Instant::now)), if close_deadline.is_some() => {
                warn!("Peer did not finish the closing handshake, dropping the socket");
                break;
            }

            message = read.next() => match message {
                Some(Ok(WsMessage::Text(text))) => emit(
                    &events,
                    TransportEvent::Message {
                        data: text.as_bytes().to_vec(),
                        is_binary: false,
                    },
                ),
                Some(Ok(WsMessage::Binary(data))) => emit(
                    &events,
                    TransportEvent::Message {
                        data: data.to_vec(),
                        is_binary: true,
                    },
                ),
                Some(Ok(WsMessage::Ping(data))) => emit(&events, TransportEvent::Ping(data.to_vec())),
                Some(Ok(WsMessage::Pong(data))) => emit(&events, TransportEvent::Pong(data.to_vec())),
                Some(Ok(WsMessage::Close(frame))) => {
                    state.set(ReadyState::Closing);
                    let (code, reason) = frame.map_or((NO_STATUS, String::new()), |f| {
                        (u16::from(f.code), f.reason.as_str().to_owned())
                    });
                    info!(code, reason = %reason, "Gateway sent close frame");
                    close = Some((code, reason));
                }
                Some(Ok(WsMessage::Frame(_))) => {}
                Some(Err(WsError::ConnectionClosed | WsError::AlreadyClosed)) | None => break,
                Some(Err(err)) => {
                    warn!(error = %err, "Gateway socket error");
                    emit(&events, TransportEvent::Error(err.to_string()));
                    break;
                }
            },
        }
    }

    state.set(ReadyState::Closed);
    let (code, reason) = close.unwrap_or((ABNORMAL_CLOSURE, String::new()));
    info!(code, "Gateway socket closed");
    emit(&events, TransportEvent::Close { code, reason });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_carries_default_query() {
        let url = GatewayParams::new("wss://gateway.discord.gg", 10)
            .endpoint()
            .unwrap();
        assert_eq!(url.as_str(), "wss://gateway.discord.gg/?v=10&encoding=json");
    }

    #[test]
    fn overrides_replace_defaults_in_place() {
        let url = GatewayParams::new("wss://gateway.discord.gg/?encoding=etf", 9)
            .with_query("v", "10")
            .with_query("compress", "zlib-stream")
            .endpoint()
            .unwrap();
        assert_eq!(
            url.query(),
            Some("v=10&encoding=etf&compress=zlib-stream")
        );
    }

    #[test]
    fn malformed_url_is_rejected() {
        let err = GatewayParams::new("not a url", 10).endpoint().unwrap_err();
        assert!(matches!(err, DiscordError::Url(_)));
    }

    #[test]
    fn ready_state_round_trips_through_shared_state() {
        let state = SharedState::default();
        assert_eq!(state.get(), ReadyState::Connecting);
        state.set(ReadyState::Closing);
        assert_eq!(state.get(), ReadyState::Closing);
    }

    #[tokio::test]
    async fn refused_connection_rejects_with_closed_state() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let (signal, handle, mut events) =
            Transport::connect(&GatewayParams::new(format!("ws://{addr}"), 10)).unwrap();

        let err = signal.wait().await.unwrap_err();
        assert!(matches!(
            err,
            DiscordError::Connect {
                state: ReadyState::Closed
            }
        ));
        assert_eq!(handle.ready_state(), ReadyState::Closed);
        assert!(matches!(
            handle.send_text("{}".into()),
            Err(DiscordError::TransportClosed)
        ));

        let mut last = None;
        while let Some(event) = events.recv().await {
            last = Some(event);
        }
        assert!(matches!(last, Some(TransportEvent::Close { code: 1006, .. })));
    }

    #[tokio::test]
    async fn close_gives_up_on_a_peer_that_keeps_the_socket() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (release_tx, release_rx) = oneshot::channel::<()>();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            while let Some(Ok(msg)) = ws.next().await {
                if msg.is_close() {
                    break;
                }
            }
            let _ = ws.flush().await;
            // Hold the TCP connection open until the test is done.
            let _ = release_rx.await;
            drop(ws);
        });

        let (signal, handle, mut events) =
            Transport::connect(&GatewayParams::new(format!("ws://{addr}"), 10)).unwrap();
        signal.wait().await.unwrap();
        handle.close(1000, "done");

        let last = tokio::time::timeout(CLOSE_TIMEOUT * 3, async {
            let mut last = None;
            while let Some(event) = events.recv().await {
                last = Some(event);
            }
            last
        })
        .await
        .expect("transport never finished closing");

        assert!(matches!(last, Some(TransportEvent::Close { .. })));
        assert_eq!(handle.ready_state(), ReadyState::Closed);

        let _ = release_tx.send(());
        server.await.unwrap();
    }
}
