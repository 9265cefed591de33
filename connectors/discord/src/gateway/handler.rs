//! Inbound frame routing.
//!
//! Frames are handled one at a time, in the order the socket delivered them.
//! Each frame first advances the handshake, then is routed by opcode.

use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::{
    FrameSink, GatewayOpcode, GatewaySender, Heartbeat, HeartbeatScheduler, HeartbeatTiming,
    Identity, TransportEvent,
    handshake::{self, HandshakeMachine},
};
use crate::{
    dispatch::{DispatchBus, DispatchEventKind},
    types::{GatewayHello, GatewayPayload},
};

/// Close code for connections this client ends on purpose.
const NORMAL_CLOSURE: u16 = 1000;

/// What the connection has seen so far.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionSnapshot {
    /// `s` of the last dispatch that carried one
    pub last_sequence: Option<u64>,
    /// `t` of the last dispatch
    pub last_event: Option<String>,
    pub application_id: Option<String>,
    pub session_id: Option<String>,
    /// Name of the current handshake state
    pub handshake_state: String,
}

/// Connection state shared between the gateway loop and the client.
#[derive(Debug, Default)]
pub struct ConnectionInfo {
    inner: RwLock<ConnectionSnapshot>,
}

impl ConnectionInfo {
    #[must_use]
    pub fn snapshot(&self) -> ConnectionSnapshot {
        self.inner.read().clone()
    }

    #[must_use]
    pub fn application_id(&self) -> Option<String> {
        self.inner.read().application_id.clone()
    }

    fn set_handshake_state(&self, name: &str) {
        name.clone_into(&mut self.inner.write().handshake_state);
    }

    fn record_dispatch(&self, sequence: Option<u64>, event: &str) {
        let mut inner = self.inner.write();
        if sequence.is_some() {
            inner.last_sequence = sequence;
        }
        inner.last_event = Some(event.to_string());
    }

    fn record_ready(&self, data: &Value) {
        let mut inner = self.inner.write();
        if let Some(id) = data.pointer("/application/id").and_then(Value::as_str) {
            inner.application_id = Some(id.to_string());
        }
        if let Some(session) = data.get("session_id").and_then(Value::as_str) {
            inner.session_id = Some(session.to_string());
        }
    }
}

/// Routes inbound frames for one connection.
pub struct GatewayHandler {
    sink: Arc<dyn FrameSink>,
    handshake: HandshakeMachine,
    heartbeat: Arc<Heartbeat>,
    scheduler: Option<HeartbeatScheduler>,
    timing: HeartbeatTiming,
    bus: Arc<DispatchBus>,
    info: Arc<ConnectionInfo>,
}

impl GatewayHandler {
    pub fn new(
        sink: Arc<dyn FrameSink>,
        identity: Identity,
        timing: HeartbeatTiming,
        bus: Arc<DispatchBus>,
        info: Arc<ConnectionInfo>,
    ) -> Self {
        let handshake = handshake::build(GatewaySender::new(Arc::clone(&sink)), identity);
        info.set_handshake_state(handshake.current_name());

        Self {
            heartbeat: Arc::new(Heartbeat::new(Arc::clone(&sink))),
            sink,
            handshake,
            scheduler: None,
            timing,
            bus,
            info,
        }
    }

    #[must_use]
    pub fn heartbeat(&self) -> &Arc<Heartbeat> {
        &self.heartbeat
    }

    #[must_use]
    pub fn handshake_state(&self) -> &str {
        self.handshake.current_name()
    }

    /// Handle one raw frame. Malformed frames are logged and dropped.
    pub fn handle_frame(&mut self, raw: &[u8]) {
        let payload: GatewayPayload = match serde_json::from_slice(raw) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(
                    error = %e,
                    frame = %String::from_utf8_lossy(raw),
                    "Dropping malformed gateway frame"
                );
                return;
            }
        };

        let op = match GatewayOpcode::try_from(payload.op) {
            Ok(op) => op,
            Err(op) => {
                debug!(op, "Unhandled opcode");
                return;
            }
        };

        if self.handshake.transition(Some(op)) {
            self.info.set_handshake_state(self.handshake.current_name());
        }

        match op {
            GatewayOpcode::Hello => self.on_hello(payload.d),
            GatewayOpcode::HeartbeatAck => self.heartbeat.acknowledge(),
            GatewayOpcode::Heartbeat => {
                debug!("Gateway requested a heartbeat");
                if let Err(e) = self.heartbeat.beat() {
                    warn!(error = %e, "Failed to answer heartbeat request");
                }
            }
            GatewayOpcode::InvalidSession => {
                let resumable = payload.d.as_ref().and_then(Value::as_bool).unwrap_or(false);
                error!(resumable, "Closing websocket, this is an invalid session");
                self.shutdown("invalid session");
            }
            GatewayOpcode::Reconnect => {
                warn!("Gateway requested a reconnect, closing");
                self.shutdown("reconnect requested");
            }
            GatewayOpcode::Dispatch => self.on_dispatch(payload),
            other => debug!(op = ?other, "Unhandled opcode"),
        }
    }

    fn on_hello(&mut self, data: Option<Value>) {
        let hello: GatewayHello = match serde_json::from_value(data.unwrap_or_default()) {
            Ok(hello) => hello,
            Err(e) => {
                error!(error = %e, "Malformed Hello payload, closing without heartbeats");
                self.shutdown("malformed hello");
                return;
            }
        };

        debug!(interval_ms = hello.heartbeat_interval, "Gateway heartbeat interval");
        self.scheduler = Some(HeartbeatScheduler::spawn(
            Arc::clone(&self.heartbeat),
            hello.heartbeat_interval,
            self.timing,
        ));
    }

    fn on_dispatch(&self, payload: GatewayPayload) {
        let Some(event) = payload.t else {
            warn!(sequence = ?payload.s, "Dispatch frame without event name");
            return;
        };
        self.info.record_dispatch(payload.s, &event);

        let data = payload.d.unwrap_or_default();
        if event == DispatchEventKind::Ready.tag() {
            self.info.record_ready(&data);
            info!("Gateway ready");
        }

        self.bus.dispatch(&event, data);
    }

    fn shutdown(&mut self, reason: &str) {
        self.scheduler = None;
        self.sink.close(NORMAL_CLOSURE, reason);
    }

    /// Consume transport events until the socket closes.
    pub async fn run(mut self, mut events: mpsc::UnboundedReceiver<TransportEvent>) {
        while let Some(event) = events.recv().await {
            match event {
                TransportEvent::Message { data, is_binary } => {
                    if is_binary {
                        debug!(len = data.len(), "Binary gateway frame");
                    }
                    self.handle_frame(&data);
                }
                TransportEvent::Open => debug!("Gateway transport open"),
                TransportEvent::Ping(_) => debug!("Gateway ping"),
                TransportEvent::Pong(_) => debug!("Gateway pong"),
                TransportEvent::Upgrade { status } => debug!(status, "Gateway upgrade accepted"),
                TransportEvent::UnexpectedResponse { status } => {
                    warn!(status, "Gateway refused the upgrade");
                }
                TransportEvent::Error(e) => error!(error = %e, "Gateway transport error"),
                TransportEvent::Close { code, reason } => {
                    info!(code, reason = %reason, "Gateway connection closed");
                    break;
                }
            }
        }

        self.scheduler = None;
        debug!("Gateway loop finished");
    }
}
