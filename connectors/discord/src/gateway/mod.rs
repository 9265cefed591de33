//! Discord Gateway (WebSocket) client.
//!
//! Layers, bottom up: the [`transport`] owns the socket, the [`heartbeat`]
//! keeps it alive, the [`sender`] writes protocol frames, the [`handshake`]
//! state machine follows connection progress and the [`handler`] routes each
//! inbound frame.

pub mod handler;
pub mod handshake;
pub mod heartbeat;
pub mod sender;
pub mod transport;

pub use handler::{ConnectionInfo, ConnectionSnapshot, GatewayHandler};
pub use heartbeat::{Heartbeat, HeartbeatScheduler, HeartbeatTiming};
pub use sender::{GatewaySender, Identity};
pub use transport::{
    ConnectSignal, GatewayParams, ReadyState, Transport, TransportEvent, TransportHandle,
};

use crate::{error::DiscordResult, types::GatewayPayload};

/// Discord Gateway opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum GatewayOpcode {
    /// Receive: An event was dispatched.
    Dispatch = 0,
    /// Send/Receive: Keep the connection alive.
    Heartbeat = 1,
    /// Send: Starts a new session.
    Identify = 2,
    /// Send: Update presence.
    PresenceUpdate = 3,
    /// Send: Join/leave or move between voice channels.
    VoiceStateUpdate = 4,
    /// Send: Resume a previous session.
    Resume = 6,
    /// Receive: Reconnect to the gateway.
    Reconnect = 7,
    /// Send: Request guild members.
    RequestGuildMembers = 8,
    /// Receive: Session invalidated.
    InvalidSession = 9,
    /// Receive: Sent after connecting.
    Hello = 10,
    /// Receive: Heartbeat acknowledged.
    HeartbeatAck = 11,
}

impl TryFrom<i32> for GatewayOpcode {
    type Error = i32;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Dispatch),
            1 => Ok(Self::Heartbeat),
            2 => Ok(Self::Identify),
            3 => Ok(Self::PresenceUpdate),
            4 => Ok(Self::VoiceStateUpdate),
            6 => Ok(Self::Resume),
            7 => Ok(Self::Reconnect),
            8 => Ok(Self::RequestGuildMembers),
            9 => Ok(Self::InvalidSession),
            10 => Ok(Self::Hello),
            11 => Ok(Self::HeartbeatAck),
            other => Err(other),
        }
    }
}

/// Anything that can put a gateway frame on the wire.
///
/// Implemented by [`TransportHandle`]; tests substitute a recorder.
pub trait FrameSink: Send + Sync {
    fn send_frame(&self, frame: &GatewayPayload) -> DiscordResult<()>;

    /// Start closing the connection. Later sends fail.
    fn close(&self, code: u16, reason: &str);
}

impl GatewayPayload {
    /// An outgoing frame carrying `d`.
    #[must_use]
    pub fn outgoing(op: GatewayOpcode, d: serde_json::Value) -> Self {
        Self {
            op: op as i32,
            d: Some(d),
            s: None,
            t: None,
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opcodes_round_trip_through_i32() {
        for op in [
            GatewayOpcode::Dispatch,
            GatewayOpcode::Heartbeat,
            GatewayOpcode::InvalidSession,
            GatewayOpcode::Hello,
            GatewayOpcode::HeartbeatAck,
        ] {
            assert_eq!(GatewayOpcode::try_from(op as i32), Ok(op));
        }
        assert_eq!(GatewayOpcode::try_from(5), Err(5));
    }
}
