//! Connection handshake as a state machine over received opcodes.
//!
//! ```text
//! connection init --Hello--> hello received --Dispatch--> identified & ready
//! ```
//!
//! Entering "hello received" sends Identify. The other states only log.

use tracing::info;

use super::{GatewayOpcode, GatewaySender, Identity};
use crate::state_machine::{Handler, StateMachine};

pub const CONNECTION_INIT: &str = "connection init";
pub const HELLO_RECEIVED: &str = "hello received";
pub const IDENTIFIED_READY: &str = "identified & ready";

/// Events are received opcodes; `None` is the initial event, before any
/// frame arrived.
pub type HandshakeMachine = StateMachine<Option<GatewayOpcode>>;

/// Build the handshake machine, sitting in "connection init".
pub fn build(sender: GatewaySender, identity: Identity) -> HandshakeMachine {
    let mut machine = StateMachine::new(None, Handler::passive(CONNECTION_INIT));
    let init = machine.initial();

    let hello = machine.add_handler(Handler::new(
        HELLO_RECEIVED,
        move |_, _| {
            info!("Hello event received, identifying now");
            sender.send_identification(&identity.token, &identity.intents, &identity.name)?;
            Ok(())
        },
        |_, _| Ok(()),
    ));

    let ready = machine.add_handler(Handler::new(
        IDENTIFIED_READY,
        |_, _| {
            info!("Identification accepted, gateway is dispatching events");
            Ok(())
        },
        |_, _| Ok(()),
    ));

    machine.register(init, hello, Some(GatewayOpcode::Hello));
    machine.register(hello, ready, Some(GatewayOpcode::Dispatch));
    machine
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{gateway::testing::RecordingSink, intents::GatewayIntent};

    fn identity(intents: Vec<GatewayIntent>) -> Identity {
        Identity {
            token: "abc".into(),
            intents,
            name: "rabscuttle".into(),
        }
    }

    #[test]
    fn hello_then_dispatch_reaches_ready() {
        let sink = Arc::new(RecordingSink::default());
        let mut machine = build(
            GatewaySender::new(sink.clone()),
            identity(vec![GatewayIntent::Guilds]),
        );
        assert_eq!(machine.current_name(), CONNECTION_INIT);
        assert!(sink.frames().is_empty());

        // Dispatch before Hello goes nowhere.
        assert!(!machine.transition(Some(GatewayOpcode::Dispatch)));

        assert!(machine.transition(Some(GatewayOpcode::Hello)));
        assert_eq!(machine.current_name(), HELLO_RECEIVED);
        let frames = sink.frames();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0]["op"], 2);

        assert!(!machine.transition(Some(GatewayOpcode::HeartbeatAck)));
        assert!(machine.transition(Some(GatewayOpcode::Dispatch)));
        assert_eq!(machine.current_name(), IDENTIFIED_READY);

        // Terminal state.
        assert!(!machine.transition(Some(GatewayOpcode::Dispatch)));
        assert_eq!(sink.frames().len(), 1);
    }

    #[test]
    fn failed_identify_still_advances() {
        let sink = Arc::new(RecordingSink::default());
        let mut machine = build(GatewaySender::new(sink.clone()), identity(Vec::new()));

        assert!(machine.transition(Some(GatewayOpcode::Hello)));
        assert_eq!(machine.current_name(), HELLO_RECEIVED);
        assert!(sink.frames().is_empty());
    }
}
