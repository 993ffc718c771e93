//! Policy for envelopes addressed to the hub itself.

use serde::{Deserialize, Serialize};

use crate::core::AgentProxy;
use crate::error::{Error, Result};
use crate::protocol::Envelope;

/// What to do with a control-plane message coming from an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlPolicy {
    /// Hand it to the platform through the proxy's inbound queue.
    #[default]
    Deliver,
    /// Answer the agent with an `unsupported_control_message` envelope.
    Reject,
}

#[derive(Debug, Clone, Default)]
pub struct ControlPlane {
    policy: ControlPolicy,
}

impl ControlPlane {
    pub fn new(policy: ControlPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> ControlPolicy {
        self.policy
    }

    /// Handle a hub-addressed envelope read from `proxy`'s connection.
    ///
    /// On error the agent has already been sent a notice; the session goes on.
    pub fn handle_inbound(&self, proxy: &AgentProxy, envelope: Envelope) -> Result<()> {
        if envelope.is_connect() {
            proxy.send(Envelope::unsupported(
                proxy.agent_id(),
                &envelope.command,
                "already registered on this connection",
            ));
            return Err(Error::ProtocolViolation(format!(
                "{} sent a second registration",
                proxy.agent_id()
            )));
        }

        match self.policy {
            ControlPolicy::Deliver => {
                tracing::debug!(
                    agent = %proxy.agent_id(),
                    command = %envelope.command,
                    "Delivering control message to platform"
                );
                proxy.inbound().push(envelope);
                Ok(())
            }
            ControlPolicy::Reject => {
                proxy.send(Envelope::unsupported(
                    proxy.agent_id(),
                    &envelope.command,
                    "the hub does not handle control messages",
                ));
                Err(Error::UnsupportedControlMessage {
                    command: envelope.command,
                    source_id: envelope.source,
                })
            }
        }
    }

    /// Outbound envelopes addressed to the hub are never written to an agent.
    pub fn check_outbound(&self, envelope: &Envelope) -> Result<()> {
        if envelope.is_control() {
            return Err(Error::UnsupportedControlMessage {
                command: envelope.command.clone(),
                source_id: envelope.source.clone(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{MATRIX_ID, UNSUPPORTED_COMMAND};

    #[test]
    fn test_deliver_policy_enqueues() {
        let proxy = AgentProxy::new("a1");
        let plane = ControlPlane::new(ControlPolicy::Deliver);

        plane
            .handle_inbound(&proxy, Envelope::new("a1", MATRIX_ID, "pong"))
            .unwrap();

        assert_eq!(proxy.try_recv().unwrap().command, "pong");
        assert!(proxy.outbound().is_empty());
    }

    #[test]
    fn test_reject_policy_notifies_agent() {
        let proxy = AgentProxy::new("a1");
        let plane = ControlPlane::new(ControlPolicy::Reject);

        let err = plane
            .handle_inbound(&proxy, Envelope::new("a1", MATRIX_ID, "pong"))
            .unwrap_err();

        assert!(matches!(err, Error::UnsupportedControlMessage { ref command, .. } if command == "pong"));
        assert!(proxy.inbound().is_empty());
        let notice = proxy.outbound().try_pop().unwrap();
        assert_eq!(notice.command, UNSUPPORTED_COMMAND);
        assert_eq!(notice.destination, "a1");
        assert_eq!(notice.arg_str("command"), Some("pong"));
    }

    #[test]
    fn test_second_registration_is_violation() {
        let proxy = AgentProxy::new("a1");
        let plane = ControlPlane::default();

        let err = plane.handle_inbound(&proxy, Envelope::connect("a1")).unwrap_err();
        assert!(matches!(err, Error::ProtocolViolation(_)));
        assert!(proxy.inbound().is_empty());
        assert_eq!(proxy.outbound().len(), 1);
    }

    #[test]
    fn test_outbound_to_hub_refused() {
        let plane = ControlPlane::default();
        assert!(plane.check_outbound(&Envelope::new("a2", MATRIX_ID, "status")).is_err());
        assert!(plane.check_outbound(&Envelope::new(MATRIX_ID, "a1", "ping")).is_ok());
    }

    #[test]
    fn test_policy_serde() {
        let policy: ControlPolicy = serde_json::from_str("\"reject\"").unwrap();
        assert_eq!(policy, ControlPolicy::Reject);
    }
}
