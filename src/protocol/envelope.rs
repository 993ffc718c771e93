//! Message envelope exchanged between agents, the hub and the platform.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Identity of the hub itself. Envelopes addressed here are control-plane messages.
pub const MATRIX_ID: &str = "matrix";

/// Command an agent sends as its first frame to claim an identity.
pub const CONNECT_COMMAND: &str = "connect_to_matrix";

/// Command used by the hub to report a rejected control message back to an agent.
pub const UNSUPPORTED_COMMAND: &str = "unsupported_control_message";

/// Routing header plus payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Sender agent ID (or `matrix`)
    #[serde(rename = "src")]
    pub source: String,
    /// Recipient agent ID (or `matrix`)
    #[serde(rename = "dst")]
    pub destination: String,
    /// Operation tag
    pub command: String,
    /// Free-form keyword arguments
    #[serde(default, rename = "kwargs")]
    pub arguments: Map<String, Value>,
}

impl Envelope {
    /// Create an envelope with no arguments.
    pub fn new(
        source: impl Into<String>,
        destination: impl Into<String>,
        command: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
            command: command.into(),
            arguments: Map::new(),
        }
    }

    /// Registration request for `agent_id`.
    pub fn connect(agent_id: impl Into<String>) -> Self {
        let agent_id = agent_id.into();
        Self::new(agent_id.clone(), MATRIX_ID, CONNECT_COMMAND).with_arg("agent_id", agent_id)
    }

    /// Error notice sent from the hub to an agent.
    pub fn unsupported(to_agent: impl Into<String>, command: &str, reason: &str) -> Self {
        Self::new(MATRIX_ID, to_agent, UNSUPPORTED_COMMAND)
            .with_arg("command", command)
            .with_arg("reason", reason)
    }

    /// Add an argument.
    pub fn with_arg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.arguments.insert(key.into(), value.into());
        self
    }

    /// Look up a string argument.
    pub fn arg_str(&self, key: &str) -> Option<&str> {
        self.arguments.get(key).and_then(Value::as_str)
    }

    /// Whether this envelope is addressed to the hub itself.
    pub fn is_control(&self) -> bool {
        self.destination == MATRIX_ID
    }

    /// Whether this envelope is a registration request.
    pub fn is_connect(&self) -> bool {
        self.is_control() && self.command == CONNECT_COMMAND
    }
}
