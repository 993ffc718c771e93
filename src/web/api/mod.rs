//! API endpoints module.

pub mod agents;

pub use agents::{decommission_agent, get_agent, list_agents, register_agent, send_to_agent};
