//! Core module - queues, proxies, registry and platform routing.
//!
//! This module contains the platform-facing side of the hub:
//! - In-memory message queues
//! - Agent proxies that outlive their connections
//! - The registry of provisioned agent identities
//! - Agent-to-agent routing of inbound traffic

pub mod proxy;
pub mod queue;
pub mod registry;
pub mod routing;

pub use proxy::{AgentProxy, ConnectionHandle, ProxyStatus};
pub use queue::MessageQueue;
pub use registry::{Registration, Registry};
