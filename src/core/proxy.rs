//! In-process representative of a remote agent.
//!
//! A proxy exists for as long as its identity is registered. Connections come
//! and go; the queues stay, so work pushed while the agent is offline is
//! delivered when it reconnects.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use super::queue::MessageQueue;
use crate::protocol::Envelope;

/// The live transport binding of a proxy.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    pub session_id: String,
    pub peer: Option<String>,
    pub connected_at: DateTime<Utc>,
    cancel: CancellationToken,
}

impl ConnectionHandle {
    pub fn new(session_id: impl Into<String>, peer: Option<String>, cancel: CancellationToken) -> Self {
        Self {
            session_id: session_id.into(),
            peer,
            connected_at: Utc::now(),
            cancel,
        }
    }

    /// Mint a fresh session id.
    pub fn new_session_id() -> String {
        uuid::Uuid::new_v4().simple().to_string()
    }

    /// Signal the relay that owns this connection to shut down.
    pub fn close(&self) {
        self.cancel.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }
}

/// Serializable view of a proxy.
#[derive(Debug, Clone, Serialize)]
pub struct ProxyStatus {
    pub agent_id: String,
    pub connected: bool,
    pub session_id: Option<String>,
    pub peer: Option<String>,
    pub connected_at: Option<DateTime<Utc>>,
    pub outbound_pending: usize,
    pub inbound_pending: usize,
    pub sent: u64,
    pub received: u64,
    pub rejected: u64,
}

#[derive(Debug)]
pub struct AgentProxy {
    agent_id: String,
    connection: Mutex<Option<ConnectionHandle>>,
    outbound: MessageQueue,
    inbound: MessageQueue,
    // Held by the relay for the lifetime of a connection so that only one
    // relay reads the outbound queue at a time.
    relay_lease: tokio::sync::Mutex<()>,
    sent: AtomicU64,
    received: AtomicU64,
    rejected: AtomicU64,
}

impl AgentProxy {
    pub fn new(agent_id: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            connection: Mutex::new(None),
            outbound: MessageQueue::new(),
            inbound: MessageQueue::new(),
            relay_lease: tokio::sync::Mutex::new(()),
            sent: AtomicU64::new(0),
            received: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
        }
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    /// Queue a message for the agent. Never blocks, works while disconnected.
    pub fn send(&self, envelope: Envelope) {
        self.outbound.push(envelope);
    }

    /// Wait for the next message from the agent.
    pub async fn recv(&self) -> Envelope {
        self.inbound.pop().await
    }

    pub fn try_recv(&self) -> Option<Envelope> {
        self.inbound.try_pop()
    }

    /// Platform → agent queue.
    pub fn outbound(&self) -> &MessageQueue {
        &self.outbound
    }

    /// Agent → platform queue.
    pub fn inbound(&self) -> &MessageQueue {
        &self.inbound
    }

    pub fn is_connected(&self) -> bool {
        self.connection().is_some()
    }

    pub fn session_id(&self) -> Option<String> {
        self.connection().as_ref().map(|c| c.session_id.clone())
    }

    /// Install a new connection, closing the one it replaces.
    pub(crate) fn attach(&self, handle: ConnectionHandle) {
        let previous = self.connection().replace(handle);
        if let Some(previous) = previous {
            tracing::info!(
                agent = %self.agent_id,
                session = %previous.session_id,
                "Superseding previous connection"
            );
            previous.close();
        }
    }

    /// Clear the connection if it still belongs to `session_id`.
    ///
    /// Returns false when a newer connection has already replaced it.
    pub(crate) fn detach(&self, session_id: &str) -> bool {
        let mut slot = self.connection();
        match slot.as_ref() {
            Some(current) if current.session_id == session_id => {
                *slot = None;
                true
            }
            _ => false,
        }
    }

    /// Close whatever connection is currently bound.
    pub fn disconnect(&self) -> bool {
        match self.connection().take() {
            Some(handle) => {
                handle.close();
                true
            }
            None => false,
        }
    }

    pub(crate) async fn acquire_relay(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.relay_lease.lock().await
    }

    pub(crate) fn record_sent(&self) -> u64 {
        self.sent.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub(crate) fn record_received(&self) -> u64 {
        self.received.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub(crate) fn record_rejected(&self) -> u64 {
        self.rejected.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn status(&self) -> ProxyStatus {
        let connection = self.connection().clone();
        ProxyStatus {
            agent_id: self.agent_id.clone(),
            connected: connection.is_some(),
            session_id: connection.as_ref().map(|c| c.session_id.clone()),
            peer: connection.as_ref().and_then(|c| c.peer.clone()),
            connected_at: connection.as_ref().map(|c| c.connected_at),
            outbound_pending: self.outbound.len(),
            inbound_pending: self.inbound.len(),
            sent: self.sent.load(Ordering::Relaxed),
            received: self.received.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
        }
    }

    fn connection(&self) -> MutexGuard<'_, Option<ConnectionHandle>> {
        self.connection.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(session: &str) -> ConnectionHandle {
        ConnectionHandle::new(session, None, CancellationToken::new())
    }

    #[test]
    fn test_new_proxy_is_disconnected() {
        let proxy = AgentProxy::new("a1");
        assert_eq!(proxy.agent_id(), "a1");
        assert!(!proxy.is_connected());
        assert!(proxy.session_id().is_none());
    }

    #[test]
    fn test_attach_supersedes_previous() {
        let proxy = AgentProxy::new("a1");
        let first = handle("s1");
        proxy.attach(first.clone());
        proxy.attach(handle("s2"));

        assert!(first.is_closed());
        assert_eq!(proxy.session_id().as_deref(), Some("s2"));
    }

    #[test]
    fn test_stale_detach_is_ignored() {
        let proxy = AgentProxy::new("a1");
        proxy.attach(handle("s1"));
        proxy.attach(handle("s2"));

        assert!(!proxy.detach("s1"));
        assert_eq!(proxy.session_id().as_deref(), Some("s2"));
        assert!(proxy.detach("s2"));
        assert!(!proxy.is_connected());
    }

    #[test]
    fn test_send_while_disconnected_queues() {
        let proxy = AgentProxy::new("a1");
        proxy.send(Envelope::new("matrix", "a1", "ping"));
        proxy.send(Envelope::new("matrix", "a1", "ping"));

        let status = proxy.status();
        assert!(!status.connected);
        assert_eq!(status.outbound_pending, 2);
    }

    #[test]
    fn test_disconnect_closes_handle() {
        let proxy = AgentProxy::new("a1");
        let h = handle("s1");
        proxy.attach(h.clone());

        assert!(proxy.disconnect());
        assert!(h.is_closed());
        assert!(!proxy.disconnect());
    }

    #[test]
    fn test_session_ids_are_unique() {
        let a = ConnectionHandle::new_session_id();
        let b = ConnectionHandle::new_session_id();
        assert_ne!(a, b);
        assert_eq!(a.len(), 32);
    }
}
