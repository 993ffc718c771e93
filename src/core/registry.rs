//! Connection registry: agent id → proxy.
//!
//! Entries are provisioned ahead of time (settings file or the HTTP API).
//! Nothing on the connection path ever creates one.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::proxy::{AgentProxy, ConnectionHandle, ProxyStatus};
use crate::error::{Error, Result};
use crate::protocol::MATRIX_ID;

/// Outcome of [`Registry::insert`].
#[derive(Debug, Clone)]
pub enum Registration {
    Created(Arc<AgentProxy>),
    Existing(Arc<AgentProxy>),
}

impl Registration {
    pub fn is_created(&self) -> bool {
        matches!(self, Registration::Created(_))
    }

    pub fn into_proxy(self) -> Arc<AgentProxy> {
        match self {
            Registration::Created(proxy) | Registration::Existing(proxy) => proxy,
        }
    }
}

#[derive(Debug, Default)]
pub struct Registry {
    proxies: RwLock<HashMap<String, Arc<AgentProxy>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry pre-populated with `agent_ids`.
    pub fn with_agents<I, S>(agent_ids: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let registry = Self::new();
        for agent_id in agent_ids {
            registry.register(agent_id.as_ref())?;
        }
        Ok(registry)
    }

    /// Provision an identity. Registering an existing id returns its proxy.
    pub fn register(&self, agent_id: &str) -> Result<Arc<AgentProxy>> {
        self.insert(agent_id).map(|registration| registration.into_proxy())
    }

    /// Provision an identity and report whether this call created it.
    ///
    /// The check and the insert happen under one write lock, so of several
    /// concurrent callers for the same id exactly one sees `Created`.
    pub fn insert(&self, agent_id: &str) -> Result<Registration> {
        validate_agent_id(agent_id)?;

        let mut proxies = self.write();
        match proxies.entry(agent_id.to_string()) {
            Entry::Occupied(entry) => Ok(Registration::Existing(entry.get().clone())),
            Entry::Vacant(entry) => {
                tracing::debug!("Registered agent: {}", agent_id);
                let proxy = entry.insert(Arc::new(AgentProxy::new(agent_id)));
                Ok(Registration::Created(proxy.clone()))
            }
        }
    }

    /// Remove an identity and close its connection, if any.
    pub fn decommission(&self, agent_id: &str) -> Option<Arc<AgentProxy>> {
        let removed = self.write().remove(agent_id);
        if let Some(proxy) = &removed {
            proxy.disconnect();
            tracing::info!("Decommissioned agent: {}", agent_id);
        }
        removed
    }

    pub fn lookup(&self, agent_id: &str) -> Option<Arc<AgentProxy>> {
        self.read().get(agent_id).cloned()
    }

    pub fn contains(&self, agent_id: &str) -> bool {
        self.read().contains_key(agent_id)
    }

    /// Bind a live connection to a registered identity.
    ///
    /// Replaces any previous connection of that agent. Fails with
    /// `AgentUnknown` if the identity was never provisioned.
    pub fn bind(&self, agent_id: &str, connection: ConnectionHandle) -> Result<Arc<AgentProxy>> {
        let proxy = self
            .lookup(agent_id)
            .ok_or_else(|| Error::AgentUnknown(agent_id.to_string()))?;
        proxy.attach(connection);
        Ok(proxy)
    }

    /// Registered ids, sorted.
    pub fn agent_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn proxies(&self) -> Vec<Arc<AgentProxy>> {
        self.read().values().cloned().collect()
    }

    /// Status of every proxy, sorted by agent id.
    pub fn snapshot(&self) -> Vec<ProxyStatus> {
        let mut statuses: Vec<ProxyStatus> = self.proxies().iter().map(|p| p.status()).collect();
        statuses.sort_by(|a, b| a.agent_id.cmp(&b.agent_id));
        statuses
    }

    /// Close every live connection. Proxies and queues are kept.
    pub fn disconnect_all(&self) -> usize {
        self.proxies().iter().filter(|p| p.disconnect()).count()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Arc<AgentProxy>>> {
        self.proxies.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Arc<AgentProxy>>> {
        self.proxies.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Check that an id can be used for an agent.
pub fn validate_agent_id(agent_id: &str) -> Result<()> {
    if agent_id.trim().is_empty() {
        return Err(Error::Config("agent id must not be empty".to_string()));
    }
    if agent_id == MATRIX_ID {
        return Err(Error::Config(format!("'{}' is reserved for the hub", MATRIX_ID)));
    }
    Ok(())
}
