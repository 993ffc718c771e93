//! Agent-to-agent routing for the standalone hub.
//!
//! Drains every proxy's inbound queue and forwards each envelope to the
//! outbound queue of the agent named in `dst`. Embedders that consume the
//! inbound queues themselves should not run this.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::{AgentProxy, Registry};
use crate::protocol::Envelope;

/// How often the router looks for newly registered agents.
const RESCAN_INTERVAL: Duration = Duration::from_secs(2);

/// Where an inbound envelope ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Queued for the named agent.
    Forwarded(String),
    /// Addressed to the hub. No platform handler exists, so the sender was
    /// told with an `unsupported_control_message` notice.
    Control,
    /// No such agent.
    Unroutable(String),
}

/// Route one envelope.
pub fn route(registry: &Registry, envelope: Envelope) -> Route {
    if envelope.is_control() {
        tracing::warn!(
            from = %envelope.source,
            command = %envelope.command,
            "Control message reached the router; no handler"
        );
        if let Some(sender) = registry.lookup(&envelope.source) {
            sender.send(Envelope::unsupported(
                &envelope.source,
                &envelope.command,
                "the hub does not handle control messages",
            ));
        }
        return Route::Control;
    }

    match registry.lookup(&envelope.destination) {
        Some(target) => {
            let destination = envelope.destination.clone();
            tracing::debug!(
                from = %envelope.source,
                to = %destination,
                command = %envelope.command,
                "Routing message"
            );
            target.send(envelope);
            Route::Forwarded(destination)
        }
        None => {
            tracing::warn!(
                from = %envelope.source,
                to = %envelope.destination,
                command = %envelope.command,
                "No agent registered for destination, dropped"
            );
            Route::Unroutable(envelope.destination)
        }
    }
}

struct Worker {
    proxy: Arc<AgentProxy>,
    token: CancellationToken,
    handle: JoinHandle<()>,
}

async fn drain_proxy(registry: Arc<Registry>, proxy: Arc<AgentProxy>, cancel: CancellationToken) {
    loop {
        let envelope = tokio::select! {
            _ = cancel.cancelled() => return,
            envelope = proxy.recv() => envelope,
        };
        route(&registry, envelope);
    }
}

/// Run the router until `cancel` fires.
pub async fn run_router(registry: Arc<Registry>, cancel: CancellationToken) {
    tracing::info!("Starting message router...");

    let mut workers: HashMap<String, Worker> = HashMap::new();
    loop {
        // Stop workers of decommissioned (or re-provisioned) agents.
        workers.retain(|agent_id, worker| {
            let keep = registry
                .lookup(agent_id)
                .is_some_and(|proxy| Arc::ptr_eq(&proxy, &worker.proxy));
            if !keep {
                worker.token.cancel();
            }
            keep
        });

        for proxy in registry.proxies() {
            if workers.contains_key(proxy.agent_id()) {
                continue;
            }
            let token = cancel.child_token();
            let handle = tokio::spawn(drain_proxy(registry.clone(), proxy.clone(), token.clone()));
            workers.insert(
                proxy.agent_id().to_string(),
                Worker {
                    proxy,
                    token,
                    handle,
                },
            );
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(RESCAN_INTERVAL) => {}
        }
    }

    for worker in workers.into_values() {
        worker.token.cancel();
        let _ = worker.handle.await;
    }
    tracing::info!("Message router stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{MATRIX_ID, UNSUPPORTED_COMMAND};

    #[test]
    fn test_route_to_registered_agent() {
        let registry = Registry::with_agents(["a1", "a2"]).unwrap();
        let route = route(&registry, Envelope::new("a1", "a2", "hello"));

        assert_eq!(route, Route::Forwarded("a2".to_string()));
        let a2 = registry.lookup("a2").unwrap();
        assert_eq!(a2.outbound().try_pop().unwrap().command, "hello");
    }

    #[test]
    fn test_route_unknown_destination() {
        let registry = Registry::with_agents(["a1"]).unwrap();
        let route = route(&registry, Envelope::new("a1", "nobody", "hello"));

        assert_eq!(route, Route::Unroutable("nobody".to_string()));
        assert!(!registry.contains("nobody"));
    }

    #[test]
    fn test_route_control_notifies_sender() {
        let registry = Registry::with_agents(["a1"]).unwrap();
        assert_eq!(route(&registry, Envelope::new("a1", MATRIX_ID, "pong")), Route::Control);

        let notice = registry.lookup("a1").unwrap().outbound().try_pop().unwrap();
        assert_eq!(notice.source, MATRIX_ID);
        assert_eq!(notice.destination, "a1");
        assert_eq!(notice.command, UNSUPPORTED_COMMAND);
        assert_eq!(notice.arg_str("command"), Some("pong"));
    }

    #[tokio::test]
    async fn test_router_forwards_between_agents() {
        let registry = Arc::new(Registry::with_agents(["a1", "a2"]).unwrap());
        let cancel = CancellationToken::new();
        let router = tokio::spawn(run_router(registry.clone(), cancel.clone()));

        let a1 = registry.lookup("a1").unwrap();
        let a2 = registry.lookup("a2").unwrap();
        a1.inbound().push(Envelope::new("a1", "a2", "task"));

        let got = tokio::time::timeout(Duration::from_secs(2), a2.outbound().pop())
            .await
            .unwrap();
        assert_eq!(got.command, "task");

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(2), router)
            .await
            .unwrap()
            .unwrap();
    }
}
