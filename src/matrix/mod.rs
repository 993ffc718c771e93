//! The hub: accepts connections, binds them to registered agents and relays
//! traffic between each connection and its proxy.
//!
//! Per connection: `Accepting → Bound → Relaying → Closed`. A failed
//! handshake goes straight from `Accepting` to `Closed`.

pub mod control;
pub mod handshake;
pub mod relay;

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::core::Registry;
use crate::error::Result;
use crate::protocol::{Codec, JsonCodec};
use crate::transport::Connection;

pub use control::{ControlPlane, ControlPolicy};
pub use handshake::{Admission, BoundConnection};
pub use relay::{Closed, SessionSummary};

/// Default time an accepted connection has to register.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(30);

/// Hub tunables.
#[derive(Debug, Clone)]
pub struct MatrixConfig {
    pub handshake_timeout: Duration,
    pub control_policy: ControlPolicy,
}

impl Default for MatrixConfig {
    fn default() -> Self {
        Self {
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            control_policy: ControlPolicy::default(),
        }
    }
}

pub struct Matrix {
    registry: Arc<Registry>,
    codec: Arc<dyn Codec>,
    control: ControlPlane,
    handshake_timeout: Duration,
    shutdown: CancellationToken,
}

impl Matrix {
    pub fn new(registry: Arc<Registry>, config: MatrixConfig) -> Self {
        Self {
            registry,
            codec: Arc::new(JsonCodec),
            control: ControlPlane::new(config.control_policy),
            handshake_timeout: config.handshake_timeout,
            shutdown: CancellationToken::new(),
        }
    }

    /// Replace the frame codec.
    pub fn with_codec(mut self, codec: Arc<dyn Codec>) -> Self {
        self.codec = codec;
        self
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn codec(&self) -> &dyn Codec {
        self.codec.as_ref()
    }

    pub fn control(&self) -> &ControlPlane {
        &self.control
    }

    pub fn handshake_timeout(&self) -> Duration {
        self.handshake_timeout
    }

    /// Token cancelled when the hub shuts down. Every session token is a child.
    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }

    /// Tear down every live session. Registered proxies and their queues stay.
    pub fn shutdown(&self) {
        tracing::info!("Matrix shutting down");
        self.shutdown.cancel();
    }

    /// Run one accepted connection to completion.
    ///
    /// `Ok(None)` means the connection named an unknown agent and was closed.
    /// `Err` means the handshake itself failed; the connection is closed.
    /// Either way, nothing outside this connection is affected.
    pub async fn accept(&self, connection: Connection) -> Result<Option<SessionSummary>> {
        match handshake::admit(self, connection).await? {
            Admission::Bound(bound) => Ok(Some(relay::run(self, bound).await)),
            Admission::Rejected => Ok(None),
        }
    }

    /// Like `accept`, but logs the outcome instead of returning it.
    pub async fn serve_connection(&self, connection: Connection) {
        let peer = connection.peer.clone().unwrap_or_else(|| "unknown".to_string());
        match self.accept(connection).await {
            Ok(Some(summary)) => match &summary.closed {
                Closed::Normal => tracing::info!(
                    agent = %summary.agent_id,
                    session = %summary.session_id,
                    sent = summary.sent,
                    received = summary.received,
                    "Session closed"
                ),
                Closed::Error(e) => tracing::warn!(
                    agent = %summary.agent_id,
                    session = %summary.session_id,
                    sent = summary.sent,
                    received = summary.received,
                    "Session ended with error: {}",
                    e
                ),
            },
            Ok(None) => {}
            Err(e) if e.is_rejection() => {
                tracing::warn!(peer = %peer, "Connection rejected: {}", e);
            }
            Err(e) => {
                tracing::error!(peer = %peer, "Connection failed during handshake: {}", e);
            }
        }
    }
}
