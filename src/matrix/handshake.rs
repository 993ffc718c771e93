//! Registration handshake run once on every accepted connection.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::Matrix;
use crate::core::{AgentProxy, ConnectionHandle};
use crate::error::{Error, Result};
use crate::protocol::{Envelope, CONNECT_COMMAND, MATRIX_ID};
use crate::transport::Connection;

/// A connection that passed the handshake and is bound to its proxy.
pub struct BoundConnection {
    pub proxy: Arc<AgentProxy>,
    pub session_id: String,
    pub cancel: CancellationToken,
    pub connection: Connection,
}

pub enum Admission {
    Bound(BoundConnection),
    /// The agent is not registered. The connection has been closed.
    Rejected,
}

/// Read the first frame, validate it and bind the connection.
///
/// Protocol violations, timeouts and transport failures close the connection
/// and come back as `Err`. An unknown agent is a routine rejection.
pub async fn admit(matrix: &Matrix, mut connection: Connection) -> Result<Admission> {
    let request = match read_registration(matrix, &mut connection).await {
        Ok(request) => request,
        Err(e) => {
            connection.close().await;
            return Err(e);
        }
    };

    let agent_id = match validate(&request) {
        Ok(agent_id) => agent_id,
        Err(e) => {
            connection.close().await;
            return Err(e);
        }
    };

    if matrix.shutdown_token().is_cancelled() {
        tracing::warn!("agent_id {} connecting during shutdown, connection aborted", agent_id);
        connection.close().await;
        return Ok(Admission::Rejected);
    }

    let session_id = ConnectionHandle::new_session_id();
    let cancel = matrix.shutdown_token().child_token();
    let handle = ConnectionHandle::new(session_id.clone(), connection.peer.clone(), cancel.clone());

    match matrix.registry().bind(&agent_id, handle) {
        Ok(proxy) => {
            tracing::info!(
                agent = %agent_id,
                session = %session_id,
                peer = connection.peer.as_deref().unwrap_or("unknown"),
                "Connection established"
            );
            Ok(Admission::Bound(BoundConnection {
                proxy,
                session_id,
                cancel,
                connection,
            }))
        }
        Err(Error::AgentUnknown(_)) => {
            tracing::warn!("agent_id {} un-known, connection aborted", agent_id);
            connection.close().await;
            Ok(Admission::Rejected)
        }
        Err(e) => {
            connection.close().await;
            Err(e)
        }
    }
}

async fn read_registration(matrix: &Matrix, connection: &mut Connection) -> Result<Envelope> {
    let frame = tokio::time::timeout(matrix.handshake_timeout(), connection.reader.read_frame())
        .await
        .map_err(|_| Error::HandshakeTimeout)??
        .ok_or_else(|| Error::ProtocolViolation("connection closed before registering".to_string()))?;

    matrix
        .codec()
        .decode(&frame)
        .map_err(|e| Error::ProtocolViolation(format!("undecodable registration frame: {}", e)))
}

/// Check a registration request and extract the claimed agent id.
pub fn validate(request: &Envelope) -> Result<String> {
    if request.destination != MATRIX_ID || request.command != CONNECT_COMMAND {
        return Err(Error::ProtocolViolation(format!(
            "expected '{}' to '{}', got '{}' to '{}'",
            CONNECT_COMMAND, MATRIX_ID, request.command, request.destination
        )));
    }

    match request.arg_str("agent_id") {
        Some(agent_id) if !agent_id.is_empty() => Ok(agent_id.to_string()),
        _ => Err(Error::ProtocolViolation(
            "registration is missing a string agent_id".to_string(),
        )),
    }
}
