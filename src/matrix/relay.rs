//! Duplex relay between a bound connection and its proxy.
//!
//! Outbound: proxy outbound queue → connection, one frame per envelope.
//! Inbound: connection → proxy inbound queue, in arrival order.
//!
//! Both loops share one cancellation token. Whichever ends first cancels the
//! other, so a dead connection never leaves a loop behind.

use tokio_util::sync::CancellationToken;

use super::handshake::BoundConnection;
use super::Matrix;
use crate::core::AgentProxy;
use crate::error::{Error, Result};
use crate::transport::{Connection, FrameReader, FrameWriter};

/// How a session ended.
#[derive(Debug)]
pub enum Closed {
    /// Remote close, supersession by a newer connection, or hub shutdown.
    Normal,
    Error(Error),
}

/// Outcome of one relayed session.
#[derive(Debug)]
pub struct SessionSummary {
    pub agent_id: String,
    pub session_id: String,
    pub sent: u64,
    pub received: u64,
    pub closed: Closed,
}

/// Relay until the connection dies, then tear it down.
pub async fn run(matrix: &Matrix, bound: BoundConnection) -> SessionSummary {
    let BoundConnection {
        proxy,
        session_id,
        cancel,
        connection,
    } = bound;
    let Connection {
        mut reader,
        mut writer,
        ..
    } = connection;

    let mut sent = 0u64;
    let mut received = 0u64;

    // Wait for the previous connection of this agent (if any) to let go of
    // the queues.
    let lease = tokio::select! {
        lease = proxy.acquire_relay() => Some(lease),
        _ = cancel.cancelled() => None,
    };

    let result = if lease.is_some() {
        tracing::debug!(agent = %proxy.agent_id(), session = %session_id, "Relay started");
        let outbound = async {
            let result = pump_outbound(
                matrix,
                &proxy,
                &session_id,
                writer.as_mut(),
                &cancel,
                &mut sent,
            )
            .await;
            cancel.cancel();
            result
        };
        let inbound = async {
            let result = pump_inbound(
                matrix,
                &proxy,
                &session_id,
                reader.as_mut(),
                &cancel,
                &mut received,
            )
            .await;
            cancel.cancel();
            result
        };
        let (outbound_result, inbound_result) = tokio::join!(outbound, inbound);
        outbound_result.and(inbound_result)
    } else {
        Ok(())
    };

    cancel.cancel();
    if let Err(e) = writer.close().await {
        tracing::debug!(agent = %proxy.agent_id(), "Error while closing connection: {}", e);
    }
    if proxy.detach(&session_id) {
        tracing::info!(agent = %proxy.agent_id(), session = %session_id, "Agent disconnected");
    } else {
        tracing::debug!(
            agent = %proxy.agent_id(),
            session = %session_id,
            "Connection already replaced"
        );
    }
    drop(lease);

    SessionSummary {
        agent_id: proxy.agent_id().to_string(),
        session_id,
        sent,
        received,
        closed: match result {
            Ok(()) => Closed::Normal,
            Err(e) => Closed::Error(e),
        },
    }
}

/// proxy → matrix → real agent
async fn pump_outbound(
    matrix: &Matrix,
    proxy: &AgentProxy,
    session_id: &str,
    writer: &mut dyn FrameWriter,
    cancel: &CancellationToken,
    count: &mut u64,
) -> Result<()> {
    loop {
        let envelope = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(()),
            envelope = proxy.outbound().pop() => envelope,
        };

        if let Err(e) = matrix.control().check_outbound(&envelope) {
            proxy.record_rejected();
            tracing::warn!(agent = %proxy.agent_id(), session = %session_id, "Not sent: {}", e);
            continue;
        }

        let frame = match matrix.codec().encode(&envelope) {
            Ok(frame) => frame,
            Err(e) => {
                proxy.record_rejected();
                tracing::warn!(
                    agent = %proxy.agent_id(),
                    command = %envelope.command,
                    "Dropping unencodable message: {}",
                    e
                );
                continue;
            }
        };

        let written = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                proxy.outbound().push_front(envelope);
                return Ok(());
            }
            written = writer.write_frame(frame) => written,
        };
        if let Err(e) = written {
            // Keep it for the next connection.
            proxy.outbound().push_front(envelope);
            return Err(e);
        }

        *count += 1;
        proxy.record_sent();
        tracing::debug!(
            agent = %proxy.agent_id(),
            session = %session_id,
            count = *count,
            command = %envelope.command,
            "Sent"
        );
    }
}

/// real agent → matrix → proxy
async fn pump_inbound(
    matrix: &Matrix,
    proxy: &AgentProxy,
    session_id: &str,
    reader: &mut dyn FrameReader,
    cancel: &CancellationToken,
    count: &mut u64,
) -> Result<()> {
    loop {
        let frame = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(()),
            frame = reader.read_frame() => frame?,
        };
        let Some(frame) = frame else {
            tracing::debug!(agent = %proxy.agent_id(), session = %session_id, "Remote closed");
            return Ok(());
        };

        let envelope = matrix
            .codec()
            .decode(&frame)
            .map_err(|e| Error::ProtocolViolation(format!("undecodable frame: {}", e)))?;
        let command = envelope.command.clone();

        if envelope.is_control() {
            if let Err(e) = matrix.control().handle_inbound(proxy, envelope) {
                proxy.record_rejected();
                tracing::warn!(agent = %proxy.agent_id(), session = %session_id, "{}", e);
                continue;
            }
        } else {
            proxy.inbound().push(envelope);
        }

        *count += 1;
        proxy.record_received();
        tracing::debug!(
            agent = %proxy.agent_id(),
            session = %session_id,
            count = *count,
            command = %command,
            "Received"
        );
    }
}
