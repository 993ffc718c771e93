//! Frame-level duplex connections.
//!
//! The hub never touches sockets directly: a `Connection` is a pair of
//! halves that read and write whole frames. The WebSocket endpoint and the
//! in-process channel both produce one.

pub mod channel;
pub mod websocket;

use async_trait::async_trait;

use crate::error::Result;

/// Receiving half of a connection.
#[async_trait]
pub trait FrameReader: Send {
    /// Wait for the next frame. `Ok(None)` means the remote side closed.
    async fn read_frame(&mut self) -> Result<Option<Vec<u8>>>;
}

/// Sending half of a connection.
#[async_trait]
pub trait FrameWriter: Send {
    async fn write_frame(&mut self, frame: Vec<u8>) -> Result<()>;

    /// Close the connection. Closing twice is a no-op.
    async fn close(&mut self) -> Result<()>;
}

/// A newly accepted connection, not yet bound to an agent.
pub struct Connection {
    pub peer: Option<String>,
    pub reader: Box<dyn FrameReader>,
    pub writer: Box<dyn FrameWriter>,
}

impl Connection {
    pub fn new(
        peer: Option<String>,
        reader: impl FrameReader + 'static,
        writer: impl FrameWriter + 'static,
    ) -> Self {
        Self {
            peer,
            reader: Box::new(reader),
            writer: Box::new(writer),
        }
    }

    /// Close the connection, logging rather than returning failures.
    pub async fn close(&mut self) {
        if let Err(e) = self.writer.close().await {
            tracing::debug!("Error while closing connection: {}", e);
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection").field("peer", &self.peer).finish()
    }
}
