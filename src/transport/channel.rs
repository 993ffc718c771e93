//! In-process transport built on tokio channels.
//!
//! `pair()` returns the hub side as a `Connection` and the agent side as a
//! `ChannelPeer`. Used for agents living in the same process and in tests.

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{Connection, FrameReader, FrameWriter};
use crate::error::{Error, Result};
use crate::protocol::{Codec, Envelope, JsonCodec};

struct ChannelReader {
    rx: mpsc::UnboundedReceiver<Vec<u8>>,
}

#[async_trait]
impl FrameReader for ChannelReader {
    async fn read_frame(&mut self) -> Result<Option<Vec<u8>>> {
        Ok(self.rx.recv().await)
    }
}

struct ChannelWriter {
    tx: Option<mpsc::UnboundedSender<Vec<u8>>>,
}

#[async_trait]
impl FrameWriter for ChannelWriter {
    async fn write_frame(&mut self, frame: Vec<u8>) -> Result<()> {
        let tx = self
            .tx
            .as_ref()
            .ok_or_else(|| Error::Transport("connection closed".to_string()))?;
        tx.send(frame)
            .map_err(|_| Error::Transport("peer went away".to_string()))
    }

    async fn close(&mut self) -> Result<()> {
        self.tx = None;
        Ok(())
    }
}

/// Agent end of an in-process connection.
pub struct ChannelPeer {
    tx: Option<mpsc::UnboundedSender<Vec<u8>>>,
    rx: mpsc::UnboundedReceiver<Vec<u8>>,
}

impl ChannelPeer {
    /// Send a raw frame. Returns false once either side has closed.
    pub fn send_frame(&self, frame: Vec<u8>) -> bool {
        match &self.tx {
            Some(tx) => tx.send(frame).is_ok(),
            None => false,
        }
    }

    /// Encode and send an envelope.
    pub fn send(&self, envelope: &Envelope) -> Result<()> {
        let frame = JsonCodec.encode(envelope)?;
        if self.send_frame(frame) {
            Ok(())
        } else {
            Err(Error::Transport("hub side closed".to_string()))
        }
    }

    /// Next raw frame, `None` once the hub closed the connection.
    pub async fn recv_frame(&mut self) -> Option<Vec<u8>> {
        self.rx.recv().await
    }

    /// Next envelope, `None` once the hub closed the connection.
    pub async fn recv(&mut self) -> Option<Result<Envelope>> {
        let frame = self.recv_frame().await?;
        Some(JsonCodec.decode(&frame))
    }

    /// Stop sending. The hub sees a remote close.
    pub fn close(&mut self) {
        self.tx = None;
    }
}

/// Create a connected (hub, agent) pair.
pub fn pair() -> (Connection, ChannelPeer) {
    let (to_hub, from_agent) = mpsc::unbounded_channel();
    let (to_agent, from_hub) = mpsc::unbounded_channel();

    let connection = Connection::new(
        Some("in-process".to_string()),
        ChannelReader { rx: from_agent },
        ChannelWriter { tx: Some(to_agent) },
    );
    let peer = ChannelPeer {
        tx: Some(to_hub),
        rx: from_hub,
    };
    (connection, peer)
}
