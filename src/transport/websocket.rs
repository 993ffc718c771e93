//! Axum WebSocket adapter.

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};

use super::{Connection, FrameReader, FrameWriter};
use crate::error::{Error, Result};

struct WsReader {
    stream: SplitStream<WebSocket>,
}

#[async_trait]
impl FrameReader for WsReader {
    async fn read_frame(&mut self) -> Result<Option<Vec<u8>>> {
        while let Some(message) = self.stream.next().await {
            match message {
                Ok(Message::Binary(data)) => return Ok(Some(data)),
                Ok(Message::Text(text)) => return Ok(Some(text.into_bytes())),
                // axum answers pings itself
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => continue,
                Ok(Message::Close(_)) => return Ok(None),
                Err(e) => return Err(Error::Transport(e.to_string())),
            }
        }
        Ok(None)
    }
}

struct WsWriter {
    sink: SplitSink<WebSocket, Message>,
    closed: bool,
}

#[async_trait]
impl FrameWriter for WsWriter {
    async fn write_frame(&mut self, frame: Vec<u8>) -> Result<()> {
        if self.closed {
            return Err(Error::Transport("connection closed".to_string()));
        }
        self.sink
            .send(Message::Binary(frame))
            .await
            .map_err(|e| Error::Transport(e.to_string()))
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        // The peer may already be gone; a failed close frame is not an error.
        let _ = self.sink.send(Message::Close(None)).await;
        self.sink
            .close()
            .await
            .map_err(|e| Error::Transport(e.to_string()))
    }
}

/// Wrap an upgraded socket as a `Connection`.
pub fn connection(socket: WebSocket, peer: Option<String>) -> Connection {
    let (sink, stream) = socket.split();
    Connection::new(peer, WsReader { stream }, WsWriter { sink, closed: false })
}
