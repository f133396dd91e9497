//! Server-side raw socket over an axum WebSocket upgrade.

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use bytes::Bytes;

use qws_core::{QwsError, Result};

use super::{RawFrame, RawSocket};

pub struct AxumSocket {
    inner: WebSocket,
}

impl AxumSocket {
    pub fn new(inner: WebSocket) -> Self {
        Self { inner }
    }
}

fn to_message(frame: RawFrame) -> Message {
    match frame {
        RawFrame::Text(s) => Message::Text(s),
        // axum::Message::Binary requires Vec<u8>
        RawFrame::Binary(b) => Message::Binary(b.to_vec()),
        RawFrame::Ping(b) => Message::Ping(b.to_vec()),
        RawFrame::Pong(b) => Message::Pong(b.to_vec()),
        RawFrame::Close => Message::Close(None),
    }
}

fn from_message(msg: Message) -> RawFrame {
    match msg {
        Message::Text(s) => RawFrame::Text(s),
        Message::Binary(b) => RawFrame::Binary(Bytes::from(b)),
        Message::Ping(b) => RawFrame::Ping(Bytes::from(b)),
        Message::Pong(b) => RawFrame::Pong(Bytes::from(b)),
        Message::Close(_) => RawFrame::Close,
    }
}

#[async_trait]
impl RawSocket for AxumSocket {
    async fn send(&mut self, frame: RawFrame) -> Result<()> {
        self.inner
            .send(to_message(frame))
            .await
            .map_err(|e| QwsError::Transport(e.to_string()))
    }

    async fn recv(&mut self) -> Option<Result<RawFrame>> {
        let msg = self.inner.recv().await?;
        Some(
            msg.map(from_message)
                .map_err(|e| QwsError::Transport(e.to_string())),
        )
    }

    async fn close(&mut self) -> Result<()> {
        self.send(RawFrame::Close).await
    }
}
