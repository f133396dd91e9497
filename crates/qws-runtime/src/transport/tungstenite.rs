//! Client-side raw socket and dialer over tokio-tungstenite.

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::time::{timeout, Duration};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use url::Url;

use qws_core::{QwsError, Result};

use super::{Dialer, RawFrame, RawSocket};

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

pub struct TungsteniteSocket {
    inner: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl TungsteniteSocket {
    pub fn new(inner: WebSocketStream<MaybeTlsStream<TcpStream>>) -> Self {
        Self { inner }
    }
}

fn to_message(frame: RawFrame) -> Message {
    match frame {
        RawFrame::Text(s) => Message::Text(s),
        RawFrame::Binary(b) => Message::Binary(b.to_vec()),
        RawFrame::Ping(b) => Message::Ping(b.to_vec()),
        RawFrame::Pong(b) => Message::Pong(b.to_vec()),
        RawFrame::Close => Message::Close(None),
    }
}

#[async_trait]
impl RawSocket for TungsteniteSocket {
    async fn send(&mut self, frame: RawFrame) -> Result<()> {
        self.inner
            .send(to_message(frame))
            .await
            .map_err(|e| QwsError::Transport(e.to_string()))
    }

    async fn recv(&mut self) -> Option<Result<RawFrame>> {
        loop {
            let msg = match self.inner.next().await? {
                Ok(m) => m,
                Err(e) => return Some(Err(QwsError::Transport(e.to_string()))),
            };
            let frame = match msg {
                Message::Text(s) => RawFrame::Text(s),
                Message::Binary(b) => RawFrame::Binary(Bytes::from(b)),
                Message::Ping(b) => RawFrame::Ping(Bytes::from(b)),
                Message::Pong(b) => RawFrame::Pong(Bytes::from(b)),
                Message::Close(_) => RawFrame::Close,
                // raw frames only surface when reading unfragmented; skip
                Message::Frame(_) => continue,
            };
            return Some(Ok(frame));
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.inner
            .close(None)
            .await
            .map_err(|e| QwsError::Transport(e.to_string()))
    }
}

/// Dials `ws://` / `wss://` URLs.
#[derive(Debug, Clone)]
pub struct UrlDialer {
    url: Url,
    connect_timeout: Duration,
}

impl UrlDialer {
    pub fn new(url: &str) -> Result<Self> {
        let url = Url::parse(url).map_err(|e| QwsError::DialFailure(format!("invalid url: {e}")))?;
        match url.scheme() {
            "ws" | "wss" => {}
            other => {
                return Err(QwsError::DialFailure(format!(
                    "unsupported scheme: {other}"
                )))
            }
        }
        Ok(Self {
            url,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        })
    }

    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl Dialer for UrlDialer {
    async fn dial(&self) -> Result<Box<dyn RawSocket>> {
        let (ws, _resp) = timeout(self.connect_timeout, connect_async(self.url.as_str()))
            .await
            .map_err(|_| QwsError::DialFailure("connect timeout".into()))?
            .map_err(|e| QwsError::DialFailure(e.to_string()))?;
        Ok(Box::new(TungsteniteSocket::new(ws)))
    }
}
