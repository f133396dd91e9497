//! Raw transport seam.
//!
//! The connection wrapper only ever talks to a `RawSocket`: one full-duplex
//! frame pipe owned by a single driver task. Server-side sockets come from the
//! axum upgrade (`AxumSocket`); client-side sockets are produced by a `Dialer`
//! (`UrlDialer` over tokio-tungstenite). Tests plug in their own in-memory
//! implementations.

pub mod axum_ws;
pub mod tungstenite;

use async_trait::async_trait;
use bytes::Bytes;

use qws_core::Result;

pub use axum_ws::AxumSocket;
pub use tungstenite::{TungsteniteSocket, UrlDialer};

/// One transport-level frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawFrame {
    Text(String),
    Binary(Bytes),
    Ping(Bytes),
    Pong(Bytes),
    /// Closing handshake frame.
    Close,
}

/// An established full-duplex socket.
///
/// `recv` must be cancel-safe: the driver races it against queue wake-ups and
/// timers and drops the future when another branch wins.
#[async_trait]
pub trait RawSocket: Send + 'static {
    /// Write one frame.
    async fn send(&mut self, frame: RawFrame) -> Result<()>;

    /// Next inbound frame. `None` once the socket is gone.
    async fn recv(&mut self) -> Option<Result<RawFrame>>;

    /// Start the closing handshake. The caller keeps reading until the peer
    /// confirms.
    async fn close(&mut self) -> Result<()>;
}

/// Produces a fresh client socket for every (re)connection attempt.
#[async_trait]
pub trait Dialer: Send + Sync + 'static {
    async fn dial(&self) -> Result<Box<dyn RawSocket>>;
}
