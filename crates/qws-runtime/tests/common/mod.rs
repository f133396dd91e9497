//! In-memory raw sockets and a scripted dialer for connection tests.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::time::timeout;

use qws_core::protocol::{decode, encode};
use qws_core::{Envelope, QwsError, Result};
use qws_runtime::transport::{Dialer, RawFrame, RawSocket};
use qws_runtime::{Connection, ConnectionOptions, ConnectionState, ReconnectPolicy};

pub const WAIT: Duration = Duration::from_secs(2);

/// Connection side of an in-memory socket.
pub struct MockSocket {
    tx: UnboundedSender<RawFrame>,
    rx: UnboundedReceiver<RawFrame>,
}

/// Test side of an in-memory socket. Dropping it looks like a lost socket.
pub struct Peer {
    pub tx: UnboundedSender<RawFrame>,
    pub rx: UnboundedReceiver<RawFrame>,
}

pub fn pair() -> (MockSocket, Peer) {
    let (a_tx, a_rx) = unbounded_channel();
    let (b_tx, b_rx) = unbounded_channel();
    (MockSocket { tx: a_tx, rx: b_rx }, Peer { tx: b_tx, rx: a_rx })
}

#[async_trait]
impl RawSocket for MockSocket {
    async fn send(&mut self, frame: RawFrame) -> Result<()> {
        self.tx
            .send(frame)
            .map_err(|_| QwsError::Transport("peer gone".into()))
    }

    async fn recv(&mut self) -> Option<Result<RawFrame>> {
        self.rx.recv().await.map(Ok)
    }

    async fn close(&mut self) -> Result<()> {
        self.send(RawFrame::Close).await
    }
}

/// A socket whose every operation hangs, like a peer that stopped reading
/// with full TCP buffers.
pub struct StalledSocket;

#[async_trait]
impl RawSocket for StalledSocket {
    async fn send(&mut self, _frame: RawFrame) -> Result<()> {
        std::future::pending().await
    }

    async fn recv(&mut self) -> Option<Result<RawFrame>> {
        std::future::pending().await
    }

    async fn close(&mut self) -> Result<()> {
        std::future::pending().await
    }
}

impl Peer {
    pub fn send_envelope(&self, env: &Envelope) {
        self.tx.send(RawFrame::Binary(encode(env).unwrap())).unwrap();
    }

    pub fn send_raw(&self, frame: RawFrame) {
        self.tx.send(frame).unwrap();
    }

    pub async fn next_frame(&mut self) -> RawFrame {
        timeout(WAIT, self.rx.recv())
            .await
            .expect("timed out waiting for frame")
            .expect("socket dropped")
    }

    /// Next data frame, skipping pings.
    pub async fn next_envelope(&mut self) -> Envelope {
        loop {
            match self.next_frame().await {
                RawFrame::Binary(b) => return decode(b).unwrap(),
                RawFrame::Ping(_) | RawFrame::Pong(_) => continue,
                other => panic!("expected envelope, got {other:?}"),
            }
        }
    }

    /// Nothing else arrives within `within`.
    pub async fn assert_quiet(&mut self, within: Duration) {
        if let Ok(Some(frame)) = timeout(within, self.rx.recv()).await {
            panic!("unexpected frame {frame:?}");
        }
    }

    /// Answer the closing handshake once it arrives.
    pub async fn confirm_close(&mut self) {
        loop {
            if let RawFrame::Close = self.next_frame().await {
                let _ = self.tx.send(RawFrame::Close);
                return;
            }
        }
    }
}

pub enum Step {
    Accept(MockSocket),
    Fail,
}

/// Plays back a fixed script, then fails every further attempt.
#[derive(Clone, Default)]
pub struct MockDialer {
    script: Arc<Mutex<VecDeque<Step>>>,
    attempts: Arc<AtomicUsize>,
}

impl MockDialer {
    pub fn new(steps: impl IntoIterator<Item = Step>) -> Self {
        Self {
            script: Arc::new(Mutex::new(steps.into_iter().collect())),
            attempts: Arc::default(),
        }
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Dialer for MockDialer {
    async fn dial(&self) -> Result<Box<dyn RawSocket>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let step = self.script.lock().unwrap().pop_front();
        match step {
            Some(Step::Accept(socket)) => Ok(Box::new(socket)),
            Some(Step::Fail) | None => Err(QwsError::DialFailure("scripted failure".into())),
        }
    }
}

pub fn fast_reconnect(initial_ms: u64) -> ReconnectPolicy {
    ReconnectPolicy {
        enabled: true,
        initial_delay: Duration::from_millis(initial_ms),
        max_delay: Duration::from_millis(initial_ms * 4),
        multiplier: 2.0,
    }
}

pub fn quiet_opts(reconnect: ReconnectPolicy) -> ConnectionOptions {
    ConnectionOptions::default()
        .without_heartbeat()
        .with_reconnect(reconnect)
        .with_close_grace(Duration::from_millis(200))
}

pub async fn wait_state(conn: &Connection, want: ConnectionState) {
    let mut rx = conn.watch_state();
    timeout(WAIT, rx.wait_for(|s| *s == want))
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {want}"))
        .unwrap();
}

pub async fn wait_closed(conn: &Connection) {
    timeout(WAIT, conn.closed()).await.expect("connection did not finish");
}
