use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{watch, Notify};
use tokio::task::AbortHandle;
use tracing::Instrument;

use qws_core::protocol::encode;
use qws_core::{Envelope, Headers, Payload, QwsError, Result};

use super::callbacks::Callbacks;
use super::driver;
use super::lock;
use super::options::ConnectionOptions;
use super::queue::OutboundQueue;
use super::state::{CloseReason, ConnectionState, Role};
use crate::transport::{Dialer, RawSocket, UrlDialer};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Where the driver gets its raw sockets from.
pub(crate) enum Link {
    Dial(Arc<dyn Dialer>),
    Accepted(Box<dyn RawSocket>),
}

enum DriverSlot {
    Pending(Link),
    Running(AbortHandle),
    Done,
}

struct Core {
    state: ConnectionState,
    queue: OutboundQueue,
    close_reason: Option<CloseReason>,
}

/// State shared between the handle(s) and the driver task.
pub(crate) struct Shared {
    pub(crate) id: u64,
    pub(crate) identity: Arc<str>,
    pub(crate) role: Role,
    pub(crate) opts: ConnectionOptions,
    pub(crate) callbacks: Callbacks,
    pub(crate) wake: Notify,
    core: Mutex<Core>,
    state_tx: watch::Sender<ConnectionState>,
    finished: AtomicBool,
    finished_tx: watch::Sender<bool>,
    driver: Mutex<DriverSlot>,
}

impl Shared {
    fn new(identity: Arc<str>, role: Role, state: ConnectionState, opts: ConnectionOptions, link: Link) -> Self {
        let (state_tx, _) = watch::channel(state);
        let (finished_tx, _) = watch::channel(false);
        Self {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            identity,
            role,
            opts,
            callbacks: Callbacks::default(),
            wake: Notify::new(),
            core: Mutex::new(Core {
                state,
                queue: OutboundQueue::default(),
                close_reason: None,
            }),
            state_tx,
            finished: AtomicBool::new(false),
            finished_tx,
            driver: Mutex::new(DriverSlot::Pending(link)),
        }
    }

    pub(crate) fn state(&self) -> ConnectionState {
        lock(&self.core).state
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.state() == ConnectionState::Closed
    }

    fn publish(&self, state: ConnectionState) {
        self.state_tx.send_replace(state);
    }

    /// Returns false if the connection was closed meanwhile.
    pub(crate) fn mark_open(&self) -> bool {
        let mut core = lock(&self.core);
        if core.state == ConnectionState::Closed {
            return false;
        }
        core.state = ConnectionState::Open;
        self.publish(ConnectionState::Open);
        true
    }

    /// Returns false if the connection was closed meanwhile.
    pub(crate) fn mark_reconnecting(&self) -> bool {
        let mut core = lock(&self.core);
        match core.state {
            ConnectionState::Closed => false,
            ConnectionState::Reconnecting => true,
            _ => {
                core.state = ConnectionState::Reconnecting;
                self.publish(ConnectionState::Reconnecting);
                true
            }
        }
    }

    /// Enter `Closed` and discard the queue. Returns false if already closed.
    pub(crate) fn mark_closed(&self, reason: CloseReason) -> bool {
        let mut core = lock(&self.core);
        if core.state == ConnectionState::Closed {
            return false;
        }
        core.state = ConnectionState::Closed;
        core.queue.clear();
        core.close_reason = Some(reason);
        self.publish(ConnectionState::Closed);
        true
    }

    fn enqueue(&self, frame: Bytes) -> Result<()> {
        let mut core = lock(&self.core);
        if core.state == ConnectionState::Closed {
            return Err(QwsError::ConnectionClosed);
        }
        core.queue.push(frame);
        Ok(())
    }

    /// Head of the queue, only while open.
    pub(crate) fn front(&self) -> Option<(u64, Bytes)> {
        let core = lock(&self.core);
        if core.state != ConnectionState::Open {
            return None;
        }
        core.queue.front()
    }

    pub(crate) fn pop_if(&self, seq: u64) {
        lock(&self.core).queue.pop_if(seq);
    }

    pub(crate) async fn wait_closed(&self) {
        let mut rx = self.state_tx.subscribe();
        let _ = rx.wait_for(|s| *s == ConnectionState::Closed).await;
    }

    /// Driver is gone: publish completion and run close callbacks, once.
    pub(crate) fn finish(&self) {
        if self.finished.swap(true, Ordering::AcqRel) {
            return;
        }
        self.mark_closed(CloseReason::Requested);
        *lock(&self.driver) = DriverSlot::Done;

        let reason = lock(&self.core)
            .close_reason
            .clone()
            .unwrap_or(CloseReason::Requested);
        self.callbacks.fire_close(&reason);
        self.callbacks.seal();
        self.finished_tx.send_replace(true);
    }

    /// Abort the driver (dropping its socket) and count the connection as closed.
    fn terminate(&self) {
        if self.finished.load(Ordering::Acquire) {
            return;
        }
        let slot = std::mem::replace(&mut *lock(&self.driver), DriverSlot::Done);
        if let DriverSlot::Running(handle) = slot {
            handle.abort();
        }
        lock(&self.core).close_reason = Some(CloseReason::Terminated);
        self.finish();
    }
}

/// Application-facing handle to one logical connection.
///
/// Cheap to clone; all clones drive the same connection. Identity is fixed
/// for the connection's lifetime, across reconnects.
#[derive(Clone)]
pub struct Connection {
    shared: Arc<Shared>,
}

impl Connection {
    /// Client-role connection in `Connecting`. Nothing is dialed until
    /// [`open`](Self::open); register callbacks first to observe the first
    /// connect.
    pub fn client(identity: impl Into<Arc<str>>, dialer: Arc<dyn Dialer>, opts: ConnectionOptions) -> Self {
        let shared = Shared::new(
            identity.into(),
            Role::Client,
            ConnectionState::Connecting,
            opts,
            Link::Dial(dialer),
        );
        Self {
            shared: Arc::new(shared),
        }
    }

    /// Client-role connection dialing a `ws://` or `wss://` URL. The identity
    /// is the URL path.
    pub fn client_url(url: &str, opts: ConnectionOptions) -> Result<Self> {
        let dialer = UrlDialer::new(url)?;
        let identity = dialer.url().path().to_string();
        Ok(Self::client(identity, Arc::new(dialer), opts))
    }

    /// Server-role connection over an already accepted socket, in `Open`.
    /// Inbound dispatch starts at [`open`](Self::open). Never reconnects.
    pub fn server(identity: impl Into<Arc<str>>, socket: Box<dyn RawSocket>, opts: ConnectionOptions) -> Self {
        let shared = Shared::new(
            identity.into(),
            Role::Server,
            ConnectionState::Open,
            opts,
            Link::Accepted(socket),
        );
        Self {
            shared: Arc::new(shared),
        }
    }

    /// Start the driver task. Idempotent. Must run inside a Tokio runtime.
    pub fn open(&self) {
        let mut slot = lock(&self.shared.driver);
        let link = match std::mem::replace(&mut *slot, DriverSlot::Done) {
            DriverSlot::Pending(link) => link,
            other => {
                *slot = other;
                return;
            }
        };

        let span = tracing::info_span!(
            "conn",
            id = self.shared.id,
            identity = %self.shared.identity,
            role = self.shared.role.as_str()
        );
        let handle = tokio::spawn(driver::run(Arc::clone(&self.shared), link).instrument(span));
        *slot = DriverSlot::Running(handle.abort_handle());
    }

    /// Queue an envelope. Never waits: while open the driver writes it right
    /// after anything queued earlier; otherwise it buffers until the next open.
    pub fn send(&self, payload: impl Into<Payload>, headers: Headers) -> Result<()> {
        if self.shared.is_closed() {
            return Err(QwsError::ConnectionClosed);
        }
        let frame = encode(&Envelope::new(payload, headers))?;
        self.shared.enqueue(frame)?;
        self.shared.wake.notify_one();
        Ok(())
    }

    pub fn send_json<T: Serialize>(&self, value: &T, headers: Headers) -> Result<()> {
        let v = serde_json::to_value(value)
            .map_err(|e| QwsError::Internal(format!("json encode failed: {e}")))?;
        self.send(Payload::Structured(v), headers)
    }

    pub fn send_binary(&self, bytes: impl Into<Bytes>, headers: Headers) -> Result<()> {
        self.send(Payload::Binary(bytes.into()), headers)
    }

    /// Called on every transition into `Open`.
    pub fn on_connect(&self, f: impl Fn() + Send + Sync + 'static) {
        self.shared.callbacks.connect.push(Arc::new(f));
    }

    pub fn on_structured_message(&self, f: impl Fn(&Value, &Headers) + Send + Sync + 'static) {
        self.shared.callbacks.structured.push(Arc::new(f));
    }

    pub fn on_binary_message(&self, f: impl Fn(&Bytes, &Headers) + Send + Sync + 'static) {
        self.shared.callbacks.binary.push(Arc::new(f));
    }

    /// Non-fatal errors, e.g. a malformed inbound frame.
    pub fn on_error(&self, f: impl Fn(&QwsError) + Send + Sync + 'static) {
        self.shared.callbacks.error.push(Arc::new(f));
    }

    /// Called once, after the raw socket is gone for good.
    pub fn on_close(&self, f: impl Fn(&CloseReason) + Send + Sync + 'static) {
        self.shared.callbacks.close.push(Arc::new(f));
    }

    /// Enter `Closed` now (queued envelopes are discarded) and let the driver
    /// run the closing handshake.
    pub fn close(&self) {
        if self.shared.mark_closed(CloseReason::Requested) {
            tracing::debug!(id = self.shared.id, identity = %self.shared.identity, "close requested");
        }

        let (never_dialed, accepted) = {
            let mut slot = lock(&self.shared.driver);
            let never_dialed = matches!(*slot, DriverSlot::Pending(Link::Dial(_)));
            let accepted = matches!(*slot, DriverSlot::Pending(Link::Accepted(_)));
            if never_dialed {
                *slot = DriverSlot::Done;
            }
            (never_dialed, accepted)
        };

        if never_dialed {
            self.shared.finish();
            return;
        }
        if accepted {
            // the accepted socket still owes the peer a closing handshake
            self.open();
        }
        self.shared.wake.notify_one();
    }

    /// Resolves once the connection is closed and its socket released.
    pub async fn closed(&self) {
        let mut rx = self.shared.finished_tx.subscribe();
        let _ = rx.wait_for(|done| *done).await;
    }

    /// `close()`, then wait up to `grace` for the socket to confirm. On
    /// timeout the socket is dropped forcibly. Returns whether the close was
    /// graceful.
    pub async fn shutdown(&self, grace: Duration) -> bool {
        self.close();
        if tokio::time::timeout(grace, self.closed()).await.is_ok() {
            return true;
        }
        tracing::warn!(
            id = self.shared.id,
            identity = %self.shared.identity,
            grace_ms = grace.as_millis() as u64,
            "close not confirmed in time; terminating"
        );
        self.shared.terminate();
        false
    }

    /// Process-unique connection id.
    pub fn id(&self) -> u64 {
        self.shared.id
    }

    pub fn identity(&self) -> &str {
        &self.shared.identity
    }

    pub fn role(&self) -> Role {
        self.shared.role
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    pub fn close_reason(&self) -> Option<CloseReason> {
        lock(&self.shared.core).close_reason.clone()
    }

    /// Envelopes accepted by `send` but not yet written.
    pub fn queued_len(&self) -> usize {
        lock(&self.shared.core).queue.len()
    }

    /// Observe state transitions.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state_tx.subscribe()
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.shared.id)
            .field("identity", &self.shared.identity)
            .field("role", &self.shared.role)
            .field("state", &self.state())
            .finish()
    }
}
