use std::future::Future;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::stream::{FuturesUnordered, StreamExt};
use tokio::net::{TcpListener, ToSocketAddrs};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};

use qws_core::{QwsError, Result};

use super::accept::{router, EndpointState, SharedHandler};
use super::handler::{Authorizer, RouteHandler};
use crate::connection::{lock, Connection, ConnectionOptions};
use crate::obs::EndpointMetrics;
use crate::routing::RouteTable;

/// Listening endpoint tuning.
#[derive(Debug, Clone)]
pub struct EndpointOptions {
    /// Per-connection budget for the closing handshake during `close_all`.
    pub close_grace: Duration,
    /// Options applied to every accepted connection.
    pub connection: ConnectionOptions,
}

impl Default for EndpointOptions {
    fn default() -> Self {
        Self {
            close_grace: Duration::from_secs(5),
            connection: ConnectionOptions::default(),
        }
    }
}

/// Collects routes and middleware, then binds an [`Endpoint`].
#[derive(Default)]
pub struct EndpointBuilder {
    routes: RouteTable<SharedHandler>,
    authorizer: Option<Arc<dyn Authorizer>>,
    opts: EndpointOptions,
}

impl EndpointBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn options(mut self, opts: EndpointOptions) -> Self {
        self.opts = opts;
        self
    }

    /// Register a handler. Fails with `InvalidRoute` on a malformed pattern.
    pub fn route(mut self, pattern: &str, handler: impl RouteHandler + 'static) -> Result<Self> {
        let handler: SharedHandler = Arc::new(handler);
        self.routes.register(pattern, handler)?;
        Ok(self)
    }

    /// Consulted for every routed upgrade before the handshake completes.
    pub fn authorizer(mut self, authorizer: impl Authorizer + 'static) -> Self {
        let authorizer: Arc<dyn Authorizer> = Arc::new(authorizer);
        self.authorizer = Some(authorizer);
        self
    }

    pub async fn bind(self, addr: impl ToSocketAddrs) -> Result<Endpoint> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| QwsError::Internal(format!("bind failed: {e}")))?;
        self.serve(listener)
    }

    /// Serve on an already bound listener, in a background task.
    pub fn serve(self, listener: TcpListener) -> Result<Endpoint> {
        let local_addr = listener
            .local_addr()
            .map_err(|e| QwsError::Internal(format!("local_addr failed: {e}")))?;

        let routes = self.routes.len();
        let state = EndpointState::new(self.routes, self.authorizer, self.opts);
        let app = router(state.clone()).into_make_service_with_connect_info::<SocketAddr>();
        let (stop_tx, stop_rx) = oneshot::channel::<()>();

        let server = tokio::spawn(async move {
            let res = axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = stop_rx.await;
                })
                .await;
            if let Err(e) = res {
                tracing::error!(error = %e, "endpoint server failed");
            }
        });

        tracing::info!(%local_addr, routes, "endpoint listening");
        Ok(Endpoint {
            state,
            local_addr,
            stop: Mutex::new(Some(stop_tx)),
            server: Mutex::new(Some(server)),
        })
    }
}

/// A bound, serving endpoint.
pub struct Endpoint {
    state: EndpointState,
    local_addr: SocketAddr,
    stop: Mutex<Option<oneshot::Sender<()>>>,
    server: Mutex<Option<JoinHandle<()>>>,
}

impl Endpoint {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Live accepted connections.
    pub fn connection_count(&self) -> usize {
        self.state.inner.registry.len()
    }

    pub fn connections(&self) -> Vec<Connection> {
        self.state.inner.registry.snapshot()
    }

    pub fn metrics(&self) -> &EndpointMetrics {
        &self.state.inner.metrics
    }

    pub fn is_draining(&self) -> bool {
        self.state.inner.metrics.is_draining()
    }

    /// Stop accepting, close every live connection concurrently and wait
    /// until each confirmed or hit the grace timeout, then stop the listener.
    pub async fn close_all(&self) {
        let inner = &self.state.inner;
        let grace = inner.opts.close_grace;
        inner.metrics.set_draining();
        tracing::info!(
            connections = inner.registry.len(),
            pending = self.state.pending_upgrades(),
            "endpoint draining"
        );

        let deadline = Instant::now() + grace;
        loop {
            // read before draining: a zero means every upgrade already registered
            let pending = self.state.pending_upgrades();
            self.drain_registry(grace).await;
            if pending == 0 {
                break;
            }
            if Instant::now() >= deadline {
                tracing::warn!(pending, "upgrades still in flight after grace");
                break;
            }
            sleep(Duration::from_millis(10)).await;
        }

        if let Some(stop) = lock(&self.stop).take() {
            let _ = stop.send(());
        }
        let server = lock(&self.server).take();
        if let Some(mut server) = server {
            if tokio::time::timeout(grace, &mut server).await.is_err() {
                tracing::warn!("listener did not stop in time; aborting");
                server.abort();
            }
        }

        // upgrades that finished after the wait above
        self.drain_registry(grace).await;
        tracing::info!("endpoint closed");
    }

    async fn drain_registry(&self, grace: Duration) {
        let inner = &self.state.inner;
        loop {
            let conns = inner.registry.snapshot();
            if conns.is_empty() {
                return;
            }

            let mut pending: FuturesUnordered<_> = conns
                .into_iter()
                .map(|conn| async move {
                    let graceful = conn.shutdown(grace).await;
                    (conn, graceful)
                })
                .collect();

            while let Some((conn, graceful)) = pending.next().await {
                if !graceful {
                    inner.metrics.forced_closes.inc(&[]);
                }
                self.state.untrack(conn.id());
            }
        }
    }

    /// Serve until `signal` resolves, then [`close_all`](Self::close_all).
    pub async fn serve_until(&self, signal: impl Future<Output = ()>) {
        signal.await;
        tracing::info!("shutdown signal received");
        self.close_all().await;
    }
}
