//! Upgrade gate.
//!
//! Every inbound request lands in one fallback handler, which decides in
//! order: draining, route lookup, upgrade validity, authorization. Only a
//! request that passes all four is upgraded and wrapped.

use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, WebSocket, WebSocketUpgrade},
        ConnectInfo, State,
    },
    http::{HeaderMap, StatusCode, Uri},
    response::{IntoResponse, Response},
    Router,
};
use futures_util::FutureExt;

use qws_core::{ErrorCode, QwsError};

use super::handler::{Authorizer, RequestInfo, RouteHandler};
use super::registry::ConnectionRegistry;
use super::server::EndpointOptions;
use crate::connection::Connection;
use crate::obs::EndpointMetrics;
use crate::routing::{RouteMatch, RouteTable};
use crate::transport::AxumSocket;

pub(crate) type SharedHandler = Arc<dyn RouteHandler>;

#[derive(Clone)]
pub(crate) struct EndpointState {
    pub(crate) inner: Arc<EndpointInner>,
}

pub(crate) struct EndpointInner {
    pub(crate) routes: RouteTable<SharedHandler>,
    pub(crate) authorizer: Option<Arc<dyn Authorizer>>,
    pub(crate) registry: ConnectionRegistry,
    pub(crate) metrics: EndpointMetrics,
    pub(crate) opts: EndpointOptions,
    /// Requests past the draining check whose connection is not yet
    /// registered.
    pending_upgrades: AtomicUsize,
}

impl EndpointState {
    pub(crate) fn new(
        routes: RouteTable<SharedHandler>,
        authorizer: Option<Arc<dyn Authorizer>>,
        opts: EndpointOptions,
    ) -> Self {
        Self {
            inner: Arc::new(EndpointInner {
                routes,
                authorizer,
                registry: ConnectionRegistry::new(),
                metrics: EndpointMetrics::default(),
                opts,
                pending_upgrades: AtomicUsize::new(0),
            }),
        }
    }

    /// Drop a finished connection from the registry. Only the caller that
    /// actually removed it adjusts the gauge.
    pub(crate) fn untrack(&self, id: u64) {
        if self.inner.registry.remove(id).is_some() {
            self.inner.metrics.active_connections.dec();
        }
    }

    pub(crate) fn pending_upgrades(&self) -> usize {
        self.inner.pending_upgrades.load(Ordering::SeqCst)
    }
}

/// Held from the draining check until the connection is registered, or
/// until the request is rejected or its upgrade fails.
struct UpgradeGuard {
    state: EndpointState,
}

impl UpgradeGuard {
    fn new(state: &EndpointState) -> Self {
        state.inner.pending_upgrades.fetch_add(1, Ordering::SeqCst);
        Self { state: state.clone() }
    }
}

impl Drop for UpgradeGuard {
    fn drop(&mut self) {
        self.state.inner.pending_upgrades.fetch_sub(1, Ordering::SeqCst);
    }
}

pub(crate) fn router(state: EndpointState) -> Router {
    Router::new().fallback(accept).with_state(state)
}

fn reject(state: &EndpointState, status: StatusCode, code: ErrorCode, reason: &str) -> Response {
    state.inner.metrics.rejections.inc(&[("reason", reason)]);
    (status, code.as_str()).into_response()
}

async fn accept(
    State(state): State<EndpointState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    uri: Uri,
    headers: HeaderMap,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    // counted before the draining check so close_all sees it either way
    let guard = UpgradeGuard::new(&state);
    if state.inner.metrics.is_draining() {
        state.inner.metrics.rejections.inc(&[("reason", "draining")]);
        return (StatusCode::SERVICE_UNAVAILABLE, "draining").into_response();
    }

    let Some(matched) = state.inner.routes.resolve(uri.path(), uri.query()) else {
        tracing::debug!(path = uri.path(), code = ErrorCode::RouteNotFound.as_str(), "no route");
        return reject(&state, StatusCode::NOT_FOUND, ErrorCode::RouteNotFound, "not_found");
    };

    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => {
            tracing::debug!(path = uri.path(), "not a websocket upgrade");
            state.inner.metrics.rejections.inc(&[("reason", "bad_upgrade")]);
            return rejection.into_response();
        }
    };

    let request = RequestInfo {
        uri,
        headers,
        remote_addr: connect_info.map(|ConnectInfo(addr)| addr),
    };

    if let Some(authorizer) = state.inner.authorizer.clone() {
        let started = Instant::now();
        let verdict = AssertUnwindSafe(authorizer.authorize(&request, &matched.params))
            .catch_unwind()
            .await;
        state
            .inner
            .metrics
            .authorize_duration
            .observe(&[("route", matched.pattern.as_str())], started.elapsed());

        match verdict {
            Ok(Ok(true)) => {}
            Ok(Ok(false)) => {
                tracing::debug!(path = request.path(), code = ErrorCode::Unauthorized.as_str(), "authorization denied");
                return reject(&state, StatusCode::UNAUTHORIZED, ErrorCode::Unauthorized, "unauthorized");
            }
            Ok(Err(e)) => {
                let fault = QwsError::HandlerFault(format!("authorizer failed: {e}"));
                tracing::warn!(path = request.path(), code = fault.code().as_str(), error = %fault, "authorizer error");
                return reject(&state, StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::HandlerFault, "authorizer_error");
            }
            Err(_) => {
                tracing::warn!(path = request.path(), code = ErrorCode::HandlerFault.as_str(), "authorizer panicked");
                return reject(&state, StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::HandlerFault, "authorizer_error");
            }
        }
    }

    ws.on_upgrade(move |socket| serve_connection(state, socket, matched, request, guard))
}

async fn serve_connection(
    state: EndpointState,
    socket: WebSocket,
    matched: RouteMatch<SharedHandler>,
    request: RequestInfo,
    guard: UpgradeGuard,
) {
    let inner = &state.inner;
    let conn = Connection::server(
        request.path().to_string(),
        Box::new(AxumSocket::new(socket)),
        inner.opts.connection.clone(),
    );

    inner.registry.insert(conn.clone());
    inner.metrics.active_connections.inc();
    inner.metrics.accepts.inc(&[("route", matched.pattern.as_str())]);
    drop(guard);

    {
        let state = state.clone();
        let conn = conn.clone();
        tokio::spawn(async move {
            conn.closed().await;
            state.untrack(conn.id());
        });
    }

    // close_all may have snapshotted the registry before the insert above
    if inner.metrics.is_draining() {
        conn.close();
        return;
    }

    tracing::info!(
        id = conn.id(),
        identity = conn.identity(),
        route = %matched.pattern,
        remote = ?request.remote_addr,
        "connection accepted"
    );

    let outcome = AssertUnwindSafe(matched.handler.handle(conn.clone(), matched.params, request))
        .catch_unwind()
        .await;

    let fault = match outcome {
        Ok(Ok(())) => None,
        Ok(Err(e)) => Some(QwsError::HandlerFault(e.to_string())),
        Err(_) => Some(QwsError::HandlerFault("handler panicked".into())),
    };

    if let Some(fault) = fault {
        tracing::warn!(
            id = conn.id(),
            route = %matched.pattern,
            code = fault.code().as_str(),
            error = %fault,
            "route handler failed; closing connection"
        );
        inner.metrics.handler_faults.inc(&[("route", matched.pattern.as_str())]);
        conn.close();
        return;
    }

    conn.open();
}
