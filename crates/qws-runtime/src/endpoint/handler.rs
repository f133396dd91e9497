use std::future::Future;
use std::net::SocketAddr;

use async_trait::async_trait;
use axum::http::{HeaderMap, Uri};

use qws_core::Result;

use crate::connection::Connection;
use crate::routing::RouteParams;

/// The inbound upgrade request, as seen before the handshake completes.
#[derive(Debug, Clone)]
pub struct RequestInfo {
    pub uri: Uri,
    pub headers: HeaderMap,
    pub remote_addr: Option<SocketAddr>,
}

impl RequestInfo {
    pub fn path(&self) -> &str {
        self.uri.path()
    }

    pub fn query(&self) -> Option<&str> {
        self.uri.query()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// Application handler for one route.
///
/// Runs once per accepted connection, before inbound dispatch starts:
/// register callbacks here. Long-running work belongs in a spawned task.
/// An `Err` closes the connection.
#[async_trait]
pub trait RouteHandler: Send + Sync {
    async fn handle(&self, conn: Connection, params: RouteParams, request: RequestInfo) -> Result<()>;
}

/// Authorization middleware consulted before the handshake completes.
/// `Ok(false)` rejects with 401; `Err` rejects with 500.
#[async_trait]
pub trait Authorizer: Send + Sync {
    async fn authorize(&self, request: &RequestInfo, params: &RouteParams) -> Result<bool>;
}

pub struct FnHandler<F>(F);

/// Adapt an async closure into a [`RouteHandler`].
pub fn handler_fn<F, Fut>(f: F) -> FnHandler<F>
where
    F: Fn(Connection, RouteParams, RequestInfo) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    FnHandler(f)
}

#[async_trait]
impl<F, Fut> RouteHandler for FnHandler<F>
where
    F: Fn(Connection, RouteParams, RequestInfo) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    async fn handle(&self, conn: Connection, params: RouteParams, request: RequestInfo) -> Result<()> {
        (self.0)(conn, params, request).await
    }
}

pub struct FnAuthorizer<F>(F);

/// Adapt an async closure into an [`Authorizer`]. The closure gets owned
/// copies of the request and params.
pub fn authorizer_fn<F, Fut>(f: F) -> FnAuthorizer<F>
where
    F: Fn(RequestInfo, RouteParams) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<bool>> + Send + 'static,
{
    FnAuthorizer(f)
}

#[async_trait]
impl<F, Fut> Authorizer for FnAuthorizer<F>
where
    F: Fn(RequestInfo, RouteParams) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<bool>> + Send + 'static,
{
    async fn authorize(&self, request: &RequestInfo, params: &RouteParams) -> Result<bool> {
        (self.0)(request.clone(), params.clone()).await
    }
}
