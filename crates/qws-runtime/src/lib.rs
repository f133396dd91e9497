//! qws runtime: connection wrapper, router and listening endpoint.
//!
//! A [`Connection`](connection::Connection) queues outbound envelopes,
//! reconnects client sockets with backoff and dispatches inbound envelopes to
//! typed callbacks. An [`Endpoint`](endpoint::Endpoint) accepts WebSocket
//! upgrades, routes them by path, consults an optional authorizer and wraps
//! every accepted socket, tracking it until shutdown.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod config;
pub mod connection;
pub mod endpoint;
pub mod obs;
pub mod routing;
pub mod transport;

pub use connection::{CloseReason, Connection, ConnectionOptions, ConnectionState, ReconnectPolicy, Role};
pub use endpoint::{authorizer_fn, handler_fn, Authorizer, Endpoint, EndpointBuilder, EndpointOptions, RequestInfo, RouteHandler};
pub use routing::{RouteParams, RouteTable};
