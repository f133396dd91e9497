//! Listening endpoint: routed, authorized WebSocket accept with graceful
//! shutdown.

mod accept;
mod handler;
mod registry;
mod server;

pub use handler::{authorizer_fn, handler_fn, Authorizer, FnAuthorizer, FnHandler, RequestInfo, RouteHandler};
pub use registry::ConnectionRegistry;
pub use server::{Endpoint, EndpointBuilder, EndpointOptions};
