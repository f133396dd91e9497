//! Path routing for inbound connections.
//!
//! Patterns are compiled once at registration; lookups take `&self` and never
//! mutate the table, so the endpoint shares it read-only across accepts.

mod pattern;
mod table;

pub use pattern::{Pattern, Segment};
pub use table::{RouteMatch, RouteParams, RouteTable};
