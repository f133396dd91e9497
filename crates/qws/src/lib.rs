//! Top-level facade crate for qws.
//!
//! Re-exports the envelope codec and the runtime so users can depend on a single crate.

pub mod core {
    pub use qws_core::*;
}

pub mod runtime {
    pub use qws_runtime::*;
}

pub use qws_core::{Envelope, Headers, Payload, QwsError, Result};
pub use qws_runtime::{Connection, ConnectionOptions, Endpoint, EndpointBuilder, ReconnectPolicy};
