//! qws core: transport-agnostic envelope codec and error types.
//!
//! This crate defines the wire-level envelope and the error surface shared by
//! the runtime (connection wrapper, router, endpoint) and by client tooling.
//! It carries no transport or async runtime dependencies.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here. A malformed frame
//! from a peer must surface as `QwsError::MalformedEnvelope`, never as a crash.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod protocol;

/// Shared result type.
pub use error::{ErrorCode, QwsError, Result};
pub use protocol::envelope::{Envelope, Headers, Payload, PayloadKind};
