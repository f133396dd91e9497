//! Wire protocol.
//!
//! A single self-describing binary layout carries headers, a payload-kind tag
//! and the payload inside one raw frame. Parsers are panic-free: malformed
//! input is reported as `QwsError::MalformedEnvelope`.

pub mod envelope;

pub use envelope::{decode, encode, Envelope, Headers, Payload, PayloadKind};
