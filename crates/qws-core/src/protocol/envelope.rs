//! Envelope codec (panic-free).
//!
//! Layout, all integers big-endian:
//!
//! ```text
//! +---------+------+----------------+-----------------+---------+
//! | version | kind | header_len u32 | headers (JSON)  | payload |
//! +---------+------+----------------+-----------------+---------+
//!     1        1          4            header_len        rest
//! ```
//!
//! Parsing rules:
//! - Never index (`buf[0]`), always use `Buf` and `remaining()` checks.
//! - A structured payload is parsed; a binary payload never is.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde_json::{Map, Value};

use crate::error::{QwsError, Result};

/// Current wire format version.
pub const WIRE_VERSION: u8 = 1;

/// Tag: payload is JSON.
pub const KIND_STRUCTURED: u8 = 0x01;
/// Tag: payload is raw bytes.
pub const KIND_BINARY: u8 = 0x02;

const PREFIX_LEN: usize = 6;

/// Envelope headers: string keys, arbitrary JSON values.
pub type Headers = Map<String, Value>;

/// Payload kind carried on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    Structured,
    Binary,
}

impl PayloadKind {
    fn tag(self) -> u8 {
        match self {
            PayloadKind::Structured => KIND_STRUCTURED,
            PayloadKind::Binary => KIND_BINARY,
        }
    }

    fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            KIND_STRUCTURED => Some(PayloadKind::Structured),
            KIND_BINARY => Some(PayloadKind::Binary),
            _ => None,
        }
    }
}

/// Typed payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// JSON tree.
    Structured(Value),
    /// Opaque bytes (zero-copy).
    Binary(Bytes),
}

impl Payload {
    pub fn kind(&self) -> PayloadKind {
        match self {
            Payload::Structured(_) => PayloadKind::Structured,
            Payload::Binary(_) => PayloadKind::Binary,
        }
    }
}

impl From<Value> for Payload {
    fn from(v: Value) -> Self {
        Payload::Structured(v)
    }
}

impl From<Bytes> for Payload {
    fn from(b: Bytes) -> Self {
        Payload::Binary(b)
    }
}

impl From<Vec<u8>> for Payload {
    fn from(b: Vec<u8>) -> Self {
        Payload::Binary(Bytes::from(b))
    }
}

/// The unit exchanged over one raw frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub headers: Headers,
    pub payload: Payload,
}

impl Envelope {
    pub fn new(payload: impl Into<Payload>, headers: Headers) -> Self {
        Self {
            headers,
            payload: payload.into(),
        }
    }

    pub fn structured(value: Value) -> Self {
        Self::new(value, Headers::new())
    }

    pub fn binary(bytes: impl Into<Bytes>) -> Self {
        Self::new(Payload::Binary(bytes.into()), Headers::new())
    }

    pub fn kind(&self) -> PayloadKind {
        self.payload.kind()
    }
}

/// Encode an envelope into one frame.
pub fn encode(env: &Envelope) -> Result<Bytes> {
    let headers = if env.headers.is_empty() {
        Vec::new()
    } else {
        serde_json::to_vec(&env.headers)
            .map_err(|e| QwsError::Internal(format!("header encode failed: {e}")))?
    };
    let header_len = u32::try_from(headers.len())
        .map_err(|_| QwsError::Internal("header section exceeds u32".into()))?;

    let mut out = BytesMut::with_capacity(PREFIX_LEN + headers.len());
    out.put_u8(WIRE_VERSION);
    out.put_u8(env.kind().tag());
    out.put_u32(header_len);
    out.put_slice(&headers);

    match &env.payload {
        Payload::Structured(v) => {
            let body = serde_json::to_vec(v)
                .map_err(|e| QwsError::Internal(format!("payload encode failed: {e}")))?;
            out.put_slice(&body);
        }
        Payload::Binary(b) => out.put_slice(b),
    }

    Ok(out.freeze())
}

/// Decode one frame into an envelope.
pub fn decode(mut buf: Bytes) -> Result<Envelope> {
    if buf.remaining() < PREFIX_LEN {
        return Err(malformed("frame too short"));
    }

    let version = buf.get_u8();
    if version != WIRE_VERSION {
        return Err(malformed(format!("unsupported version {version}")));
    }

    let tag = buf.get_u8();
    let kind =
        PayloadKind::from_tag(tag).ok_or_else(|| malformed(format!("unknown payload tag {tag}")))?;

    let header_len = buf.get_u32() as usize;
    if buf.remaining() < header_len {
        return Err(malformed("header section overruns frame"));
    }

    let header_bytes = buf.split_to(header_len);
    let headers = if header_bytes.is_empty() {
        Headers::new()
    } else {
        match serde_json::from_slice::<Value>(&header_bytes) {
            Ok(Value::Object(map)) => map,
            Ok(_) => return Err(malformed("headers must be a JSON object")),
            Err(e) => return Err(malformed(format!("invalid header json: {e}"))),
        }
    };

    let payload = match kind {
        PayloadKind::Structured => {
            let v: Value = serde_json::from_slice(&buf)
                .map_err(|e| malformed(format!("invalid structured payload: {e}")))?;
            Payload::Structured(v)
        }
        PayloadKind::Binary => Payload::Binary(buf),
    };

    Ok(Envelope { headers, payload })
}

fn malformed(reason: impl Into<String>) -> QwsError {
    QwsError::MalformedEnvelope(reason.into())
}
