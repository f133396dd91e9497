//! Shared error type across qws crates.

use thiserror::Error;

/// Stable error codes (used in logs and HTTP rejection bodies).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Inbound frame could not be decoded into an envelope.
    MalformedEnvelope,
    /// Send attempted after terminal close.
    ConnectionClosed,
    /// Dial of a client raw socket failed.
    DialFailure,
    /// Inbound path matched no route.
    RouteNotFound,
    /// Authorization middleware denied the attempt.
    Unauthorized,
    /// Route handler or middleware failed.
    HandlerFault,
    /// Route pattern rejected at registration.
    InvalidRoute,
    /// Configuration rejected.
    InvalidConfig,
    /// Raw socket I/O failure.
    Transport,
    /// Anything else.
    Internal,
}

impl ErrorCode {
    /// String representation used in logs and responses.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::MalformedEnvelope => "MALFORMED_ENVELOPE",
            ErrorCode::ConnectionClosed => "CONNECTION_CLOSED",
            ErrorCode::DialFailure => "DIAL_FAILURE",
            ErrorCode::RouteNotFound => "ROUTE_NOT_FOUND",
            ErrorCode::Unauthorized => "UNAUTHORIZED",
            ErrorCode::HandlerFault => "HANDLER_FAULT",
            ErrorCode::InvalidRoute => "INVALID_ROUTE",
            ErrorCode::InvalidConfig => "INVALID_CONFIG",
            ErrorCode::Transport => "TRANSPORT",
            ErrorCode::Internal => "INTERNAL",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, QwsError>;

/// Unified error type used by core and runtime.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QwsError {
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),
    #[error("connection closed")]
    ConnectionClosed,
    #[error("dial failed: {0}")]
    DialFailure(String),
    #[error("route not found")]
    RouteNotFound,
    #[error("unauthorized")]
    Unauthorized,
    #[error("handler fault: {0}")]
    HandlerFault(String),
    #[error("invalid route: {0}")]
    InvalidRoute(String),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("transport: {0}")]
    Transport(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl QwsError {
    /// Map to the stable error code.
    pub fn code(&self) -> ErrorCode {
        match self {
            QwsError::MalformedEnvelope(_) => ErrorCode::MalformedEnvelope,
            QwsError::ConnectionClosed => ErrorCode::ConnectionClosed,
            QwsError::DialFailure(_) => ErrorCode::DialFailure,
            QwsError::RouteNotFound => ErrorCode::RouteNotFound,
            QwsError::Unauthorized => ErrorCode::Unauthorized,
            QwsError::HandlerFault(_) => ErrorCode::HandlerFault,
            QwsError::InvalidRoute(_) => ErrorCode::InvalidRoute,
            QwsError::InvalidConfig(_) => ErrorCode::InvalidConfig,
            QwsError::Transport(_) => ErrorCode::Transport,
            QwsError::Internal(_) => ErrorCode::Internal,
        }
    }
}
