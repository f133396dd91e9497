use std::fmt;

/// Which side initiated the connection. Only clients reconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Client,
    Server,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Client => "client",
            Role::Server => "server",
        }
    }
}

/// Lifecycle state of a connection wrapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Initial dial in progress (or not yet opened).
    Connecting,
    /// Raw socket open; the outbound queue drains.
    Open,
    /// Raw socket lost; sends buffer until a new socket opens.
    Reconnecting,
    /// Terminal.
    Closed,
}

impl ConnectionState {
    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open => "open",
            ConnectionState::Reconnecting => "reconnecting",
            ConnectionState::Closed => "closed",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a connection reached `Closed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// `close()` was called locally.
    Requested,
    /// The raw socket went away and no reconnect applies.
    PeerClosed,
    /// No inbound traffic within the idle timeout.
    IdleTimeout,
    /// Dial failed with reconnect disabled.
    DialFailure(String),
    /// The socket did not confirm closure within the grace period.
    Terminated,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseReason::Requested => f.write_str("requested"),
            CloseReason::PeerClosed => f.write_str("peer closed"),
            CloseReason::IdleTimeout => f.write_str("idle timeout"),
            CloseReason::DialFailure(e) => write!(f, "dial failure: {e}"),
            CloseReason::Terminated => f.write_str("terminated"),
        }
    }
}
