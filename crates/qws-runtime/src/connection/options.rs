use std::time::Duration;

/// Per-connection tuning.
#[derive(Debug, Clone)]
pub struct ConnectionOptions {
    /// Client reconnect policy. Ignored for server-role connections.
    pub reconnect: ReconnectPolicy,
    /// Send a ping this often while open.
    pub ping_interval: Option<Duration>,
    /// Treat the socket as lost after this much inbound silence.
    pub idle_timeout: Option<Duration>,
    /// How long the closing handshake may take before the socket is dropped.
    pub close_grace: Duration,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            reconnect: ReconnectPolicy::default(),
            ping_interval: Some(Duration::from_secs(20)),
            idle_timeout: Some(Duration::from_secs(60)),
            close_grace: Duration::from_secs(5),
        }
    }
}

impl ConnectionOptions {
    pub fn with_reconnect(mut self, reconnect: ReconnectPolicy) -> Self {
        self.reconnect = reconnect;
        self
    }

    /// Disable ping and idle detection.
    pub fn without_heartbeat(mut self) -> Self {
        self.ping_interval = None;
        self.idle_timeout = None;
        self
    }

    pub fn with_close_grace(mut self, close_grace: Duration) -> Self {
        self.close_grace = close_grace;
        self
    }
}

/// Exponential reconnect backoff without an attempt cap.
///
/// Attempt `n` (0-based, reset after every successful open) waits
/// `min(initial_delay * multiplier^n, max_delay)`.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    pub enabled: bool,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            initial_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

impl ReconnectPolicy {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.max(1.0).powi(attempt.min(32) as i32);
        let nanos = self.initial_delay.as_nanos() as f64 * factor;
        if !nanos.is_finite() || nanos >= self.max_delay.as_nanos() as f64 {
            return self.max_delay;
        }
        Duration::from_nanos(nanos.round() as u64)
    }
}
