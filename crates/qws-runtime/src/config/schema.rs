use std::net::SocketAddr;
use std::time::Duration;

use serde::Deserialize;

use qws_core::{QwsError, Result};

use crate::connection::{ConnectionOptions, ReconnectPolicy};
use crate::endpoint::EndpointOptions;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QwsConfig {
    pub version: u32,

    #[serde(default)]
    pub endpoint: EndpointSection,

    #[serde(default)]
    pub connection: ConnectionSection,

    #[serde(default)]
    pub reconnect: ReconnectSection,
}

impl QwsConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(invalid(format!("unsupported config version {}", self.version)));
        }
        self.endpoint.validate()?;
        self.connection.validate()?;
        self.reconnect.validate()?;
        Ok(())
    }

    pub fn listen_addr(&self) -> Result<SocketAddr> {
        self.endpoint.listen_addr()
    }

    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            enabled: self.reconnect.enabled,
            initial_delay: Duration::from_millis(self.reconnect.initial_delay_ms),
            max_delay: Duration::from_millis(self.reconnect.max_delay_ms),
            multiplier: self.reconnect.multiplier,
        }
    }

    pub fn connection_options(&self) -> ConnectionOptions {
        ConnectionOptions {
            reconnect: self.reconnect_policy(),
            ping_interval: non_zero_ms(self.connection.ping_interval_ms),
            idle_timeout: non_zero_ms(self.connection.idle_timeout_ms),
            close_grace: Duration::from_millis(self.endpoint.close_grace_ms),
        }
    }

    pub fn endpoint_options(&self) -> EndpointOptions {
        EndpointOptions {
            close_grace: Duration::from_millis(self.endpoint.close_grace_ms),
            connection: self.connection_options(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EndpointSection {
    #[serde(default = "default_listen")]
    pub listen: String,

    #[serde(default = "default_close_grace_ms")]
    pub close_grace_ms: u64,
}

impl Default for EndpointSection {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            close_grace_ms: default_close_grace_ms(),
        }
    }
}

impl EndpointSection {
    pub fn validate(&self) -> Result<()> {
        self.listen_addr()?;
        if !(100..=60_000).contains(&self.close_grace_ms) {
            return Err(invalid("endpoint.close_grace_ms must be between 100 and 60000"));
        }
        Ok(())
    }

    pub fn listen_addr(&self) -> Result<SocketAddr> {
        self.listen
            .parse()
            .map_err(|e| invalid(format!("endpoint.listen must be a socket address: {e}")))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConnectionSection {
    /// 0 disables pings.
    #[serde(default = "default_ping_interval_ms")]
    pub ping_interval_ms: u64,

    /// 0 disables idle detection.
    #[serde(default = "default_idle_timeout_ms")]
    pub idle_timeout_ms: u64,
}

impl Default for ConnectionSection {
    fn default() -> Self {
        Self {
            ping_interval_ms: default_ping_interval_ms(),
            idle_timeout_ms: default_idle_timeout_ms(),
        }
    }
}

impl ConnectionSection {
    pub fn validate(&self) -> Result<()> {
        if self.ping_interval_ms != 0 && !(1_000..=120_000).contains(&self.ping_interval_ms) {
            return Err(invalid(
                "connection.ping_interval_ms must be 0 or between 1000 and 120000",
            ));
        }
        if self.idle_timeout_ms != 0 && self.idle_timeout_ms <= self.ping_interval_ms {
            return Err(invalid(
                "connection.idle_timeout_ms must be 0 or greater than ping_interval_ms",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReconnectSection {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
}

impl Default for ReconnectSection {
    fn default() -> Self {
        Self {
            enabled: true,
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            multiplier: default_multiplier(),
        }
    }
}

impl ReconnectSection {
    pub fn validate(&self) -> Result<()> {
        if self.initial_delay_ms < 10 {
            return Err(invalid("reconnect.initial_delay_ms must be at least 10"));
        }
        if self.max_delay_ms < self.initial_delay_ms {
            return Err(invalid("reconnect.max_delay_ms must not be below initial_delay_ms"));
        }
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(invalid("reconnect.multiplier must be a finite number >= 1.0"));
        }
        Ok(())
    }
}

fn invalid(msg: impl Into<String>) -> QwsError {
    QwsError::InvalidConfig(msg.into())
}

fn non_zero_ms(ms: u64) -> Option<Duration> {
    (ms != 0).then(|| Duration::from_millis(ms))
}

fn default_listen() -> String {
    "0.0.0.0:3000".into()
}
fn default_close_grace_ms() -> u64 {
    5000
}
fn default_ping_interval_ms() -> u64 {
    20000
}
fn default_idle_timeout_ms() -> u64 {
    60000
}
fn default_true() -> bool {
    true
}
fn default_initial_delay_ms() -> u64 {
    250
}
fn default_max_delay_ms() -> u64 {
    30000
}
fn default_multiplier() -> f64 {
    2.0
}
