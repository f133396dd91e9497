//! Endpoint config loader (strict parsing).

pub mod schema;

use std::fs;
use std::path::Path;

use qws_core::{QwsError, Result};

pub use schema::{ConnectionSection, EndpointSection, QwsConfig, ReconnectSection};

pub fn load_from_file(path: impl AsRef<Path>) -> Result<QwsConfig> {
    let path = path.as_ref();
    let s = fs::read_to_string(path)
        .map_err(|e| QwsError::InvalidConfig(format!("read {} failed: {e}", path.display())))?;
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<QwsConfig> {
    let cfg: QwsConfig =
        serde_yaml::from_str(s).map_err(|e| QwsError::InvalidConfig(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}
