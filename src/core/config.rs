//! Registry configuration
//!
//! Embedders can describe the runtime-mutable settings of a
//! [`LogRegistry`](super::registry::LogRegistry) as data, typically loaded
//! from JSON:
//!
//! ```
//! use ldgr::core::config::RegistryConfig;
//! use ldgr::Severity;
//!
//! let config = RegistryConfig::from_json_str(r#"{
//!     "default_level": "warn",
//!     "levels": { "NET.HTTP": "debug" },
//!     "pool": { "max_free_nodes": 256 }
//! }"#).unwrap();
//!
//! assert_eq!(config.default_level, Severity::Warn);
//! assert_eq!(config.levels["NET.HTTP"], Severity::Debug);
//! assert_eq!(config.pool.max_free_nodes, Some(256));
//! ```

use super::error::{LoggerError, Result};
use super::pool::PoolLimits;
use super::severity::Severity;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegistryConfig {
    /// Level given to loggers created on first lookup
    pub default_level: Severity,
    /// Stamp snapshots in local time instead of UTC
    pub local_time: bool,
    /// Per-logger levels, applied eagerly (loggers are created if missing)
    pub levels: BTreeMap<String, Severity>,
    /// Free-list retention limits for the shared buffer pool
    pub pool: PoolLimits,
}

impl RegistryConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: RegistryConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            LoggerError::io_operation(
                "reading registry config",
                path.display().to_string(),
                e,
            )
        })?;
        Self::from_json_str(&json)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.levels.keys().any(|name| name.is_empty()) {
            return Err(LoggerError::config("levels", "logger names must not be empty"));
        }
        Ok(())
    }
}
