//! Host configuration loaded from TOML

use pwledger_core::config::CoreConfig;
use pwledger_core::errors::{Result, VaultError};
use pwledger_core::logging_facility::Profile;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Everything a `Session` is configured with
///
/// ```toml
/// logging_profile = "production"
///
/// [core.history]
/// save_by_default = true
/// default_max = 5
///
/// [core.merge]
/// rename_suffix = "-imported"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub logging_profile: Profile,
    pub core: CoreConfig,
}

impl EngineConfig {
    /// Parse and validate a TOML document; missing keys take defaults
    ///
    /// # Errors
    ///
    /// - `Config` if the document does not parse
    /// - `CapacityExceeded` if a history max is beyond the hard cap
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|e| VaultError::Config {
            message: format!("Failed to parse config TOML: {e}"),
        })?;
        config.core.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML file
    ///
    /// # Errors
    ///
    /// `Config` if the file cannot be read, otherwise as `from_toml_str`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| VaultError::Config {
            message: format!("Failed to read config {}: {e}", path.display()),
        })?;
        Self::from_toml_str(&content)
    }

    /// Serialize back to TOML
    ///
    /// # Errors
    ///
    /// `Serialization` if the value cannot be represented.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self).map_err(|e| VaultError::Serialization {
            message: format!("Failed to serialize config: {e}"),
        })
    }
}
