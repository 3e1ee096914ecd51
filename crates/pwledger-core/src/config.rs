//! Preference values threaded explicitly through the store and commands
//!
//! Nothing here is global: a `CoreConfig` is owned by the host session and
//! handed to commands through `ExecContext`.

use serde::{Deserialize, Serialize};

use crate::errors::{Result, VaultError};

/// Hard upper bound on a per-entry password history
pub const HISTORY_MAX_CAP: usize = 255;

/// Password-history preferences applied to entries that carry no history
/// header of their own
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Start saving history for entries without explicit settings
    pub save_by_default: bool,
    /// Max applied when history is started for such entries
    pub default_max: usize,
    /// Clamp for every configured max
    pub max_cap: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            save_by_default: true,
            default_max: 3,
            max_cap: HISTORY_MAX_CAP,
        }
    }
}

impl HistoryConfig {
    /// Clamp a requested max to `max_cap`
    pub fn clamp_max(&self, requested: usize) -> usize {
        let cap = self.max_cap.min(HISTORY_MAX_CAP);
        if requested > cap {
            tracing::debug!(requested, cap, "history max clamped");
        }
        requested.min(cap)
    }

    /// Strict check used when loading configuration
    ///
    /// # Errors
    ///
    /// Returns `CapacityExceeded` if `default_max` or `max_cap` is beyond
    /// `HISTORY_MAX_CAP`.
    pub fn validate(&self) -> Result<()> {
        if self.max_cap > HISTORY_MAX_CAP {
            return Err(VaultError::CapacityExceeded {
                requested: self.max_cap,
                max: HISTORY_MAX_CAP,
            });
        }
        if self.default_max > self.max_cap {
            return Err(VaultError::CapacityExceeded {
                requested: self.default_max,
                max: self.max_cap,
            });
        }
        Ok(())
    }
}

/// Merge preferences
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    /// Marker inserted into the title of a renamed import, before the timestamp
    pub rename_suffix: String,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            rename_suffix: "-merged".to_string(),
        }
    }
}

/// All preferences consumed by the core
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub history: HistoryConfig,
    pub merge: MergeConfig,
}

impl CoreConfig {
    /// # Errors
    ///
    /// Propagates `HistoryConfig::validate`.
    pub fn validate(&self) -> Result<()> {
        self.history.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_max() {
        let cfg = HistoryConfig::default();
        assert_eq!(cfg.clamp_max(10), 10);
        assert_eq!(cfg.clamp_max(1000), HISTORY_MAX_CAP);
    }

    #[test]
    fn test_validate_rejects_oversized_default() {
        let cfg = HistoryConfig {
            default_max: 20,
            max_cap: 10,
            ..HistoryConfig::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(VaultError::CapacityExceeded { requested: 20, max: 10 })
        ));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let cfg: CoreConfig = serde_json::from_str(r#"{"history":{"default_max":5}}"#).unwrap();
        assert_eq!(cfg.history.default_max, 5);
        assert!(cfg.history.save_by_default);
        assert_eq!(cfg.merge.rename_suffix, "-merged");
    }
}
